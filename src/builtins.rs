//! Fixed registry of native functions shared by both backends.
//!
//! Ordering is load-bearing: the compiler installs these into the symbol
//! table by position and the VM resolves `GetBuiltin` operands against the
//! same indices, so entries must never be reordered.

use std::rc::Rc;

use crate::object::{Object, RuntimeError};

pub type BuiltinFn = fn(Vec<Object>, &mut String) -> Result<Object, RuntimeError>;

pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

pub static BUILTINS: [Builtin; 6] = [
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

fn array_argument<'a>(
    args: &'a [Object],
    name: &'static str,
    want: usize,
) -> Result<&'a Rc<Vec<Object>>, RuntimeError> {
    if args.len() != want {
        return Err(RuntimeError::BuiltinWrongNumberOfArguments {
            got: args.len(),
            want,
        });
    }
    match &args[0] {
        Object::Array(elements) => Ok(elements),
        other => Err(RuntimeError::BuiltinArgumentNotArray {
            name,
            got: other.object_type(),
        }),
    }
}

fn builtin_len(args: Vec<Object>, _out: &mut String) -> Result<Object, RuntimeError> {
    if args.len() != 1 {
        return Err(RuntimeError::BuiltinWrongNumberOfArguments {
            got: args.len(),
            want: 1,
        });
    }
    match &args[0] {
        Object::String(value) => Ok(Object::Integer(value.len() as i64)),
        Object::Array(elements) => Ok(Object::Integer(elements.len() as i64)),
        other => Err(RuntimeError::LenArgumentNotSupported {
            got: other.object_type(),
        }),
    }
}

fn builtin_puts(args: Vec<Object>, out: &mut String) -> Result<Object, RuntimeError> {
    for arg in &args {
        out.push_str(&arg.inspect());
        out.push('\n');
    }
    Ok(Object::Null)
}

fn builtin_first(args: Vec<Object>, _out: &mut String) -> Result<Object, RuntimeError> {
    let elements = array_argument(&args, "first", 1)?;
    Ok(elements.first().cloned().unwrap_or(Object::Null))
}

fn builtin_last(args: Vec<Object>, _out: &mut String) -> Result<Object, RuntimeError> {
    let elements = array_argument(&args, "last", 1)?;
    Ok(elements.last().cloned().unwrap_or(Object::Null))
}

fn builtin_rest(args: Vec<Object>, _out: &mut String) -> Result<Object, RuntimeError> {
    let elements = array_argument(&args, "rest", 1)?;
    if elements.is_empty() {
        return Ok(Object::Null);
    }
    Ok(Object::array(elements[1..].to_vec()))
}

fn builtin_push(args: Vec<Object>, _out: &mut String) -> Result<Object, RuntimeError> {
    let elements = array_argument(&args, "push", 2)?;
    let mut appended = elements.as_ref().clone();
    appended.push(args[1].clone());
    Ok(Object::array(appended))
}
