//! Runtime value model shared by both execution backends.
//!
//! Values are a tagged enum; heap-backed variants hang off `Rc` handles so
//! that cloning a value is cheap and identity comparisons (`==` across
//! non-primitive types) follow pointer identity, matching the singleton
//! semantics of `true`, `false` and `null`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{BlockStatement, InfixOperator, PrefixOperator};
use crate::builtins::Builtin;
use crate::code::Instructions;
use crate::environment::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Integer,
    Boolean,
    Null,
    String,
    Array,
    Hash,
    Error,
    Return,
    Function,
    Builtin,
    CompiledFunction,
    Closure,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Integer => "INTEGER",
            ObjectType::Boolean => "BOOLEAN",
            ObjectType::Null => "NULL",
            ObjectType::String => "STRING",
            ObjectType::Array => "ARRAY",
            ObjectType::Hash => "HASH",
            ObjectType::Error => "ERROR",
            ObjectType::Return => "RETURN_VALUE",
            ObjectType::Function => "FUNCTION",
            ObjectType::Builtin => "BUILTIN",
            ObjectType::CompiledFunction => "COMPILED_FUNCTION",
            ObjectType::Closure => "CLOSURE",
        };
        write!(f, "{name}")
    }
}

/// Key under which a hashable value is stored: the value's type tag plus a
/// 64-bit hash. Keeping the type in the key means an Integer and a String
/// that happen to hash alike can never collide into the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashKey {
    pub object_type: ObjectType,
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// Evaluator function object: parameter names, shared body, and the
/// environment captured at the definition site.
#[derive(Debug)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Rc<BlockStatement>,
    pub env: Rc<RefCell<Environment>>,
}

/// Compiled function body for the VM path: raw bytecode plus the frame
/// layout the compiler derived for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function bundled with the values captured for its free names.
#[derive(Debug)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Null,
    String(Rc<String>),
    Array(Rc<Vec<Object>>),
    Hash(Rc<BTreeMap<HashKey, HashPair>>),
    Error(String),
    Return(Box<Object>),
    Function(Rc<Function>),
    Builtin(&'static Builtin),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
}

const FNV_OFFSET_BASIS: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

fn fnv1a_hash_bytes(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

impl Object {
    pub fn string(value: impl Into<String>) -> Self {
        Object::String(Rc::new(value.into()))
    }

    pub fn array(elements: Vec<Object>) -> Self {
        Object::Array(Rc::new(elements))
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Integer(_) => ObjectType::Integer,
            Object::Boolean(_) => ObjectType::Boolean,
            Object::Null => ObjectType::Null,
            Object::String(_) => ObjectType::String,
            Object::Array(_) => ObjectType::Array,
            Object::Hash(_) => ObjectType::Hash,
            Object::Error(_) => ObjectType::Error,
            Object::Return(_) => ObjectType::Return,
            Object::Function(_) => ObjectType::Function,
            Object::Builtin(_) => ObjectType::Builtin,
            Object::CompiledFunction(_) => ObjectType::CompiledFunction,
            Object::Closure(_) => ObjectType::Closure,
        }
    }

    /// Hash key for values usable as hash keys; `None` for everything else.
    pub fn hash_key(&self) -> Option<HashKey> {
        let key = match self {
            Object::Integer(value) => HashKey {
                object_type: ObjectType::Integer,
                value: *value as u64,
            },
            Object::Boolean(value) => HashKey {
                object_type: ObjectType::Boolean,
                value: u64::from(*value),
            },
            Object::String(value) => HashKey {
                object_type: ObjectType::String,
                value: fnv1a_hash_bytes(value.as_bytes()),
            },
            _ => return None,
        };
        Some(key)
    }

    /// Rendering used by `puts` and the REPL.
    pub fn inspect(&self) -> String {
        match self {
            Object::Integer(value) => value.to_string(),
            Object::Boolean(value) => value.to_string(),
            Object::Null => "null".to_string(),
            Object::String(value) => value.to_string(),
            Object::Array(elements) => {
                let rendered = elements
                    .iter()
                    .map(Object::inspect)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{rendered}]")
            }
            Object::Hash(pairs) => {
                let rendered = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key.inspect(), pair.value.inspect()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{rendered}}}")
            }
            Object::Error(message) => format!("ERROR: {message}"),
            Object::Return(value) => value.inspect(),
            Object::Function(function) => {
                let body = function
                    .body
                    .iter()
                    .map(ToString::to_string)
                    .collect::<String>();
                format!("fn({}) {{\n{}\n}}", function.parameters.join(", "), body)
            }
            Object::Builtin(_) => "builtin function".to_string(),
            Object::CompiledFunction(func) => {
                format!("CompiledFunction[{:p}]", Rc::as_ptr(func))
            }
            Object::Closure(closure) => format!("Closure[{:p}]", Rc::as_ptr(closure)),
        }
    }
}

/// Identity comparison used by the cross-type `==`/`!=` paths of both
/// backends. The Boolean and Null singletons compare by value (there is only
/// one of each); heap values compare by pointer. Integers and strings never
/// reach this on the same-type path, so two equal instances are distinct here.
pub fn identity_eq(left: &Object, right: &Object) -> bool {
    match (left, right) {
        (Object::Boolean(l), Object::Boolean(r)) => l == r,
        (Object::Null, Object::Null) => true,
        (Object::String(l), Object::String(r)) => Rc::ptr_eq(l, r),
        (Object::Array(l), Object::Array(r)) => Rc::ptr_eq(l, r),
        (Object::Hash(l), Object::Hash(r)) => Rc::ptr_eq(l, r),
        (Object::Function(l), Object::Function(r)) => Rc::ptr_eq(l, r),
        (Object::Builtin(l), Object::Builtin(r)) => std::ptr::eq(*l, *r),
        (Object::CompiledFunction(l), Object::CompiledFunction(r)) => Rc::ptr_eq(l, r),
        (Object::Closure(l), Object::Closure(r)) => Rc::ptr_eq(l, r),
        _ => false,
    }
}

/// Runtime failures surfaced to programs as `Object::Error` values. The
/// `#[error]` strings are the user-visible contract and are asserted verbatim
/// by tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("type mismatch: {left} {operator} {right}")]
    TypeMismatch {
        left: ObjectType,
        operator: InfixOperator,
        right: ObjectType,
    },
    #[error("unknown operator: {left} {operator} {right}")]
    UnknownInfixOperator {
        left: ObjectType,
        operator: InfixOperator,
        right: ObjectType,
    },
    #[error("unknown operator: {operator}{right}")]
    UnknownPrefixOperator {
        operator: PrefixOperator,
        right: ObjectType,
    },
    #[error("divide by 0 error")]
    DivideByZero,
    #[error("identifier not found: {name}")]
    IdentifierNotFound { name: String },
    #[error("unusable as hash key: {key_type}")]
    UnusableHashKey { key_type: ObjectType },
    #[error("index operator not supported: {left_type}")]
    IndexNotSupported { left_type: ObjectType },
    #[error("not a function: {callee_type}")]
    NotAFunction { callee_type: ObjectType },
    #[error("arguments error...")]
    MissingArguments,
    #[error("wrong number of arguments. got={got}, want={want}")]
    BuiltinWrongNumberOfArguments { got: usize, want: usize },
    #[error("argument to `{name}` must be ARRAY, got {got}")]
    BuiltinArgumentNotArray {
        name: &'static str,
        got: ObjectType,
    },
    #[error("argument to `len` not supported, got {got}")]
    LenArgumentNotSupported { got: ObjectType },
    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryTypes { left: ObjectType, right: ObjectType },
    #[error("unsupported type for negation: {operand}")]
    UnsupportedNegation { operand: ObjectType },
    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongNumberOfArguments { want: usize, got: usize },
    #[error("calling non-function and non-built-in")]
    CallingNonFunction,
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("opcode {0} undefined")]
    UndefinedOpcode(u8),
}
