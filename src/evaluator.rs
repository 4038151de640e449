//! Tree-walking backend.
//!
//! Executes the AST directly against an `Environment` chain. Runtime
//! failures travel as `RuntimeError` through `Result` and become an
//! `Object::Error` at the public `eval` boundary; `return` travels as an
//! `Object::Return` wrapper that blocks short-circuit on and calls unwrap.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement};
use crate::environment::Environment;
use crate::object::{identity_eq, HashPair, Object, ObjectType, RuntimeError};

type EvalResult = Result<Object, RuntimeError>;

#[derive(Default)]
pub struct Evaluator {
    /// Everything `puts` wrote during evaluation.
    pub output: String,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level entry: evaluates a program, unwraps a trailing `return`,
    /// and converts runtime failures into an `Error` value result.
    pub fn eval(&mut self, program: &Program, env: &Rc<RefCell<Environment>>) -> Object {
        match self.eval_statements(&program.statements, env) {
            Ok(Object::Return(value)) => *value,
            Ok(value) => value,
            Err(err) => Object::Error(err.to_string()),
        }
    }

    fn eval_statements(
        &mut self,
        statements: &[Statement],
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        let mut result = Object::Null;
        for statement in statements {
            result = self.eval_statement(statement, env)?;
            if matches!(result, Object::Return(_)) {
                return Ok(result);
            }
        }
        Ok(result)
    }

    fn eval_statement(
        &mut self,
        statement: &Statement,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        match statement {
            Statement::Let { name, value } => {
                let value = self.eval_expression(value, env)?;
                env.borrow_mut().set(name.clone(), value.clone());
                Ok(value)
            }
            Statement::Return(value) => {
                let value = self.eval_expression(value, env)?;
                Ok(Object::Return(Box::new(value)))
            }
            Statement::Expression(expr) => self.eval_expression(expr, env),
        }
    }

    fn eval_expression(
        &mut self,
        expr: &Expression,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        match expr {
            Expression::Integer(value) => Ok(Object::Integer(*value)),
            Expression::Boolean(value) => Ok(Object::Boolean(*value)),
            Expression::String(value) => Ok(Object::string(value.clone())),
            Expression::Null => Ok(Object::Null),
            Expression::Identifier(name) => {
                env.borrow()
                    .get(name)
                    .ok_or_else(|| RuntimeError::IdentifierNotFound {
                        name: name.clone(),
                    })
            }
            Expression::Prefix { operator, right } => {
                let right = self.eval_expression(right, env)?;
                self.eval_prefix_expression(*operator, right)
            }
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left, env)?;
                let right = self.eval_expression(right, env)?;
                self.eval_infix_expression(*operator, left, right)
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition, env)?;
                if is_truthy(&condition) {
                    self.eval_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, env)
                } else {
                    Ok(Object::Null)
                }
            }
            Expression::Function { parameters, body } => {
                Ok(Object::Function(Rc::new(crate::object::Function {
                    parameters: parameters.clone(),
                    body: Rc::clone(body),
                    env: Rc::clone(env),
                })))
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let callee = self.eval_expression(function, env)?;
                self.eval_call(callee, arguments, env)
            }
            Expression::Index { left, index } => {
                let left = self.eval_expression(left, env)?;
                let index = self.eval_expression(index, env)?;
                self.eval_index_expression(left, index)
            }
            Expression::Array(elements) => {
                let mut evaluated = Vec::with_capacity(elements.len());
                for element in elements {
                    evaluated.push(self.eval_expression(element, env)?);
                }
                Ok(Object::array(evaluated))
            }
            Expression::Hash(pairs) => self.eval_hash(pairs, env),
        }
    }

    /// Evaluates a block in a fresh scope enclosing `env`, so `let` bindings
    /// inside the block do not leak outward.
    fn eval_block(
        &mut self,
        block: &BlockStatement,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        let scope = Rc::new(RefCell::new(Environment::new_enclosed(Rc::clone(env))));
        self.eval_statements(block, &scope)
    }

    fn eval_prefix_expression(&mut self, operator: PrefixOperator, right: Object) -> EvalResult {
        match operator {
            PrefixOperator::Bang => Ok(Object::Boolean(!is_truthy(&right))),
            PrefixOperator::Minus => match right {
                Object::Integer(value) => Ok(Object::Integer(value.wrapping_neg())),
                other => Err(RuntimeError::UnknownPrefixOperator {
                    operator,
                    right: other.object_type(),
                }),
            },
        }
    }

    fn eval_infix_expression(
        &mut self,
        operator: InfixOperator,
        left: Object,
        right: Object,
    ) -> EvalResult {
        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                eval_integer_infix_expression(operator, *l, *r)
            }
            (Object::String(l), Object::String(r)) => {
                if operator == InfixOperator::Plus {
                    Ok(Object::string(format!("{l}{r}")))
                } else {
                    Err(RuntimeError::UnknownInfixOperator {
                        left: ObjectType::String,
                        operator,
                        right: ObjectType::String,
                    })
                }
            }
            _ => match operator {
                // Everything that is not an integer or string pair compares
                // by identity, and never errors, whatever the types.
                InfixOperator::Eq => Ok(Object::Boolean(identity_eq(&left, &right))),
                InfixOperator::NotEq => Ok(Object::Boolean(!identity_eq(&left, &right))),
                _ if left.object_type() != right.object_type() => {
                    Err(RuntimeError::TypeMismatch {
                        left: left.object_type(),
                        operator,
                        right: right.object_type(),
                    })
                }
                _ => Err(RuntimeError::UnknownInfixOperator {
                    left: left.object_type(),
                    operator,
                    right: right.object_type(),
                }),
            },
        }
    }

    fn eval_call(
        &mut self,
        callee: Object,
        arguments: &[Expression],
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        match callee {
            Object::Builtin(builtin) => {
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.eval_expression(argument, env)?);
                }
                (builtin.func)(args, &mut self.output)
            }
            Object::Function(function) => {
                if function.parameters.len() > arguments.len() {
                    return Err(RuntimeError::MissingArguments);
                }

                let call_env = Rc::new(RefCell::new(Environment::new_enclosed(Rc::clone(
                    &function.env,
                ))));
                // Extra arguments are neither bound nor evaluated.
                for (name, argument) in function.parameters.iter().zip(arguments) {
                    let value = self.eval_expression(argument, env)?;
                    call_env.borrow_mut().set(name.clone(), value);
                }

                match self.eval_block(&function.body, &call_env)? {
                    Object::Return(value) => Ok(*value),
                    value => Ok(value),
                }
            }
            other => Err(RuntimeError::NotAFunction {
                callee_type: other.object_type(),
            }),
        }
    }

    fn eval_index_expression(&mut self, left: Object, index: Object) -> EvalResult {
        match (&left, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                if *i >= 0 && (*i as usize) < elements.len() {
                    Ok(elements[*i as usize].clone())
                } else {
                    Ok(Object::Null)
                }
            }
            (Object::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnusableHashKey {
                        key_type: index.object_type(),
                    })?;
                Ok(pairs
                    .get(&key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Null))
            }
            _ => Err(RuntimeError::IndexNotSupported {
                left_type: left.object_type(),
            }),
        }
    }

    fn eval_hash(
        &mut self,
        pairs: &[(Expression, Expression)],
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        let mut evaluated = std::collections::BTreeMap::new();
        for (key_expr, value_expr) in pairs {
            let key = self.eval_expression(key_expr, env)?;
            let hashed = key
                .hash_key()
                .ok_or_else(|| RuntimeError::UnusableHashKey {
                    key_type: key.object_type(),
                })?;
            let value = self.eval_expression(value_expr, env)?;
            // First write wins on duplicate keys.
            evaluated
                .entry(hashed)
                .or_insert(HashPair { key, value });
        }
        Ok(Object::Hash(Rc::new(evaluated)))
    }
}

fn eval_integer_infix_expression(operator: InfixOperator, left: i64, right: i64) -> EvalResult {
    let result = match operator {
        InfixOperator::Plus => Object::Integer(left.wrapping_add(right)),
        InfixOperator::Minus => Object::Integer(left.wrapping_sub(right)),
        InfixOperator::Asterisk => Object::Integer(left.wrapping_mul(right)),
        InfixOperator::Slash => {
            if right == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            Object::Integer(left.wrapping_div(right))
        }
        InfixOperator::Percent => {
            if right == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            Object::Integer(left.wrapping_rem(right))
        }
        InfixOperator::Lt => Object::Boolean(left < right),
        InfixOperator::Gt => Object::Boolean(left > right),
        InfixOperator::Eq => Object::Boolean(left == right),
        InfixOperator::NotEq => Object::Boolean(left != right),
    };
    Ok(result)
}

/// `null` and `false` are false; every other value is true, including `0`,
/// empty strings and empty containers.
fn is_truthy(obj: &Object) -> bool {
    match obj {
        Object::Null => false,
        Object::Boolean(value) => *value,
        _ => true,
    }
}
