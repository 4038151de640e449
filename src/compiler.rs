//! Bytecode compiler.
//!
//! Walks the AST emitting instructions into a stack of per-function scopes,
//! growing one constant pool and one symbol table that move in lockstep with
//! the scope stack. `<` is lowered by swapping operands around
//! `OpGreaterThan`; a trailing `OpPop` in a function body is rewritten into
//! `OpReturnValue` so every function ends by returning.

use std::rc::Rc;

use thiserror::Error;

use crate::ast::{BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement};
use crate::builtins::BUILTINS;
use crate::code::{self, Instructions, Opcode};
use crate::object::{CompiledFunction, Object};
use crate::symbol_table::{Symbol, SymbolScope, SymbolTable};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("undefined variable {name}")]
    UndefinedVariable { name: String },
    #[error("unknown operator {operator}")]
    UnknownOperator { operator: InfixOperator },
}

/// Compilation result: top-level instructions plus the constant pool they
/// index into.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }
        Self::with_state(symbol_table, Vec::new())
    }

    /// Resumes compilation over state threaded from a previous run, as the
    /// REPL does between lines.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Object>) -> Self {
        Self {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::default()],
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_scope().instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    /// Hands the symbol table and constant pool back for the next
    /// compile-and-run round.
    pub fn into_state(self) -> (SymbolTable, Vec<Object>) {
        (self.symbol_table, self.constants)
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Let { name, value } => {
                // Defined before the value compiles so the body of a
                // function literal can resolve its own name.
                let symbol = self.symbol_table.define(name);
                match value {
                    Expression::Function { parameters, body } => {
                        self.compile_function(parameters, body, Some(name))?;
                    }
                    _ => self.compile_expression(value)?,
                }
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
                Ok(())
            }
            Statement::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
                Ok(())
            }
            Statement::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[]);
                Ok(())
            }
        }
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in block {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::Integer(value) => {
                let index = self.add_constant(Object::Integer(*value));
                self.emit(Opcode::Constant, &[index]);
            }
            Expression::Boolean(value) => {
                if *value {
                    self.emit(Opcode::True, &[]);
                } else {
                    self.emit(Opcode::False, &[]);
                }
            }
            Expression::String(value) => {
                let index = self.add_constant(Object::string(value.clone()));
                self.emit(Opcode::Constant, &[index]);
            }
            Expression::Null => {
                self.emit(Opcode::Null, &[]);
            }
            Expression::Identifier(name) => {
                let symbol = self.symbol_table.resolve(name).ok_or_else(|| {
                    CompileError::UndefinedVariable { name: name.clone() }
                })?;
                self.load_symbol(&symbol);
            }
            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator {
                    PrefixOperator::Bang => self.emit(Opcode::Bang, &[]),
                    PrefixOperator::Minus => self.emit(Opcode::Minus, &[]),
                };
            }
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                // `<` lowers by swapping the operands around OpGreaterThan.
                let (first, second) = if *operator == InfixOperator::Lt {
                    (right, left)
                } else {
                    (left, right)
                };
                self.compile_expression(first)?;
                self.compile_expression(second)?;
                let opcode = match operator {
                    InfixOperator::Plus => Opcode::Add,
                    InfixOperator::Minus => Opcode::Sub,
                    InfixOperator::Asterisk => Opcode::Mul,
                    InfixOperator::Slash => Opcode::Div,
                    InfixOperator::Lt | InfixOperator::Gt => Opcode::GreaterThan,
                    InfixOperator::Eq => Opcode::Equal,
                    InfixOperator::NotEq => Opcode::NotEqual,
                    InfixOperator::Percent => {
                        return Err(CompileError::UnknownOperator {
                            operator: *operator,
                        });
                    }
                };
                self.emit(opcode, &[]);
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;
                // Placeholder targets are patched once each branch's
                // length is known.
                let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[9999]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }
                let jump = self.emit(Opcode::Jump, &[9999]);

                let after_consequence = self.current_scope().instructions.len();
                self.change_operand(jump_not_truthy, after_consequence);

                match alternative {
                    Some(alternative) => {
                        self.compile_block(alternative)?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }
                let after_alternative = self.current_scope().instructions.len();
                self.change_operand(jump, after_alternative);
            }
            Expression::Function { parameters, body } => {
                self.compile_function(parameters, body, None)?;
            }
            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
            Expression::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expression::Hash(pairs) => {
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        parameters: &[String],
        body: &BlockStatement,
        name: Option<&str>,
    ) -> Result<(), CompileError> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for parameter in parameters {
            self.symbol_table.define(parameter);
        }

        self.compile_block(body)?;

        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let (instructions, free_symbols, num_locals) = self.leave_scope();

        for free in &free_symbols {
            self.load_symbol(free);
        }

        let function = Object::CompiledFunction(Rc::new(CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        }));
        let index = self.add_constant(function);
        self.emit(Opcode::Closure, &[index, free_symbols.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
    }

    fn leave_scope(&mut self) -> (Instructions, Vec<Symbol>, usize) {
        let scope = self.scopes.pop().expect("scope stack is never empty");
        let table = std::mem::take(&mut self.symbol_table);
        let outer = table.outer.expect("leave_scope called on the root scope");
        self.symbol_table = *outer;
        (scope.instructions, table.free_symbols, table.num_definitions)
    }

    fn add_constant(&mut self, obj: Object) -> usize {
        self.constants.push(obj);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = code::make(op, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let scope = self.current_scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = self.current_scope_mut();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        let scope = self.current_scope();
        if scope.instructions.is_empty() {
            return false;
        }
        scope
            .last_instruction
            .is_some_and(|last| last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        let last = scope
            .last_instruction
            .expect("remove_last_pop requires an emitted instruction");
        scope.instructions.truncate(last.position);
        scope.last_instruction = scope.previous_instruction;
    }

    fn replace_last_pop_with_return(&mut self) {
        let last = self
            .current_scope()
            .last_instruction
            .expect("replace_last_pop_with_return requires an emitted instruction");
        let new_instruction = code::make(Opcode::ReturnValue, &[]);
        self.replace_instruction(last.position, &new_instruction);
        self.current_scope_mut().last_instruction = Some(EmittedInstruction {
            opcode: Opcode::ReturnValue,
            position: last.position,
        });
    }

    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = Opcode::from_byte(self.current_scope().instructions[position])
            .expect("change_operand points at an emitted opcode");
        let new_instruction = code::make(op, &[operand]);
        self.replace_instruction(position, &new_instruction);
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let instructions = &mut self.current_scope_mut().instructions;
        instructions[position..position + new_instruction.len()].copy_from_slice(new_instruction);
    }

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }
}
