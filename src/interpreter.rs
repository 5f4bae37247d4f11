use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::{Expr, LiteralValue};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::{Instance, LoxClass, LoxFunction, Value};

/// Non-local control transfer out of statement execution.
///
/// `Return` unwinds to the nearest enclosing function call frame and is
/// absorbed there; `Error` propagates all the way to the driver.  Keeping
/// them in one enum but separate variants guarantees the two channels can
/// never be confused: a runtime error inside a callee passes *through* the
/// call site, a `return` never passes beyond it.
enum Unwind {
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(err: LoxError) -> Self {
        Unwind::Error(err)
    }
}

/// Tree-walking evaluator.
///
/// Program output goes to the injected sink (stdout by default), which is
/// how the integration tests observe `print`.
pub struct Interpreter {
    environment: Rc<RefCell<Environment>>,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        let environment = Rc::new(RefCell::new(Environment::new()));

        environment.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            },
        );

        Interpreter { environment, out }
    }

    /// Top-level entry point for the `run` mode: executes one declaration
    /// against the global environment.
    pub fn interpret(&mut self, stmt: &Stmt) -> Result<()> {
        match self.execute(stmt) {
            Ok(()) => Ok(()),

            Err(Unwind::Error(e)) => Err(e),

            // The parser rejects `return` outside a function body.
            Err(Unwind::Return(_)) => unreachable!("return unwound to top level"),
        }
    }

    fn execute(&mut self, stmt: &Stmt) -> std::result::Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value).map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => self.execute_block(statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(declaration) => {
                debug!("Declaring function '{}'", declaration.name.lexeme);

                let function = LoxFunction {
                    declaration: declaration.clone(),
                    closure: self.environment.clone(),
                };

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass = match superclass {
                    Some(token) => {
                        let value =
                            Environment::get(&self.environment, &token.lexeme, token.line)?;

                        match value {
                            Value::Class(class) => Some(class),

                            _ => {
                                return Err(LoxError::runtime(
                                    token.line,
                                    "Superclass must be a class.",
                                )
                                .into())
                            }
                        }
                    }

                    None => None,
                };

                debug!("Declaring class '{}'", name.lexeme);

                let class = LoxClass {
                    name: name.lexeme.clone(),
                    superclass,
                    methods: methods.clone(),
                    closure: self.environment.clone(),
                };

                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Class(Rc::new(class)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }
        }
    }

    /// Runs `statements` in a fresh child frame; the frame is discarded on
    /// exit, including the unwinding exits.
    fn execute_block(&mut self, statements: &[Stmt]) -> std::result::Result<(), Unwind> {
        let previous: Rc<RefCell<Environment>> = self.environment.clone();

        self.environment = Environment::child(&previous);

        for stmt in statements {
            if let Err(unwind) = self.execute(stmt) {
                self.environment = previous;

                return Err(unwind);
            }
        }

        self.environment = previous;

        Ok(())
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping { expression, .. } => self.evaluate(expression),

            Expr::Unary { operator, right } => {
                let value: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),

                        _ => Err(LoxError::runtime(operator.line, "Operand must be a number.")),
                    },

                    TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

                    _ => unreachable!("invalid unary operator"),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                // The result is the operand that decided the outcome, not
                // a coerced boolean.
                match operator.token_type {
                    TokenType::OR => {
                        if left_val.is_truthy() {
                            Ok(left_val)
                        } else {
                            self.evaluate(right)
                        }
                    }

                    TokenType::AND => {
                        if !left_val.is_truthy() {
                            Ok(left_val)
                        } else {
                            self.evaluate(right)
                        }
                    }

                    _ => unreachable!("invalid logical operator"),
                }
            }

            Expr::Variable { name } => Environment::get(&self.environment, &name.lexeme, name.line),

            Expr::Assign { name, value } => {
                let value: Value = self.evaluate(value)?;

                Environment::assign(&self.environment, &name.lexeme, value.clone(), name.line)?;

                Ok(value)
            }

            Expr::Call {
                callee,
                arguments,
                line,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee_val, args, *line)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let instance = instance.borrow();

                        // Methods shadow properties, at every level of the
                        // super chain.
                        if let Some(method) = instance.find_method(&name.lexeme) {
                            return Ok(method);
                        }

                        match instance.properties.get(&name.lexeme) {
                            Some(value) => Ok(value.clone()),

                            None => Err(LoxError::runtime(
                                name.line,
                                format!("Undefined property '{}'.", name.lexeme),
                            )),
                        }
                    }

                    _ => Err(LoxError::runtime(
                        name.line,
                        "Only instances have properties.",
                    )),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        if instance.borrow().find_method(&name.lexeme).is_some() {
                            return Err(LoxError::runtime(
                                name.line,
                                format!("Cannot assign to method '{}'.", name.lexeme),
                            ));
                        }

                        let value = self.evaluate(value)?;

                        instance
                            .borrow_mut()
                            .properties
                            .insert(name.lexeme.clone(), value);

                        // A property write evaluates to nil, unlike
                        // variable assignment.
                        Ok(Value::Nil)
                    }

                    _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
                }
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value> {
        // Both operands evaluate, left then right, before any type check;
        // side effects on the left always run.
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
            },

            // Division by zero is IEEE-754 infinity or NaN, never an error.
            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
            },

            _ => unreachable!("invalid binary operator"),
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>, line: usize) -> Result<Value> {
        match callee {
            Value::NativeFunction { arity, func, .. } => {
                check_arity(arity, args.len(), line)?;

                func(&args).map_err(|msg| LoxError::runtime(line, msg))
            }

            Value::Function(function) => {
                check_arity(function.arity(), args.len(), line)?;

                self.call_function(&function, args)
            }

            Value::Class(class) => {
                check_arity(class.arity(), args.len(), line)?;

                self.instantiate(&class, args)
            }

            _ => Err(LoxError::runtime(
                line,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Invokes a user function: a fresh frame chained to the function's
    /// closure (not to the caller), parameters bound, body executed.
    /// `Unwind::Return` is absorbed here; a runtime error keeps going.
    fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> Result<Value> {
        debug!("Calling <fn {}>", function.name());

        let frame = Environment::child(&function.closure);

        for (param, arg) in function.declaration.params.iter().zip(args) {
            frame.borrow_mut().define(&param.lexeme, arg);
        }

        let previous = std::mem::replace(&mut self.environment, frame);

        let mut result: Result<Value> = Ok(Value::Nil);

        for stmt in &function.declaration.body {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(Unwind::Return(value)) => {
                    result = Ok(value);
                    break;
                }

                Err(Unwind::Error(e)) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    /// Calls a class: allocates the instance, materializes the method
    /// tables for the whole inheritance chain, then runs `init` if the
    /// chain has one.  The instance is the result regardless of what
    /// `init` returns.
    fn instantiate(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> Result<Value> {
        info!("Instantiating class {}", class.name);

        let instance = Rc::new(RefCell::new(Instance::new(class.name.clone())));

        let local_env = Environment::child(&class.closure);

        // Every level of the chain sees the same `this`: the outermost
        // instance under construction.
        local_env
            .borrow_mut()
            .define("this", Value::Instance(instance.clone()));

        let super_instance = materialize_super_chain(&local_env, class.superclass.as_deref());

        let super_value = match &super_instance {
            Some(super_instance) => Value::Instance(super_instance.clone()),
            None => Value::Nil,
        };

        local_env.borrow_mut().define("super", super_value);

        instance.borrow_mut().super_instance = super_instance;

        for method in &class.methods {
            let function = LoxFunction {
                declaration: method.clone(),
                closure: local_env.clone(),
            };

            instance
                .borrow_mut()
                .methods
                .insert(method.name.lexeme.clone(), Value::Function(Rc::new(function)));
        }

        let initializer = instance.borrow().find_method("init");

        if let Some(Value::Function(init)) = initializer {
            self.call_function(&init, args)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

/// Builds the super-instance for `class`'s superclass, recursively.  Each
/// level gets a fresh frame holding its own `super` binding (`nil` at the
/// root), chained under the level below so `this` stays reachable.
fn materialize_super_chain(
    enclosing: &Rc<RefCell<Environment>>,
    superclass: Option<&LoxClass>,
) -> Option<Rc<RefCell<Instance>>> {
    let class = superclass?;

    let instance = Rc::new(RefCell::new(Instance::new(class.name.clone())));

    let local_env = Environment::child(enclosing);

    let super_instance = materialize_super_chain(&local_env, class.superclass.as_deref());

    let super_value = match &super_instance {
        Some(super_instance) => Value::Instance(super_instance.clone()),
        None => Value::Nil,
    };

    local_env.borrow_mut().define("super", super_value);

    instance.borrow_mut().super_instance = super_instance;

    for method in &class.methods {
        let function = LoxFunction {
            declaration: method.clone(),
            closure: local_env.clone(),
        };

        instance
            .borrow_mut()
            .methods
            .insert(method.name.lexeme.clone(), Value::Function(Rc::new(function)));
    }

    Some(instance)
}

fn check_arity(arity: usize, argc: usize, line: usize) -> Result<()> {
    if arity != argc {
        return Err(LoxError::runtime(
            line,
            format!("Expected {} arguments but got {}.", arity, argc),
        ));
    }

    Ok(())
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
