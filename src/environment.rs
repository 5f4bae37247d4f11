use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// One frame of the lexical scope chain: a set of bindings plus a parent
/// pointer.  Frames are shared mutable objects (`Rc<RefCell<..>>`); a
/// closure holds a reference to its declaration-site frame, not a copy.
///
/// Reads and writes go through [`Environment::lookup`], which resolves a
/// name to the frame that *owns* it.  Declaration (`define`) is the only
/// operation that targets the innermost frame directly.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    /// The global frame: no parent.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// A fresh frame chained under `parent`, already shared.  Block entry,
    /// function calls, and method materialization all open their frames
    /// through this.
    pub fn child(parent: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(parent.clone()),
        }))
    }

    /// Declares `name` in this frame.  Shadowing an outer binding and
    /// redeclaring in the same frame are both allowed.
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}' = {}", name, value);

        self.values.insert(name.to_string(), value);
    }

    /// Walks the chain from `frame` outward and returns the frame that
    /// owns `name`, or `None` when no enclosing frame declares it.
    pub fn lookup(frame: &Rc<RefCell<Environment>>, name: &str) -> Option<Rc<RefCell<Environment>>> {
        let mut current: Rc<RefCell<Environment>> = frame.clone();

        loop {
            if current.borrow().values.contains_key(name) {
                return Some(current);
            }

            let parent = current.borrow().enclosing.clone();

            match parent {
                Some(parent) => current = parent,

                None => {
                    debug!("'{}' owned by no frame", name);

                    return None;
                }
            }
        }
    }

    /// Reads the nearest binding of `name`.
    pub fn get(frame: &Rc<RefCell<Environment>>, name: &str, line: usize) -> Result<Value> {
        match Self::lookup(frame, name) {
            Some(owner) => Ok(owner.borrow().values[name].clone()),

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }

    /// Writes to the frame that owns `name`; there is no implicit
    /// declaration.
    pub fn assign(
        frame: &Rc<RefCell<Environment>>,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        match Self::lookup(frame, name) {
            Some(owner) => {
                debug!("Assigning '{}' = {}", name, value);

                owner.borrow_mut().values.insert(name.to_string(), value);

                Ok(())
            }

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}
