//! Linked scope frames.
//!
//! A frame is a name→value map plus an optional parent. Frames are shared by
//! multiple holders (closures, call frames, the class `this`-binding
//! machinery) so they live behind `Rc<RefCell<_>>`; a frame's lifetime is
//! that of its longest-lived holder, and cycles through closures that
//! transitively reference their own class are expected and left to `Rc`'s
//! lifetime rules rather than collected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::token::Token;
use crate::value::Value;

#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    parent: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn global() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { values: HashMap::new(), parent: None }))
    }

    pub fn child(parent: &Rc<RefCell<Self>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { values: HashMap::new(), parent: Some(Rc::clone(parent)) }))
    }

    /// Unconditionally binds `name`, overwriting any existing value in this
    /// frame. The resolver prevents illegal local redefinition; the global
    /// frame permits redefinition by design.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, String> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }
        if let Some(parent) = &self.parent {
            return parent.borrow().get(name);
        }
        Err(format!("Undefined variable '{}'.", name.lexeme))
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), String> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            return Ok(());
        }
        if let Some(parent) = &self.parent {
            return parent.borrow_mut().assign(name, value);
        }
        Err(format!("Undefined variable '{}'.", name.lexeme))
    }

    fn ancestor(this: &Rc<RefCell<Self>>, distance: usize) -> Rc<RefCell<Self>> {
        let mut frame = Rc::clone(this);
        for _ in 0..distance {
            let parent = frame
                .borrow()
                .parent
                .clone()
                .expect("resolver-computed distance must not exceed the environment chain");
            frame = parent;
        }
        frame
    }

    pub fn get_at(this: &Rc<RefCell<Self>>, distance: usize, name: &str) -> Value {
        let frame = Self::ancestor(this, distance);
        let value = frame
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolver recorded distance {distance} for '{name}' but frame has no binding"));
        value
    }

    pub fn assign_at(this: &Rc<RefCell<Self>>, distance: usize, name: &Token, value: Value) {
        let frame = Self::ancestor(this, distance);
        frame.borrow_mut().values.insert(name.lexeme.clone(), value);
    }

    /// Looks up `name` by walking the chain from `this` outward, with no
    /// resolver-computed distance. Used for expressions the resolver never
    /// saw (a `printf` embedded substitution), where a `Variable`/`This`/
    /// `Super` node has no entry in the interpreter's distance table.
    pub fn get_dynamic(this: &Rc<RefCell<Self>>, name: &str) -> Option<Value> {
        if let Some(value) = this.borrow().values.get(name) {
            return Some(value.clone());
        }
        let parent = this.borrow().parent.clone()?;
        Self::get_dynamic(&parent, name)
    }

    /// Assigns to the nearest frame in the chain from `this` outward that
    /// already defines `name`, with no resolver-computed distance. Returns
    /// `false` if no frame in the chain defines `name`.
    pub fn assign_dynamic(this: &Rc<RefCell<Self>>, name: &str, value: Value) -> bool {
        if this.borrow().values.contains_key(name) {
            this.borrow_mut().values.insert(name.to_owned(), value);
            return true;
        }
        match this.borrow().parent.clone() {
            Some(parent) => Self::assign_dynamic(&parent, name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenKind};

    fn ident(name: &str) -> Token {
        Token::new(TokenKind::Identifier, name.to_owned(), None, 0, name.len() as u32)
    }

    #[test]
    fn get_falls_back_to_parent() {
        let global = Environment::global();
        global.borrow_mut().define("a", Value::Number(1.0));
        let child = Environment::child(&global);
        assert_eq!(child.borrow().get(&ident("a")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn assign_updates_the_defining_frame_not_a_shadow() {
        let global = Environment::global();
        global.borrow_mut().define("a", Value::Number(1.0));
        let child = Environment::child(&global);
        child.borrow_mut().assign(&ident("a"), Value::Number(2.0)).unwrap();
        assert_eq!(global.borrow().get(&ident("a")), Ok(Value::Number(2.0)));
    }

    #[test]
    fn get_at_walks_exact_distance() {
        let global = Environment::global();
        global.borrow_mut().define("a", Value::Number(0.0));
        let mid = Environment::child(&global);
        mid.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::child(&mid);
        assert_eq!(Environment::get_at(&inner, 1, "a"), Value::Number(1.0));
        assert_eq!(Environment::get_at(&inner, 2, "a"), Value::Number(0.0));
    }

    #[test]
    fn undefined_variable_reports_lexeme() {
        let global = Environment::global();
        assert_eq!(global.borrow().get(&ident("missing")), Err("Undefined variable 'missing'.".to_owned()));
    }
}
