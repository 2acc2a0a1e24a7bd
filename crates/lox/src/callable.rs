//! Callable values: user-defined functions, classes (as constructors), native
//! functions, and the instances classes produce.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionStmt;
use crate::environment::Environment;
use crate::interpreter::{Interpreter, Signal};
use crate::token::Token;
use crate::value::Value;

pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, Signal>>;

/// A `clock`/`printf`-style built-in. Arity is fixed; the body is a Rust
/// closure rather than a Lox declaration.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).field("arity", &self.arity).finish()
    }
}

/// A user-defined function: its declaration, the closure it was declared in,
/// and whether it is a class initializer (`init`), which changes its return
/// contract.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionStmt>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produces a new function whose closure is a fresh child of `this`'s,
    /// defining `this` (the keyword) to `instance`. This is what makes the
    /// `this` keyword resolve to `instance` at depth 0 inside the bound
    /// function's body.
    pub fn bind(this: &Rc<Self>, instance: &Rc<RefCell<Instance>>) -> Rc<LoxFunction> {
        let env = Environment::child(&this.closure);
        env.borrow_mut().define("this", Value::Instance(Rc::clone(instance)));
        Rc::new(LoxFunction {
            declaration: Rc::clone(&this.declaration),
            closure: env,
            is_initializer: this.is_initializer,
        })
    }

    pub fn call(this: &Rc<Self>, interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
        let call_env = Environment::child(&this.closure);
        for (param, arg) in this.declaration.params.iter().zip(args) {
            call_env.borrow_mut().define(param.lexeme.clone(), arg.clone());
        }

        let result = interpreter.execute_block(&this.declaration.body, call_env);

        match result {
            Ok(()) => {
                if this.is_initializer {
                    Ok(Environment::get_at(&this.closure, 0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }
            Err(Signal::Return(value)) => {
                if this.is_initializer {
                    Ok(Environment::get_at(&this.closure, 0, "this"))
                } else {
                    Ok(value)
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// A class value: name, optional superclass, and its own (unbound) methods.
/// Method lookup recurses into the superclass chain.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.superclass.as_ref().and_then(|super_class| super_class.find_method(name))
    }

    /// The arity of `init`, or 0 if the class has none.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    pub fn call(this: &Rc<Self>, interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
        let instance = Rc::new(RefCell::new(Instance { class: Rc::clone(this), fields: HashMap::new() }));
        if let Some(init) = this.find_method("init") {
            let bound = LoxFunction::bind(&init, &instance);
            LoxFunction::call(&bound, interpreter, args)?;
        }
        Ok(Value::Instance(instance))
    }
}

/// An instance of a class: its fields, checked before falling back to a
/// bound method lookup.
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<LoxClass>,
    pub fields: HashMap<String, Value>,
}

impl Instance {
    pub fn get(this: &Rc<RefCell<Self>>, name: &Token) -> Result<Value, String> {
        if let Some(value) = this.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }
        let method = this.borrow().class.find_method(&name.lexeme);
        if let Some(method) = method {
            return Ok(Value::Callable(Callable::Function(LoxFunction::bind(&method, this))));
        }
        Err(format!("Undefined property '{}'.", name.lexeme))
    }

    pub fn set(this: &Rc<RefCell<Self>>, name: &Token, value: Value) {
        this.borrow_mut().fields.insert(name.lexeme.clone(), value);
    }
}

/// Any value that can appear on the left of a `Call` expression.
#[derive(Clone)]
pub enum Callable {
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(f) => f.arity(),
            Callable::Class(c) => c.arity(),
            Callable::Native(n) => n.arity,
        }
    }

    pub fn call(&self, interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
        match self {
            Callable::Function(f) => LoxFunction::call(f, interpreter, args),
            Callable::Class(c) => LoxClass::call(c, interpreter, args),
            Callable::Native(n) => (n.func)(interpreter, args),
        }
    }

    /// Identity comparison for `==`/`!=`: two callables are equal only if
    /// they are the very same value, never by structural comparison.
    pub fn identity_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(fun) => write!(f, "Function({})", fun.declaration.name.lexeme),
            Callable::Class(c) => write!(f, "Class({})", c.name),
            Callable::Native(n) => write!(f, "Native({})", n.name),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(fun) => write!(f, "<fn {}>", fun.declaration.name.lexeme),
            Callable::Class(c) => write!(f, "{}", c.name),
            Callable::Native(n) => write!(f, "<native fn {}>", n.name),
        }
    }
}
