//! Dynamic values seen by generated code.
//!
//! This is the smallest value model the continuation runtime needs: plain
//! data, shared objects and arrays, callables, settlement cells, generator
//! objects, and runtime errors. Reference types compare by identity.

use crate::error::ErrorValue;
use crate::generator::{GeneratorRef, Resumption};
use crate::thenable::Thenable;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ObjectMap = IndexMap<String, Value>;

/// Anything generated code can invoke.
pub trait Callable {
    /// Invoke with a receiver and arguments. `Err` carries a thrown value.
    fn call(&self, this: Value, args: &[Value]) -> Result<Value, Value>;

    fn name(&self) -> &str {
        ""
    }
}

type NativeFn = dyn Fn(Value, &[Value]) -> Result<Value, Value>;

/// A callable implemented in Rust.
pub struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(Value, &[Value]) -> Result<Value, Value> + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl Callable for NativeFunction {
    fn call(&self, this: Value, args: &[Value]) -> Result<Value, Value> {
        (self.func)(this, args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    Function(Rc<dyn Callable>),
    Thenable(Thenable),
    Generator(GeneratorRef),
    Error(Rc<ErrorValue>),
}

/// Argument `i`, or `undefined` when the caller passed fewer.
pub fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Object(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn empty_object() -> Value {
        Value::Object(Rc::new(RefCell::new(ObjectMap::new())))
    }

    pub fn native(
        name: impl Into<String>,
        func: impl Fn(Value, &[Value]) -> Result<Value, Value> + 'static,
    ) -> Value {
        Value::Function(Rc::new(NativeFunction::new(name, func)))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_thenable(&self) -> Option<&Thenable> {
        match self {
            Value::Thenable(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Array(_)
            | Value::Object(_)
            | Value::Thenable(_)
            | Value::Generator(_)
            | Value::Error(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// `ToString` for the value kinds the runtime models.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            Value::Thenable(_) => "[object Promise]".to_string(),
            Value::Generator(_) => "[object Generator]".to_string(),
            Value::Error(err) => err.to_string(),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Thenable(a), Value::Thenable(b)) => a.ptr_eq(b),
            (Value::Generator(a), Value::Generator(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`, limited to the coercions between primitives.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                if matches!(self, Value::Bool(_) | Value::Number(_) | Value::String(_))
                    && matches!(other, Value::Bool(_) | Value::Number(_) | Value::String(_))
                {
                    self.to_number() == other.to_number()
                } else {
                    false
                }
            }
            _ => self.strict_equals(other),
        }
    }

    /// Call this value as a function.
    pub fn call(&self, this: Value, args: &[Value]) -> Result<Value, Value> {
        match self {
            Value::Function(f) => f.call(this, args),
            other => Err(Value::type_error(format!(
                "{} is not a function",
                other.to_display_string()
            ))),
        }
    }

    /// Property read, including the built-in members generated code relies
    /// on (`then` on cells, `next`/`throw` on generators, `length`, `push`).
    pub fn get_property(&self, name: &str) -> Result<Value, Value> {
        match self {
            Value::Undefined | Value::Null => Err(Value::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                self.to_display_string(),
                name
            ))),
            Value::Object(map) => Ok(map.borrow().get(name).cloned().unwrap_or_default()),
            Value::Array(items) => Ok(array_member(items, name)),
            Value::String(s) => Ok(match name {
                "length" => Value::Number(s.encode_utf16().count() as f64),
                _ => Value::Undefined,
            }),
            Value::Error(err) => Ok(match name {
                "message" => Value::string(&err.message),
                "name" => Value::string(err.kind.name()),
                _ => Value::Undefined,
            }),
            Value::Function(f) => Ok(function_member(f, name)),
            Value::Thenable(cell) => Ok(cell_member(cell, name)),
            Value::Generator(generator) => Ok(generator_member(generator, name)),
            Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
        }
    }

    pub fn set_property(&self, name: &str, value: Value) -> Result<(), Value> {
        match self {
            Value::Object(map) => {
                map.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                if name == "length" {
                    let len = value.to_number();
                    if len >= 0.0 && len.fract() == 0.0 {
                        items.borrow_mut().resize(len as usize, Value::Undefined);
                        return Ok(());
                    }
                    return Err(Value::range_error("Invalid array length"));
                }
                match name.parse::<usize>() {
                    Ok(index) => {
                        set_array_index(items, index, value);
                        Ok(())
                    }
                    Err(_) => Ok(()),
                }
            }
            Value::Undefined | Value::Null => Err(Value::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                self.to_display_string(),
                name
            ))),
            _ => Ok(()),
        }
    }

    /// `value[key]` with the key already evaluated.
    pub fn get_element(&self, key: &Value) -> Result<Value, Value> {
        if let (Value::Array(items), Value::Number(n)) = (self, key) {
            if *n >= 0.0 && n.fract() == 0.0 {
                return Ok(items.borrow().get(*n as usize).cloned().unwrap_or_default());
            }
        }
        self.get_property(&key.to_display_string())
    }

    pub fn set_element(&self, key: &Value, value: Value) -> Result<(), Value> {
        if let (Value::Array(items), Value::Number(n)) = (self, key) {
            if *n >= 0.0 && n.fract() == 0.0 {
                set_array_index(items, *n as usize, value);
                return Ok(());
            }
        }
        self.set_property(&key.to_display_string(), value)
    }

    /// Enumerable own keys, in insertion order (`for...in`).
    pub fn own_keys(&self) -> Vec<String> {
        match self {
            Value::Object(map) => map.borrow().keys().cloned().collect(),
            Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            Value::String(s) => (0..s.encode_utf16().count()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }
}

fn set_array_index(items: &Rc<RefCell<Vec<Value>>>, index: usize, value: Value) {
    let mut items = items.borrow_mut();
    if index >= items.len() {
        items.resize(index + 1, Value::Undefined);
    }
    items[index] = value;
}

fn array_member(items: &Rc<RefCell<Vec<Value>>>, name: &str) -> Value {
    match name {
        "length" => Value::Number(items.borrow().len() as f64),
        "push" => {
            let target = Rc::clone(items);
            Value::native("push", move |_, args| {
                let mut items = target.borrow_mut();
                items.extend(args.iter().cloned());
                Ok(Value::Number(items.len() as f64))
            })
        }
        _ => match name.parse::<usize>() {
            Ok(index) => items.borrow().get(index).cloned().unwrap_or_default(),
            Err(_) => Value::Undefined,
        },
    }
}

fn function_member(function: &Rc<dyn Callable>, name: &str) -> Value {
    match name {
        "name" => Value::string(function.name()),
        // `f.call(receiver, ...args)`
        "call" => {
            let function = Rc::clone(function);
            Value::native("call", move |_, args| {
                let rest = args.get(1..).unwrap_or_default();
                function.call(arg(args, 0), rest)
            })
        }
        _ => Value::Undefined,
    }
}

fn cell_member(cell: &Thenable, name: &str) -> Value {
    match name {
        "then" => {
            let cell = cell.clone();
            Value::native("then", move |_, args| {
                Ok(Value::Thenable(cell.on_settle(arg(args, 0), arg(args, 1))))
            })
        }
        "catch" => {
            let cell = cell.clone();
            Value::native("catch", move |_, args| {
                Ok(Value::Thenable(cell.on_settle(Value::Undefined, arg(args, 0))))
            })
        }
        _ => Value::Undefined,
    }
}

fn generator_member(generator: &GeneratorRef, name: &str) -> Value {
    let resumption: fn(Value) -> Resumption = match name {
        "next" => Resumption::Next,
        "throw" => Resumption::Throw,
        _ => return Value::Undefined,
    };
    let generator = generator.clone();
    Value::native(name, move |_, args| {
        generator.resume_to_result(resumption(arg(args, 0)))
    })
}

/// Number to string the way JavaScript prints common values.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.borrow().iter()).finish(),
            Value::Thenable(cell) => write!(f, "Thenable#{}({:?})", cell.id(), cell.state_name()),
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Thenable> for Value {
    fn from(cell: Thenable) -> Self {
        Value::Thenable(cell)
    }
}
