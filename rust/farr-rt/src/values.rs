//! Runtime value representation for the Farr interpreter.
//!
//! Collections and callables are wrapped in `Rc<RefCell<_>>` so that
//! aliasing a list, hash map, or struct instance behaves the way Farr
//! source expects: mutating a variable mutates everyone else holding the
//! same value. Scalars (`Null`, `Bool`, `Integer`, `Float`, `String`) are
//! plain value types and clone cheaply or by copy.

use crate::environment::Environment;
use farr_compiler::compiler::ast::{Itemized, Node};
use farr_core::errors::FarrError;
use num_bigint::BigInt;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type NativeFn = Rc<dyn Fn(Vec<Value>, Vec<(String, Value)>) -> Result<Value, FarrError>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RangeValue {
    pub from: i64,
    pub to: Option<i64>,
    pub by: i64,
}

impl RangeValue {
    /// Materializes the range into concrete steps. `to` must be present —
    /// the spec marks unbounded ranges unsafe for iteration.
    pub fn values(&self) -> Result<Vec<i64>, FarrError> {
        let to = self
            .to
            .ok_or_else(|| FarrError::value("cannot iterate an unbounded range"))?;
        if self.by == 0 {
            return Err(FarrError::value("range step cannot be zero"));
        }
        let mut out = Vec::new();
        let mut cur = self.from;
        if self.by > 0 {
            while cur <= to {
                out.push(cur);
                cur += self.by;
            }
        } else {
            while cur >= to {
                out.push(cur);
                cur += self.by;
            }
        }
        Ok(out)
    }
}

#[derive(Clone)]
pub struct FunctionValue {
    pub identifier: String,
    pub params: Itemized,
    pub body: Rc<Node>,
    pub closure: Rc<RefCell<Environment>>,
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.identifier)
    }
}

#[derive(Clone)]
pub struct StructValue {
    pub identifier: String,
    /// Flattened (parent attributes/body prepended) per the inheritance rule.
    pub attributes: Itemized,
    pub body: Vec<Node>,
    pub closure: Rc<RefCell<Environment>>,
}

impl fmt::Debug for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<struct {}>", self.identifier)
    }
}

#[derive(Debug, Clone)]
pub struct InstanceValue {
    pub struct_name: String,
    pub env: Rc<RefCell<Environment>>,
}

#[derive(Clone)]
pub struct BoundMethod {
    pub instance: Value,
    pub function: Rc<FunctionValue>,
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<bound method {}>", self.function.identifier)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleValue {
    pub name: String,
    pub env: Rc<RefCell<Environment>>,
}

#[derive(Debug, Clone)]
pub struct LibraryValue {
    pub name: String,
    pub env: Rc<RefCell<Environment>>,
    pub submodules: Rc<RefCell<Vec<(String, Value)>>>,
}

/// Every value a Farr expression can produce.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(BigInt),
    Float(f64),
    String(Rc<String>),
    Range(Rc<RangeValue>),
    Pair(Box<Value>, Box<Value>),
    List(Rc<RefCell<Vec<Value>>>),
    /// Ordered pairs, deduplicated by value-equal keys.
    HashMap(Rc<RefCell<Vec<(Value, Value)>>>),
    Native(String, NativeFn),
    Function(Rc<FunctionValue>),
    Struct(Rc<StructValue>),
    Instance(Rc<RefCell<InstanceValue>>),
    BoundMethod(Rc<BoundMethod>),
    Module(Rc<ModuleValue>),
    Library(Rc<LibraryValue>),
    Error(Rc<FarrError>),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(n) => n != &BigInt::from(0),
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::HashMap(m) => !m.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NullObject",
            Value::Bool(_) => "BooleanObject",
            Value::Integer(_) => "IntegerObject",
            Value::Float(_) => "FloatObject",
            Value::String(_) => "StringObject",
            Value::Range(_) => "RangeObject",
            Value::Pair(..) => "PairObject",
            Value::List(_) => "ListObject",
            Value::HashMap(_) => "HashMapObject",
            Value::Native(..) => "NativeFunctionObject",
            Value::Function(_) => "FunctionObject",
            Value::Struct(_) => "StructObject",
            Value::Instance(_) => "InstanceObject",
            Value::BoundMethod(_) => "BoundMethodObject",
            Value::Module(_) => "ModuleObject",
            Value::Library(_) => "LibraryObject",
            Value::Error(_) => "ErrorObject",
        }
    }

    /// Value equality, used for relational `==`/`!=` and hash map key
    /// deduplication. Collections compare element-wise; callables and
    /// instances compare by identity (pointer equality of their shared cell).
    pub fn value_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                a.to_string().parse::<f64>().map(|a| a == *b).unwrap_or(false)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Pair(ak, av), Value::Pair(bk, bv)) => ak.value_eq(bk) && av.value_eq(bv),
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.value_eq(y))
            }
            (Value::HashMap(a), Value::HashMap(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.value_eq(k2) && v.value_eq(v2))
                    })
            }
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a, _), Value::Native(b, _)) => a == b,
            _ => false,
        }
    }

    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.to_string(),
            Value::Range(r) => match r.to {
                Some(to) => format!("[{}..{} by {}]", r.from, to, r.by),
                None => format!("[{}.. by {}]", r.from, r.by),
            },
            Value::Pair(k, v) => format!(":{} {}", k.display_string(), v.display_string()),
            Value::List(l) => {
                let items: Vec<String> = l.borrow().iter().map(Value::display_string).collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::HashMap(m) => {
                let items: Vec<String> = m
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!(":{} {}", k.display_string(), v.display_string()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Native(name, _) => format!("<native {name}>"),
            Value::Function(f) => format!("<function {}>", f.identifier),
            Value::Struct(s) => format!("<struct {}>", s.identifier),
            Value::Instance(i) => format!("<instance {}>", i.borrow().struct_name),
            Value::BoundMethod(m) => format!("<bound method {}>", m.function.identifier),
            Value::Module(m) => format!("<module {}>", m.name),
            Value::Library(l) => format!("<library {}>", l.name),
            Value::Error(e) => format!("{}: {}", e.kind, e.message),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_compare_by_value() {
        let a = Value::Integer(BigInt::from(3));
        let b = Value::Integer(BigInt::from(3));
        assert!(a.value_eq(&b));
    }

    #[test]
    fn lists_alias_through_their_shared_cell() {
        let list = Value::List(Rc::new(RefCell::new(vec![Value::Integer(BigInt::from(1))])));
        let alias = list.clone();
        if let Value::List(cell) = &list {
            cell.borrow_mut().push(Value::Integer(BigInt::from(2)));
        }
        if let Value::List(cell) = &alias {
            assert_eq!(cell.borrow().len(), 2);
        } else {
            panic!("expected list");
        }
    }

    #[test]
    fn falsy_values() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Integer(BigInt::from(0)).truthy());
        assert!(!Value::String(Rc::new(String::new())).truthy());
        assert!(Value::Integer(BigInt::from(1)).truthy());
    }
}
