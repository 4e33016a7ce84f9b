//! Subscripting and the builtin method surface on lists, hash maps, strings,
//! and ranges. Instances and modules resolve attribute/method access through
//! their own environment instead; this module only covers primitive types.

use crate::values::Value;
use farr_core::errors::FarrError;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::rc::Rc;

fn as_index(value: &Value) -> Result<i64, FarrError> {
    match value {
        Value::Integer(n) => n
            .to_i64()
            .ok_or_else(|| FarrError::value("index too large")),
        other => Err(FarrError::type_(format!(
            "expected an integer index, got {}",
            other.type_name()
        ))),
    }
}

/// `target.[from]` or `target.[from..to]`. `to` is only meaningful for
/// list/string slicing; hash maps always do a key lookup on `from`.
pub fn subscript(target: &Value, from: &Value, to: Option<&Value>) -> Result<Value, FarrError> {
    match target {
        Value::List(cell) => {
            let list = cell.borrow();
            match to {
                None => {
                    let idx = as_index(from)?;
                    let pos = resolve_index(idx, list.len())?;
                    Ok(list[pos].clone())
                }
                Some(to) => {
                    let (start, end) = resolve_slice(as_index(from)?, as_index(to)?, list.len())?;
                    Ok(Value::List(Rc::new(RefCell::new(list[start..end].to_vec()))))
                }
            }
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            match to {
                None => {
                    let idx = as_index(from)?;
                    let pos = resolve_index(idx, chars.len())?;
                    Ok(Value::String(Rc::new(chars[pos].to_string())))
                }
                Some(to) => {
                    let (start, end) = resolve_slice(as_index(from)?, as_index(to)?, chars.len())?;
                    Ok(Value::String(Rc::new(chars[start..end].iter().collect())))
                }
            }
        }
        Value::HashMap(cell) => cell
            .borrow()
            .iter()
            .find(|(k, _)| k.value_eq(from))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| FarrError::lookup("key not found")),
        other => Err(FarrError::type_(format!(
            "{} does not support subscripting",
            other.type_name()
        ))),
    }
}

/// Converts a 1-based (possibly negative, counting from the end) index into
/// a 0-based position, bounds-checked against `len`.
fn resolve_index(idx: i64, len: usize) -> Result<usize, FarrError> {
    let len = len as i64;
    let pos = if idx > 0 { idx - 1 } else { len + idx };
    if pos < 0 || pos >= len {
        return Err(FarrError::lookup("index out of range"));
    }
    Ok(pos as usize)
}

fn resolve_slice(from: i64, to: i64, len: usize) -> Result<(usize, usize), FarrError> {
    let start = resolve_index(from, len)?;
    let end = resolve_index(to, len)?;
    if start > end {
        return Err(FarrError::value("slice start is after slice end"));
    }
    Ok((start, end + 1))
}

fn list_of(values: Vec<Value>) -> Value {
    Value::List(Rc::new(RefCell::new(values)))
}

/// Dispatches a zero/one-or-more-argument call on a non-instance receiver
/// to its builtin method implementation.
pub fn call(receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, FarrError> {
    match receiver {
        Value::List(cell) => list_method(cell, name, args),
        Value::HashMap(cell) => hashmap_method(cell, name, args),
        Value::String(s) => string_method(s, name, args),
        Value::Range(r) => range_method(r, name),
        Value::Pair(k, v) => pair_method(k, v, name),
        other => Err(FarrError::attribute(format!(
            "{} has no method '{name}'",
            other.type_name()
        ))),
    }
}

fn list_method(cell: &Rc<RefCell<Vec<Value>>>, name: &str, args: Vec<Value>) -> Result<Value, FarrError> {
    match name {
        "length" => Ok(Value::Integer(BigInt::from(cell.borrow().len()))),
        "isempty?" => Ok(Value::Bool(cell.borrow().is_empty())),
        "first" => cell.borrow().first().cloned().ok_or_else(|| FarrError::lookup("list is empty")),
        "last" => cell.borrow().last().cloned().ok_or_else(|| FarrError::lookup("list is empty")),
        "iappend!" => {
            cell.borrow_mut().extend(args);
            Ok(Value::List(cell.clone()))
        }
        "iprepend!" => {
            let mut rest = args;
            rest.extend(cell.borrow().iter().cloned());
            *cell.borrow_mut() = rest;
            Ok(Value::List(cell.clone()))
        }
        "pop!" => cell.borrow_mut().pop().ok_or_else(|| FarrError::lookup("list is empty")),
        "ireverse!" => {
            cell.borrow_mut().reverse();
            Ok(Value::List(cell.clone()))
        }
        "reverse" => {
            let mut items = cell.borrow().clone();
            items.reverse();
            Ok(list_of(items))
        }
        "contains?" => {
            let needle = args.into_iter().next().ok_or_else(|| FarrError::type_("missing argument"))?;
            Ok(Value::Bool(cell.borrow().iter().any(|v| v.value_eq(&needle))))
        }
        "join" => {
            let sep = match args.into_iter().next() {
                Some(Value::String(s)) => (*s).clone(),
                _ => String::new(),
            };
            let parts: Vec<String> = cell.borrow().iter().map(Value::display_string).collect();
            Ok(Value::String(Rc::new(parts.join(&sep))))
        }
        "clear!" => {
            cell.borrow_mut().clear();
            Ok(Value::List(cell.clone()))
        }
        other => Err(FarrError::attribute(format!("list has no method '{other}'"))),
    }
}

fn hashmap_method(
    cell: &Rc<RefCell<Vec<(Value, Value)>>>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, FarrError> {
    match name {
        "length" => Ok(Value::Integer(BigInt::from(cell.borrow().len()))),
        "isempty?" => Ok(Value::Bool(cell.borrow().is_empty())),
        "keys" => Ok(list_of(cell.borrow().iter().map(|(k, _)| k.clone()).collect())),
        "values" => Ok(list_of(cell.borrow().iter().map(|(_, v)| v.clone()).collect())),
        "get" => {
            let key = args.into_iter().next().ok_or_else(|| FarrError::type_("missing key argument"))?;
            Ok(cell
                .borrow()
                .iter()
                .find(|(k, _)| k.value_eq(&key))
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null))
        }
        "iupdate!" => {
            let mut iter = args.into_iter();
            let key = iter.next().ok_or_else(|| FarrError::type_("missing key argument"))?;
            let value = iter.next().ok_or_else(|| FarrError::type_("missing value argument"))?;
            let mut map = cell.borrow_mut();
            if let Some(slot) = map.iter_mut().find(|(k, _)| k.value_eq(&key)) {
                slot.1 = value;
            } else {
                map.push((key, value));
            }
            Ok(Value::HashMap(cell.clone()))
        }
        "pop!" => {
            let key = args.into_iter().next().ok_or_else(|| FarrError::type_("missing key argument"))?;
            let mut map = cell.borrow_mut();
            let pos = map
                .iter()
                .position(|(k, _)| k.value_eq(&key))
                .ok_or_else(|| FarrError::lookup("key not found"))?;
            Ok(map.remove(pos).1)
        }
        "clear!" => {
            cell.borrow_mut().clear();
            Ok(Value::HashMap(cell.clone()))
        }
        "contains?" => {
            let key = args.into_iter().next().ok_or_else(|| FarrError::type_("missing argument"))?;
            Ok(Value::Bool(cell.borrow().iter().any(|(k, _)| k.value_eq(&key))))
        }
        other => Err(FarrError::attribute(format!("hashmap has no method '{other}'"))),
    }
}

fn string_method(s: &Rc<String>, name: &str, args: Vec<Value>) -> Result<Value, FarrError> {
    match name {
        "length" => Ok(Value::Integer(BigInt::from(s.chars().count()))),
        "isempty?" => Ok(Value::Bool(s.is_empty())),
        "tolower" => Ok(Value::String(Rc::new(s.to_lowercase()))),
        "toupper" => Ok(Value::String(Rc::new(s.to_uppercase()))),
        "toint" => s
            .trim()
            .parse::<BigInt>()
            .map(Value::Integer)
            .map_err(|_| FarrError::value(format!("cannot convert '{s}' to an integer"))),
        "tofloat" => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| FarrError::value(format!("cannot convert '{s}' to a float"))),
        "concat" => {
            let other = args.into_iter().next().ok_or_else(|| FarrError::type_("missing argument"))?;
            Ok(Value::String(Rc::new(format!("{s}{}", other.display_string()))))
        }
        "split" => {
            let sep = match args.into_iter().next() {
                Some(Value::String(sep)) => (*sep).clone(),
                _ => " ".to_string(),
            };
            let parts = if sep.is_empty() {
                s.chars().map(|c| Value::String(Rc::new(c.to_string()))).collect()
            } else {
                s.split(sep.as_str())
                    .map(|p| Value::String(Rc::new(p.to_string())))
                    .collect()
            };
            Ok(list_of(parts))
        }
        "contains?" => {
            let needle = args.into_iter().next().ok_or_else(|| FarrError::type_("missing argument"))?;
            match needle {
                Value::String(n) => Ok(Value::Bool(s.contains(n.as_str()))),
                other => Err(FarrError::type_(format!("expected a string, got {}", other.type_name()))),
            }
        }
        "startswith?" => match args.into_iter().next() {
            Some(Value::String(prefix)) => Ok(Value::Bool(s.starts_with(prefix.as_str()))),
            _ => Err(FarrError::type_("expected a string argument")),
        },
        "endswith?" => match args.into_iter().next() {
            Some(Value::String(suffix)) => Ok(Value::Bool(s.ends_with(suffix.as_str()))),
            _ => Err(FarrError::type_("expected a string argument")),
        },
        "removeprefix" => match args.into_iter().next() {
            Some(Value::String(prefix)) => {
                Ok(Value::String(Rc::new(s.strip_prefix(prefix.as_str()).unwrap_or(s).to_string())))
            }
            _ => Err(FarrError::type_("expected a string argument")),
        },
        "removesuffix" => match args.into_iter().next() {
            Some(Value::String(suffix)) => {
                Ok(Value::String(Rc::new(s.strip_suffix(suffix.as_str()).unwrap_or(s).to_string())))
            }
            _ => Err(FarrError::type_("expected a string argument")),
        },
        other => Err(FarrError::attribute(format!("string has no method '{other}'"))),
    }
}

fn range_method(r: &crate::values::RangeValue, name: &str) -> Result<Value, FarrError> {
    match name {
        "tolist" => Ok(list_of(r.values()?.into_iter().map(|n| Value::Integer(BigInt::from(n))).collect())),
        "length" => Ok(Value::Integer(BigInt::from(r.values()?.len()))),
        other => Err(FarrError::attribute(format!("range has no method '{other}'"))),
    }
}

fn pair_method(key: &Value, value: &Value, name: &str) -> Result<Value, FarrError> {
    match name {
        "key" => Ok(key.clone()),
        "value" => Ok(value.clone()),
        other => Err(FarrError::attribute(format!("pair has no method '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: Vec<i64>) -> Value {
        Value::List(Rc::new(RefCell::new(
            values.into_iter().map(|n| Value::Integer(BigInt::from(n))).collect(),
        )))
    }

    #[test]
    fn subscript_is_one_based() {
        let l = list(vec![10, 20, 30]);
        let first = subscript(&l, &Value::Integer(BigInt::from(1)), None).unwrap();
        assert!(matches!(first, Value::Integer(n) if n == BigInt::from(10)));
        let last = subscript(&l, &Value::Integer(BigInt::from(3)), None).unwrap();
        assert!(matches!(last, Value::Integer(n) if n == BigInt::from(30)));
    }

    #[test]
    fn subscript_rejects_non_positive_index() {
        let l = list(vec![1, 2, 3]);
        assert!(subscript(&l, &Value::Integer(BigInt::from(0)), None).is_err());
    }

    #[test]
    fn hashmap_subscript_looks_up_by_value_equality() {
        let map = Value::HashMap(Rc::new(RefCell::new(vec![(
            Value::String(Rc::new("k".into())),
            Value::Integer(BigInt::from(42)),
        )])));
        let found = subscript(&map, &Value::String(Rc::new("k".into())), None).unwrap();
        assert!(matches!(found, Value::Integer(n) if n == BigInt::from(42)));
    }

    #[test]
    fn list_join_uses_display_string() {
        let l = list(vec![1, 2, 3]);
        let joined = call(&l, "join", vec![Value::String(Rc::new(",".into()))]).unwrap();
        assert!(matches!(joined, Value::String(s) if *s == "1,2,3"));
    }

    #[test]
    fn hashmap_iupdate_overwrites_existing_key() {
        let map = Rc::new(RefCell::new(vec![(
            Value::String(Rc::new("a".into())),
            Value::Integer(BigInt::from(1)),
        )]));
        hashmap_method(
            &map,
            "iupdate!",
            vec![Value::String(Rc::new("a".into())), Value::Integer(BigInt::from(9))],
        )
        .unwrap();
        assert_eq!(map.borrow().len(), 1);
        assert!(matches!(&map.borrow()[0].1, Value::Integer(n) if *n == BigInt::from(9)));
    }
}
