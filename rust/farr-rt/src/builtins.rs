//! Native functions registered into the root environment: I/O, program
//! control, type introspection, and the error-kind constructors.

use crate::environment::Environment;
use crate::values::Value;
use farr_core::errors::{ErrorKind, FarrError};
use std::io::{self, Write};
use std::rc::Rc;

fn native(
    env: &mut Environment,
    name: &str,
    f: impl Fn(Vec<Value>, Vec<(String, Value)>) -> Result<Value, FarrError> + 'static,
) {
    env.assign(name.to_string(), Value::Native(name.to_string(), Rc::new(f)));
}

/// Populates the root environment with the language's native functions and
/// the 15 error-kind constructors.
pub fn register(env: &mut Environment) {
    native(env, "print", |args, _| {
        let text: Vec<String> = args.iter().map(Value::display_string).collect();
        print!("{}", text.join(" "));
        io::stdout().flush().ok();
        Ok(Value::Null)
    });
    native(env, "println", |args, _| {
        let text: Vec<String> = args.iter().map(Value::display_string).collect();
        println!("{}", text.join(" "));
        Ok(Value::Null)
    });
    native(env, "readln!", |args, _| {
        if let Some(prompt) = args.first() {
            print!("{}", prompt.display_string());
            io::stdout().flush().ok();
        }
        let mut line = String::new();
        io::stdin()
            .read_line(&mut line)
            .map_err(|e| FarrError::os(e.to_string()))?;
        Ok(Value::String(Rc::new(line.trim_end_matches(['\n', '\r']).to_string())))
    });
    native(env, "panic!?", |args, _| {
        let message = args
            .first()
            .map(Value::display_string)
            .unwrap_or_else(|| "panicked".to_string());
        Err(FarrError::runtime(message))
    });
    native(env, "assert!", |args, _| {
        let mut iter = args.into_iter();
        let condition = iter.next().unwrap_or(Value::Bool(false));
        if condition.truthy() {
            return Ok(Value::Null);
        }
        let message = iter
            .next()
            .map(|v| v.display_string())
            .unwrap_or_else(|| "assertion failed".to_string());
        Err(FarrError::assertion(message))
    });
    native(env, "exit!", |args, _| {
        let code = match args.first() {
            Some(Value::Integer(n)) => num_traits::ToPrimitive::to_i32(n).unwrap_or(0),
            _ => 0,
        };
        std::process::exit(code);
    });
    native(env, "typeof?", |args, _| {
        let value = args.first().ok_or_else(|| FarrError::type_("typeof? requires an argument"))?;
        Ok(Value::String(Rc::new(value.type_name().to_string())))
    });
    native(env, "similartypes?", |args, _| {
        let mut iter = args.into_iter();
        let a = iter.next().ok_or_else(|| FarrError::type_("similartypes? requires two arguments"))?;
        let b = iter.next().ok_or_else(|| FarrError::type_("similartypes? requires two arguments"))?;
        Ok(Value::Bool(a.type_name() == b.type_name()))
    });
    native(env, "cmd!?", |args, _| {
        let source = match args.first() {
            Some(Value::String(s)) => (**s).clone(),
            _ => return Err(FarrError::type_("cmd!? requires a string argument")),
        };
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(source)
            .output()
            .map_err(|e| FarrError::os(e.to_string()))?;
        Ok(Value::String(Rc::new(String::from_utf8_lossy(&output.stdout).to_string())))
    });

    for kind in [
        ErrorKind::Base,
        ErrorKind::KeyboardInterrupt,
        ErrorKind::SystemExit,
        ErrorKind::Arithmetic,
        ErrorKind::Assertion,
        ErrorKind::Attribute,
        ErrorKind::Import,
        ErrorKind::Lookup,
        ErrorKind::Name,
        ErrorKind::Os,
        ErrorKind::Runtime,
        ErrorKind::NotImplemented,
        ErrorKind::Type,
        ErrorKind::Value,
        ErrorKind::Deprecated,
    ] {
        let name = kind.name().to_string();
        native(env, &name.clone(), move |args, _| {
            let message = args
                .first()
                .map(Value::display_string)
                .unwrap_or_default();
            Ok(Value::Error(Rc::new(FarrError::new(kind, message))))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_print_and_error_constructors() {
        let env = Environment::new();
        register(&mut env.borrow_mut());
        assert!(env.borrow().exists("println"));
        assert!(env.borrow().exists("TypeError"));
        assert!(env.borrow().exists("ArithmeticError"));
    }

    #[test]
    fn error_constructor_builds_a_value() {
        let env = Environment::new();
        register(&mut env.borrow_mut());
        let callee = env.borrow().locate("ValueError").unwrap();
        let result = match callee {
            Value::Native(_, f) => f(vec![Value::String(Rc::new("bad".into()))], vec![]).unwrap(),
            _ => panic!("expected native function"),
        };
        assert!(matches!(result, Value::Error(e) if e.kind == ErrorKind::Value));
    }
}
