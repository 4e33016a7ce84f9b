//! Resolves `use a/b;` against `$FARRPATH/libs/`.
//!
//! A library is a directory containing a `funda.farr` initializer. Every
//! sibling `.farr` file next to it is registered as a submodule, keyed by
//! its file stem, without being evaluated until the library's own code (or
//! the importer) reaches for it by name — we load all of them eagerly since
//! the interpreter has no lazy-module machinery, which keeps `use` simple
//! at the cost of evaluating submodules a program never touches.

use crate::environment::Environment;
use crate::values::{LibraryValue, ModuleValue, Value};
use farr_core::errors::FarrError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

pub struct ModuleLoader {
    farrpath: Option<PathBuf>,
    cache: HashMap<String, Value>,
}

impl ModuleLoader {
    pub fn new(farrpath: Option<PathBuf>) -> Self {
        Self {
            farrpath: farrpath.or_else(|| std::env::var_os("FARRPATH").map(PathBuf::from)),
            cache: HashMap::new(),
        }
    }

    /// Resolves a `use` path's segments (e.g. `["math", "random"]`) against
    /// `$FARRPATH/libs/<first segment>/`.
    pub fn resolve(&mut self, segments: &[String]) -> Result<Value, FarrError> {
        let root = segments
            .first()
            .ok_or_else(|| FarrError::import("empty use path"))?;
        if let Some(cached) = self.cache.get(root) {
            return Ok(navigate(cached, &segments[1..]));
        }
        let farrpath = self
            .farrpath
            .as_ref()
            .ok_or_else(|| FarrError::import("FARRPATH is not set"))?;
        let library_dir = farrpath.join("libs").join(root);
        let funda = library_dir.join("funda.farr");
        if !funda.exists() {
            return Err(FarrError::import(format!(
                "no library named '{root}' under FARRPATH"
            )));
        }

        let library_env = Environment::new();
        crate::builtins::register(&mut library_env.borrow_mut());
        run_source(&library_env, &funda)?;

        let submodules = Rc::new(RefCell::new(Vec::new()));
        if let Ok(entries) = std::fs::read_dir(&library_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path == funda || path.extension().and_then(|e| e.to_str()) != Some("farr") {
                    continue;
                }
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                let module_env = Environment::child(library_env.clone());
                run_source(&module_env, &path)?;
                submodules.borrow_mut().push((
                    stem.clone(),
                    Value::Module(Rc::new(ModuleValue {
                        name: stem,
                        env: module_env,
                    })),
                ));
            }
        }

        let library = Value::Library(Rc::new(LibraryValue {
            name: root.clone(),
            env: library_env,
            submodules,
        }));
        self.cache.insert(root.clone(), library.clone());
        Ok(navigate(&library, &segments[1..]))
    }
}

fn navigate(value: &Value, rest: &[String]) -> Value {
    let mut current = value.clone();
    for segment in rest {
        current = match &current {
            Value::Library(l) => {
                if let Ok(found) = l.env.borrow().locate(segment) {
                    found
                } else if let Some((_, sub)) = l.submodules.borrow().iter().find(|(n, _)| n == segment) {
                    sub.clone()
                } else {
                    current.clone()
                }
            }
            Value::Module(m) => m.env.borrow().locate(segment).unwrap_or(current.clone()),
            other => other.clone(),
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("farr-modtest-{label}-{}", std::process::id()))
    }

    #[test]
    fn resolve_against_a_path_with_no_such_library_is_an_import_error() {
        let mut loader = ModuleLoader::new(Some(temp_dir("missing")));
        let err = loader.resolve(&["math".to_string()]).unwrap_err();
        assert_eq!(err.kind, farr_core::errors::ErrorKind::Import);
    }

    #[test]
    fn resolve_empty_path_is_an_import_error() {
        let mut loader = ModuleLoader::new(Some(temp_dir("empty")));
        let err = loader.resolve(&[]).unwrap_err();
        assert_eq!(err.kind, farr_core::errors::ErrorKind::Import);
    }

    #[test]
    fn resolve_loads_a_library_and_its_submodules() {
        let dir = temp_dir("greet");
        let lib_dir = dir.join("libs").join("greet");
        std::fs::create_dir_all(&lib_dir).unwrap();
        std::fs::write(lib_dir.join("funda.farr"), "let hello = \"hi\";").unwrap();
        std::fs::write(lib_dir.join("extra.farr"), "let bonus = 1;").unwrap();

        let mut loader = ModuleLoader::new(Some(dir.clone()));
        let library = loader.resolve(&["greet".to_string(), "hello".to_string()]).unwrap();
        assert!(matches!(library, Value::String(s) if *s == "hi"));

        let submodule = loader
            .resolve(&["greet".to_string(), "extra".to_string(), "bonus".to_string()])
            .unwrap();
        assert!(matches!(submodule, Value::Integer(n) if n == num_bigint::BigInt::from(1)));

        std::fs::remove_dir_all(&dir).ok();
    }
}

fn run_source(env: &Rc<RefCell<Environment>>, path: &std::path::Path) -> Result<(), FarrError> {
    let source = std::fs::read_to_string(path).map_err(|e| FarrError::os(e.to_string()))?;
    let module = farr_compiler::compile(&source).map_err(|e| FarrError::import(e.to_string()))?;
    let mut interpreter = crate::interpreter::Interpreter {
        env: env.clone(),
        loader: ModuleLoader::new(None),
        interpolation_depth: 0,
    };
    interpreter.run(&module).map_err(|_| FarrError::import(format!(
        "failed to evaluate {}",
        path.display()
    )))?;
    Ok(())
}
