//! Seams between the driver and whatever runs emitted code.

use std::cell::RefCell;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

use cairn::{Error, Result, Value};

use crate::target::Program;

// ============================================================================
// Sources
// ============================================================================

/// Module source text and the file it came from, if any
#[derive(Debug, Clone)]
pub struct Source {
    pub text: String,
    pub file: Option<String>,
}

/// Finds the source of a module by package and module name
pub trait SourceLoader {
    fn load(&self, package: &str, module: &str) -> Result<Source>;
}

/// Sources held in memory, keyed by `package:module`
#[derive(Default)]
pub struct MemoryLoader {
    sources: RefCell<FxHashMap<String, String>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, package: &str, module: &str, text: impl Into<String>) {
        self.sources
            .borrow_mut()
            .insert(format!("{package}:{module}"), text.into());
    }

    pub fn with(self, package: &str, module: &str, text: impl Into<String>) -> Self {
        self.insert(package, module, text);
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, package: &str, module: &str) -> Result<Source> {
        let key = format!("{package}:{module}");
        match self.sources.borrow().get(&key) {
            Some(text) => Ok(Source {
                text: text.clone(),
                file: Some(key),
            }),
            None => Err(Error::load(format!("No source for module {key}"))),
        }
    }
}

/// Reads `<root>/<package>/<module>.cairn`
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryLoader { root: root.into() }
    }
}

impl SourceLoader for DirectoryLoader {
    fn load(&self, package: &str, module: &str) -> Result<Source> {
        let path = self.root.join(package).join(format!("{module}.cairn"));
        let text = std::fs::read_to_string(&path)
            .map_err(|e| Error::load(format!("Cannot read {}: {e}", path.display())))?;
        Ok(Source {
            text,
            file: Some(path.display().to_string()),
        })
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Renders a program as target source text
pub trait Printer {
    fn print(&self, program: &Program) -> String;
}

/// What running a unit produced
#[derive(Debug, Clone)]
pub enum Completion {
    Value(Value),
    /// A handle the driver must wait on before the next form
    Pending(Value),
}

pub trait Host {
    /// Run one unit. `printed` is the printer's rendering of `program`.
    fn execute(&self, program: &Program, printed: &str) -> Result<Completion>;

    /// Block until a pending completion settles
    fn wait(&self, pending: Value) -> Result<Value> {
        match pending {
            Value::Promise(p) => p.force(),
            other => Ok(other),
        }
    }
}
