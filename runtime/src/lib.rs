//! Reference host for cairn
//!
//! The compiler produces target expression trees; this crate runs them. It
//! provides an interpreter for the tree, a printer that renders it as
//! JavaScript text, and the standard library every module can see.

pub mod interpreter;
pub mod printer;
pub mod stdlib;

use std::rc::Rc;

use cairn::{ModuleRegistry, Result};
use cairn_compiler::{Compiler, MemoryLoader, SourceLoader};

pub use interpreter::{Interpreter, Scope};
pub use printer::{JsPrinter, munge};

/// A compiler wired to the interpreter host, with the standard library
/// installed and `localpkg:user` current
pub fn new_compiler(loader: Box<dyn SourceLoader>) -> Result<Compiler> {
    let registry = Rc::new(ModuleRegistry::new());
    let host = Rc::new(Interpreter::new(registry.clone()));
    let compiler = Compiler::new(registry, host, Box::new(JsPrinter::new()), loader);
    stdlib::install(&compiler)?;
    Ok(compiler)
}

/// [`new_compiler`] with no module sources
pub fn compiler() -> Result<Compiler> {
    new_compiler(Box::new(MemoryLoader::new()))
}
