//! Core language definition for cairn
//!
//! This crate contains the value model, the reader, the protocol system
//! and the module registry. It does not analyze or execute code; those
//! live in the `cairn-compiler` and `cairn-runtime` crates.

pub mod abstractions;
pub mod collections;
pub mod error;
pub mod hash;
pub mod identifier;
pub mod interner;
pub mod language;
pub mod lexer;
pub mod numeric;
pub mod parser;
pub mod protocol;
pub mod registry;
pub mod var;

// Re-export commonly used items for convenience
pub use abstractions::{
    SeqIter, assoc, conj, contains, count, dissoc, equiv, first, get, nth, repr, rest, seq,
    to_vec,
};
pub use collections::{Cons, Dict, HashSet, LazySeq, List, Range, Repeat};
pub use error::{Error, ErrorKind, Result, Span};
pub use hash::hash_code;
pub use identifier::{Context, Keyword, PrefixName, QName, QSym, Symbol};
pub use interner::Interned;
pub use language::{
    ArrayValue, Callable, NativeFn, Object, Promise, RegexValue, TypeDef, TypeKey, Value,
};
pub use numeric::NumericType;
pub use parser::{Reader, read_all, read_string, span_of};
pub use protocol::{DispatchKey, MethodSignature, Protocol, core_protocols};
pub use registry::{Module, ModuleRegistry, Package};
pub use var::{BindingGuard, Var};
