//! Persistent collections and sequence kinds.

mod dict;
mod lazy;
mod list;
mod range;
mod set;

pub use dict::Dict;
pub use lazy::LazySeq;
pub use list::{Cons, List};
pub use range::{Range, Repeat};
pub use set::HashSet;
