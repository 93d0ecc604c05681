use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

static INTERNER: Lazy<RwLock<StringInterner<DefaultBackend>>> =
    Lazy::new(|| RwLock::new(StringInterner::default()));

// A panic while holding the lock cannot leave the interner half-written,
// so poisoning is ignored.
fn read_interner() -> RwLockReadGuard<'static, StringInterner<DefaultBackend>> {
    INTERNER.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_interner() -> RwLockWriteGuard<'static, StringInterner<DefaultBackend>> {
    INTERNER.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A name interned in the process-wide table. Equal names share one id,
/// so comparison and hashing are integer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interned(DefaultSymbol);

impl Interned {
    /// Intern a string, reusing the existing id when already present
    pub fn new(s: &str) -> Self {
        if let Some(sym) = read_interner().get(s) {
            return Interned(sym);
        }
        Interned(write_interner().get_or_intern(s))
    }

    /// Resolve back to an owned string
    pub fn resolve(&self) -> String {
        self.with_str(str::to_string)
    }

    /// Run `f` against the interned text without allocating
    pub fn with_str<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let interner = read_interner();
        // Ids only come from this table, so resolution always succeeds
        f(interner.resolve(self.0).unwrap_or_default())
    }
}

impl fmt::Display for Interned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| write!(f, "{s}"))
    }
}
