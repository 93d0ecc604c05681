//! Names: symbols, keywords and the IRI-shaped identifiers.
//!
//! A symbol is `name`, `module:name` or `package:module:name`. Package
//! names may themselves contain `://` (they are IRIs); such symbols are read
//! as [`QSym`] and split from the right. Keywords are interned so equality
//! is identity. [`Context`] maps short prefixes to IRI bases and converts
//! between [`PrefixName`] and [`QName`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::collections::Dict;
use crate::error::{Error, Result};
use crate::interner::Interned;

// ============================================================================
// Symbol
// ============================================================================

/// A possibly qualified name. Metadata rides along but never affects
/// equality or hashing.
#[derive(Debug, Clone)]
pub struct Symbol {
    package: Option<Rc<str>>,
    module: Option<Rc<str>>,
    name: Rc<str>,
    meta: Option<Dict>,
}

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol {
            package: None,
            module: None,
            name: Rc::from(name),
            meta: None,
        }
    }

    pub fn qualified(module: &str, name: &str) -> Self {
        Symbol {
            module: Some(Rc::from(module)),
            ..Symbol::new(name)
        }
    }

    pub fn full(package: &str, module: &str, name: &str) -> Self {
        Symbol {
            package: Some(Rc::from(package)),
            module: Some(Rc::from(module)),
            ..Symbol::new(name)
        }
    }

    /// A fresh unqualified symbol, `prefix__N`
    pub fn gensym(prefix: &str) -> Self {
        Symbol::new(&format!("{prefix}__{}", crate::language::next_id()))
    }

    /// Split `a`, `a:b` or `a:b:c` into a symbol.
    pub fn parse(text: &str) -> Result<Symbol> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::parse(format!("Invalid symbol: {text}")));
        }
        match parts.as_slice() {
            [name] => Ok(Symbol::new(name)),
            [module, name] => Ok(Symbol::qualified(module, name)),
            [package, module, name] => Ok(Symbol::full(package, module, name)),
            _ => Err(Error::parse(format!(
                "Invalid symbol: {text} (at most package:module:name)"
            ))),
        }
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_qualified(&self) -> bool {
        self.module.is_some()
    }

    /// True for a bare name equal to `name`
    pub fn is_simple(&self, name: &str) -> bool {
        self.module.is_none() && &*self.name == name
    }

    pub fn meta(&self) -> Option<&Dict> {
        self.meta.as_ref()
    }

    pub fn with_meta(&self, meta: Option<Dict>) -> Symbol {
        Symbol {
            meta,
            ..self.clone()
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.module == other.module && self.package == other.package
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.package.hash(state);
        self.module.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref package) = self.package {
            write!(f, "{package}:")?;
        }
        if let Some(ref module) = self.module {
            write!(f, "{module}:")?;
        }
        write!(f, "{}", self.name)
    }
}

// ============================================================================
// Keyword
// ============================================================================

/// An interned name. Two keywords with the same name are the same keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keyword(Interned);

impl Keyword {
    pub fn new(name: &str) -> Self {
        Keyword(Interned::new(name))
    }

    pub fn name(&self) -> String {
        self.0.resolve()
    }

    pub fn with_name<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        self.0.with_str(f)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

// ============================================================================
// IRI names
// ============================================================================

/// A fully expanded IRI, read from `:https://...`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub uri: Rc<str>,
}

impl QName {
    pub fn new(uri: &str) -> Self {
        QName { uri: Rc::from(uri) }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.uri)
    }
}

/// A compact IRI, read from `:prefix:suffix`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixName {
    pub prefix: Rc<str>,
    pub suffix: Rc<str>,
}

impl PrefixName {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        PrefixName {
            prefix: Rc::from(prefix),
            suffix: Rc::from(suffix),
        }
    }
}

impl fmt::Display for PrefixName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}:{}", self.prefix, self.suffix)
    }
}

/// A symbol whose package is an IRI: `https://host/pkg:module:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QSym {
    pub uri: Rc<str>,
}

impl QSym {
    pub fn new(uri: &str) -> Self {
        QSym { uri: Rc::from(uri) }
    }

    /// Split into `(package, module, name)`. The package keeps its scheme
    /// separator, so splitting happens on the last two colons.
    pub fn parts(&self) -> Result<(&str, &str, &str)> {
        let invalid = || Error::parse(format!("Invalid qualified symbol: {}", self.uri));
        let (rest, name) = self.uri.rsplit_once(':').ok_or_else(invalid)?;
        let (package, module) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if name.is_empty() || module.is_empty() || !package.contains("://") {
            return Err(invalid());
        }
        Ok((package, module, name))
    }
}

impl fmt::Display for QSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

// ============================================================================
// Prefix context
// ============================================================================

const WELL_KNOWN_PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("cairn", "https://cairn-lang.org/ns#"),
];

/// Prefix to IRI-base mapping used to expand and contract names.
#[derive(Debug, Clone, Default)]
pub struct Context {
    prefixes: FxHashMap<Rc<str>, Rc<str>>,
}

impl Context {
    /// An empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// A context preloaded with the common vocabulary prefixes
    pub fn well_known() -> Self {
        let mut context = Context::new();
        for (prefix, base) in WELL_KNOWN_PREFIXES {
            context.insert(prefix, base);
        }
        context
    }

    pub fn insert(&mut self, prefix: &str, base: &str) {
        self.prefixes.insert(Rc::from(prefix), Rc::from(base));
    }

    pub fn base(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|b| &**b)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, b)| (&**p, &**b))
    }

    /// Expand a prefix name to its IRI. Fails when the prefix is unknown.
    pub fn expand(&self, name: &PrefixName) -> Result<QName> {
        let base = self.base(&name.prefix).ok_or_else(|| {
            Error::new(
                crate::error::ErrorKind::Resolution,
                format!("Unknown prefix: {}", name.prefix),
            )
        })?;
        Ok(QName::new(&format!("{base}{}", name.suffix)))
    }

    /// Contract an IRI using the longest matching base. IRIs no base
    /// covers are returned unchanged.
    pub fn contract(&self, name: &QName) -> std::result::Result<PrefixName, QName> {
        let best = self
            .prefixes
            .iter()
            .filter(|(_, base)| name.uri.starts_with(&***base) && name.uri.len() > base.len())
            .max_by(|(pa, a), (pb, b)| a.len().cmp(&b.len()).then_with(|| pb.cmp(pa)));
        match best {
            Some((prefix, base)) => Ok(PrefixName::new(prefix, &name.uri[base.len()..])),
            None => Err(name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_parse_shapes() {
        let s = Symbol::parse("x").unwrap();
        assert_eq!((s.package(), s.module(), s.name()), (None, None, "x"));

        let s = Symbol::parse("str:join").unwrap();
        assert_eq!((s.package(), s.module(), s.name()), (None, Some("str"), "join"));

        let s = Symbol::parse("cairn:lang:first").unwrap();
        assert_eq!(
            (s.package(), s.module(), s.name()),
            (Some("cairn"), Some("lang"), "first")
        );
    }

    #[test]
    fn test_symbol_parse_rejects_bad_shapes() {
        assert!(Symbol::parse("a:b:c:d").is_err());
        assert!(Symbol::parse("a::b").is_err());
        assert!(Symbol::parse("a:").is_err());
    }

    #[test]
    fn test_symbol_equality_ignores_meta() {
        let mut meta = Dict::new();
        meta = meta
            .assoc(
                crate::Value::Keyword(Keyword::new("tag")),
                crate::Value::from("string"),
            )
            .unwrap();
        let plain = Symbol::new("x");
        let annotated = plain.with_meta(Some(meta));
        assert_eq!(plain, annotated);
    }

    #[test]
    fn test_keyword_identity() {
        assert_eq!(Keyword::new("a"), Keyword::new("a"));
        assert_ne!(Keyword::new("a"), Keyword::new("b"));
        assert_eq!(Keyword::new("doc").to_string(), ":doc");
    }

    #[test]
    fn test_qsym_parts() {
        let q = QSym::new("https://example.org/pkg:mod:name");
        assert_eq!(
            q.parts().unwrap(),
            ("https://example.org/pkg", "mod", "name")
        );
        assert!(QSym::new("https://example.org/pkg").parts().is_err());
    }

    #[test]
    fn test_expand_and_contract() {
        let ctx = Context::well_known();
        let expanded = ctx.expand(&PrefixName::new("rdf", "type")).unwrap();
        assert_eq!(
            &*expanded.uri,
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
        );
        assert_eq!(ctx.contract(&expanded), Ok(PrefixName::new("rdf", "type")));
    }

    #[test]
    fn test_expand_unknown_prefix() {
        let ctx = Context::new();
        assert!(ctx.expand(&PrefixName::new("nope", "x")).is_err());
    }

    #[test]
    fn test_contract_prefers_longest_base() {
        let mut ctx = Context::new();
        ctx.insert("ex", "https://example.org/");
        ctx.insert("exv", "https://example.org/vocab/");
        let q = QName::new("https://example.org/vocab/term");
        assert_eq!(ctx.contract(&q), Ok(PrefixName::new("exv", "term")));
    }

    #[test]
    fn test_contract_without_match_returns_qname() {
        let q = QName::new("urn:isbn:123");
        assert_eq!(Context::well_known().contract(&q), Err(q.clone()));
    }
}
