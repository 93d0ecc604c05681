//! Protocols: named method sets dispatched on the receiver's type.
//!
//! Implementations are registered per dispatch key and looked up along a
//! chain: the object instance itself, its type, the type's ancestors, and
//! finally the catch-all default. `nil` has its own key and no default.
//! Methods may declare several arities (receiver included); a call with an
//! arity that was not declared fails only when more than one is declared.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::abstractions;
use crate::error::{Error, ErrorKind, Result};
use crate::hash;
use crate::language::{NativeFnPtr, TypeKey, Value, next_id};
use crate::registry::{BOOTSTRAP_MODULE, BOOTSTRAP_PACKAGE};

/// A method name and the arities it accepts, receiver included
#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub name: Rc<str>,
    pub arities: Vec<usize>,
}

impl MethodSignature {
    pub fn new(name: &str, arities: &[usize]) -> Self {
        MethodSignature {
            name: Rc::from(name),
            arities: arities.to_vec(),
        }
    }
}

/// Where an implementation is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKey {
    /// A single object, by identity
    Instance(u64),
    /// All values of a type; `TypeKey::Nil` is the representative for nil
    Type(TypeKey),
    /// Every non-nil value
    Default,
}

#[derive(Debug, Default)]
struct Implementation {
    /// method -> arity -> function
    methods: FxHashMap<Rc<str>, FxHashMap<usize, Value>>,
}

#[derive(Debug)]
pub struct Protocol {
    id: u64,
    module: Rc<str>,
    name: Rc<str>,
    methods: Vec<MethodSignature>,
    impls: RefCell<FxHashMap<DispatchKey, Rc<Implementation>>>,
}

impl Protocol {
    /// Declare a protocol in `module` (written `package:module`).
    pub fn define(module: &str, name: &str, methods: Vec<MethodSignature>) -> Result<Rc<Protocol>> {
        let mut seen: Vec<&str> = Vec::new();
        for sig in &methods {
            if sig.name.is_empty() {
                return Err(Error::assertion(format!(
                    "Protocol {name} declares a method without a name"
                )));
            }
            if seen.contains(&&*sig.name) {
                return Err(Error::assertion(format!(
                    "Protocol {name} declares method {} twice",
                    sig.name
                )));
            }
            if sig.arities.is_empty() || sig.arities.contains(&0) {
                return Err(Error::assertion(format!(
                    "Method {} of protocol {name} needs at least one arity that includes the receiver",
                    sig.name
                )));
            }
            seen.push(&sig.name);
        }
        debug!(module, protocol = name, methods = methods.len(), "defined protocol");
        Ok(Rc::new(Protocol {
            id: next_id(),
            module: Rc::from(module),
            name: Rc::from(name),
            methods,
            impls: RefCell::new(FxHashMap::default()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }

    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    pub fn signature(&self, method: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| &*m.name == method)
    }

    fn require_signature(&self, method: &str) -> Result<&MethodSignature> {
        self.signature(method).ok_or_else(|| {
            Error::assertion(format!(
                "Protocol {} has no method {method}",
                self.qualified_name()
            ))
        })
    }

    // ------------------------------------------------------------------------
    // Extension
    // ------------------------------------------------------------------------

    fn install(&self, key: DispatchKey, entries: Vec<(Rc<str>, usize, Value)>) {
        let mut impls = self.impls.borrow_mut();
        // Copy-on-write so dispatches already holding the old table are
        // unaffected
        let mut methods = impls
            .get(&key)
            .map(|existing| existing.methods.clone())
            .unwrap_or_default();
        for (method, arity, f) in entries {
            methods.entry(method).or_default().insert(arity, f);
        }
        impls.insert(key, Rc::new(Implementation { methods }));
    }

    fn check_callable(&self, method: &str, f: &Value) -> Result<()> {
        match f {
            Value::Fn(_) | Value::Var(_) => Ok(()),
            other => Err(Error::assertion(format!(
                "Implementation of {method} for protocol {} must be a function, got {}",
                self.qualified_name(),
                other.type_name()
            ))),
        }
    }

    /// Attach implementations for every declared arity of each method.
    pub fn extend(&self, key: DispatchKey, methods: &[(&str, Value)]) -> Result<()> {
        let mut entries = Vec::new();
        for (method, f) in methods {
            let sig = self.require_signature(method)?;
            self.check_callable(method, f)?;
            for arity in &sig.arities {
                entries.push((sig.name.clone(), *arity, f.clone()));
            }
        }
        debug!(protocol = %self.qualified_name(), target = ?key, "extended protocol");
        self.install(key, entries);
        Ok(())
    }

    /// Extend a type; `None` extends nil.
    pub fn extend_type(&self, type_key: Option<TypeKey>, methods: &[(&str, Value)]) -> Result<()> {
        self.extend(DispatchKey::Type(type_key.unwrap_or(TypeKey::Nil)), methods)
    }

    /// Extend a single object instance
    pub fn extend_instance(&self, object: &Value, methods: &[(&str, Value)]) -> Result<()> {
        match object {
            Value::Object(o) => self.extend(DispatchKey::Instance(o.id), methods),
            other => Err(Error::assertion(format!(
                "Only objects can be extended individually, got {}",
                other.type_name()
            ))),
        }
    }

    /// Attach an implementation for one arity of one method
    pub fn extend_arity(&self, key: DispatchKey, method: &str, arity: usize, f: Value) -> Result<()> {
        let sig = self.require_signature(method)?;
        if !sig.arities.contains(&arity) {
            return Err(Error::new(
                ErrorKind::ProtocolArity,
                format!(
                    "Method {method} of protocol {} does not declare arity {arity}",
                    self.qualified_name()
                ),
            ));
        }
        self.check_callable(method, &f)?;
        debug!(protocol = %self.qualified_name(), target = ?key, method, arity, "extended protocol arity");
        self.install(key, vec![(sig.name.clone(), arity, f)]);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    fn dispatch_chain(receiver: &Value) -> Vec<DispatchKey> {
        match receiver {
            Value::Nil => vec![DispatchKey::Type(TypeKey::Nil)],
            Value::Object(o) => {
                let mut chain = vec![
                    DispatchKey::Instance(o.id),
                    DispatchKey::Type(o.type_def.key()),
                ];
                let mut parent = o.type_def.parent.clone();
                while let Some(p) = parent {
                    chain.push(DispatchKey::Type(p.key()));
                    parent = p.parent.clone();
                }
                chain.push(DispatchKey::Default);
                chain
            }
            other => vec![DispatchKey::Type(other.type_key()), DispatchKey::Default],
        }
    }

    fn find(&self, method: &str, receiver: &Value) -> Option<FxHashMap<usize, Value>> {
        let impls = self.impls.borrow();
        Self::dispatch_chain(receiver)
            .into_iter()
            .filter_map(|key| impls.get(&key))
            .find_map(|imp| imp.methods.get(method).cloned())
    }

    /// Call `method` on `receiver` with the remaining `args`
    pub fn invoke(&self, method: &str, receiver: &Value, args: &[Value]) -> Result<Value> {
        let sig = self.require_signature(method)?;
        let arities = self.find(method, receiver).ok_or_else(|| {
            Error::new(
                ErrorKind::NoProtocolImpl,
                format!(
                    "No implementation of method {method} of protocol {} found for type {}",
                    self.qualified_name(),
                    receiver.type_name()
                ),
            )
        })?;
        let arity = args.len() + 1;
        let f = match arities.get(&arity) {
            Some(f) => f.clone(),
            None if sig.arities.len() > 1 => {
                let declared: Vec<String> = sig.arities.iter().map(|a| a.to_string()).collect();
                return Err(Error::new(
                    ErrorKind::ProtocolArity,
                    format!(
                        "Wrong number of arguments ({arity}) to {method} of protocol {}; declared arities: {}",
                        self.qualified_name(),
                        declared.join(", ")
                    ),
                ));
            }
            None => match arities.values().next() {
                Some(f) => f.clone(),
                None => {
                    return Err(Error::new(
                        ErrorKind::NoProtocolImpl,
                        format!("No implementation of method {method}"),
                    ));
                }
            },
        };
        let mut call_args = Vec::with_capacity(arity);
        call_args.push(receiver.clone());
        call_args.extend_from_slice(args);
        f.call(&call_args)
    }

    /// Whether some implementation applies to `receiver`
    pub fn satisfied(&self, receiver: &Value) -> bool {
        let impls = self.impls.borrow();
        Self::dispatch_chain(receiver)
            .iter()
            .any(|key| impls.contains_key(key))
    }
}

// ============================================================================
// Core Protocols
// ============================================================================

/// The protocols the runtime itself dispatches through
pub struct CoreProtocols {
    pub equality: Rc<Protocol>,
    pub hashable: Rc<Protocol>,
    pub repr: Rc<Protocol>,
    pub seqable: Rc<Protocol>,
    pub seq: Rc<Protocol>,
    pub counted: Rc<Protocol>,
    pub lookup: Rc<Protocol>,
}

impl CoreProtocols {
    pub fn all(&self) -> [&Rc<Protocol>; 7] {
        [
            &self.equality,
            &self.hashable,
            &self.repr,
            &self.seqable,
            &self.seq,
            &self.counted,
            &self.lookup,
        ]
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Nil)
}

fn native_equiv(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(abstractions::equiv(&arg(args, 0), &arg(args, 1))?))
}

fn native_hash_code(args: &[Value]) -> Result<Value> {
    Ok(Value::from(hash::hash_code(&arg(args, 0))? as i64))
}

fn native_repr(args: &[Value]) -> Result<Value> {
    Ok(Value::from(arg(args, 0).to_string()))
}

fn native_seq(args: &[Value]) -> Result<Value> {
    Ok(abstractions::seq(&arg(args, 0))?.unwrap_or(Value::Nil))
}

fn native_first(args: &[Value]) -> Result<Value> {
    abstractions::first(&arg(args, 0))
}

fn native_rest(args: &[Value]) -> Result<Value> {
    abstractions::rest(&arg(args, 0))
}

fn native_count(args: &[Value]) -> Result<Value> {
    Ok(Value::from(abstractions::count(&arg(args, 0))? as i64))
}

fn native_get(args: &[Value]) -> Result<Value> {
    abstractions::get(&arg(args, 0), &arg(args, 1), &arg(args, 2))
}

const SEQ_TYPES: &[TypeKey] = &[
    TypeKey::List,
    TypeKey::Cons,
    TypeKey::Range,
    TypeKey::Repeat,
    TypeKey::LazySeq,
];

const SEQABLE_TYPES: &[TypeKey] = &[
    TypeKey::Nil,
    TypeKey::List,
    TypeKey::Cons,
    TypeKey::Range,
    TypeKey::Repeat,
    TypeKey::LazySeq,
    TypeKey::Array,
    TypeKey::String,
    TypeKey::Dict,
    TypeKey::Set,
];

const COUNTED_TYPES: &[TypeKey] = &[
    TypeKey::Nil,
    TypeKey::List,
    TypeKey::Array,
    TypeKey::Dict,
    TypeKey::Set,
    TypeKey::String,
    TypeKey::Range,
    TypeKey::Repeat,
];

const LOOKUP_TYPES: &[TypeKey] = &[
    TypeKey::Nil,
    TypeKey::Dict,
    TypeKey::Set,
    TypeKey::Array,
    TypeKey::String,
];

impl Protocol {
    fn declare(module: &str, name: &str, methods: &[(&str, &[usize])]) -> Rc<Protocol> {
        Rc::new(Protocol {
            id: next_id(),
            module: Rc::from(module),
            name: Rc::from(name),
            methods: methods
                .iter()
                .map(|(m, arities)| MethodSignature::new(m, arities))
                .collect(),
            impls: RefCell::new(FxHashMap::default()),
        })
    }

    /// Register natives for every declared arity, skipping validation
    fn install_natives(&self, keys: &[TypeKey], natives: &[(&'static str, NativeFnPtr)]) {
        for key in keys {
            let mut entries = Vec::new();
            for (method, func) in natives {
                if let Some(sig) = self.signature(method) {
                    for arity in &sig.arities {
                        entries.push((sig.name.clone(), *arity, Value::native(method, *func)));
                    }
                }
            }
            self.install(DispatchKey::Type(*key), entries);
        }
    }
}

fn build_core() -> CoreProtocols {
    let module = format!("{BOOTSTRAP_PACKAGE}:{BOOTSTRAP_MODULE}");
    let core = CoreProtocols {
        equality: Protocol::declare(&module, "Equality", &[("-equiv", &[2])]),
        hashable: Protocol::declare(&module, "Hashable", &[("-hash-code", &[1])]),
        repr: Protocol::declare(&module, "Repr", &[("-repr", &[1])]),
        seqable: Protocol::declare(&module, "Seqable", &[("-seq", &[1])]),
        seq: Protocol::declare(&module, "Seq", &[("-first", &[1]), ("-rest", &[1])]),
        counted: Protocol::declare(&module, "Counted", &[("-count", &[1])]),
        lookup: Protocol::declare(&module, "Lookup", &[("-get", &[2, 3])]),
    };

    core.equality
        .install_natives(TypeKey::BUILTINS, &[("-equiv", native_equiv)]);
    core.hashable
        .install_natives(TypeKey::BUILTINS, &[("-hash-code", native_hash_code)]);
    core.repr
        .install_natives(TypeKey::BUILTINS, &[("-repr", native_repr)]);
    core.seqable
        .install_natives(SEQABLE_TYPES, &[("-seq", native_seq)]);
    core.seq.install_natives(
        SEQ_TYPES,
        &[("-first", native_first), ("-rest", native_rest)],
    );
    core.counted
        .install_natives(COUNTED_TYPES, &[("-count", native_count)]);
    core.lookup
        .install_natives(LOOKUP_TYPES, &[("-get", native_get)]);
    debug!(module = %module, "installed core protocols");
    core
}

thread_local! {
    static CORE: Rc<CoreProtocols> = Rc::new(build_core());
}

/// The core protocols, with built-in kinds already extended
pub fn core_protocols() -> Rc<CoreProtocols> {
    CORE.with(Rc::clone)
}
