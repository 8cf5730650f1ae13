//! Environment arena.
//!
//! Activation records live in one arena and are addressed by index, so
//! promises and closures can hold environment references without owning
//! the environment's lifetime (and without reference cycles). Bindings
//! carry a version stamp; eager promises use it to detect reassignment of
//! the slot they speculated on.

use crate::value::Value;
use std::collections::HashMap;

/// Non-owning handle to an environment frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub(crate) u32);

/// One variable binding: the value (possibly a promise or the missing
/// sentinel) and the stamp of the assignment that produced it.
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub version: u64,
}

#[derive(Debug)]
struct EnvFrame {
    parent: Option<EnvId>,
    vars: HashMap<String, Binding>,
}

/// Arena of environment frames.
#[derive(Debug)]
pub struct EnvArena {
    frames: Vec<EnvFrame>,
    next_version: u64,
}

impl EnvArena {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            next_version: 0,
        }
    }

    /// Allocate a fresh frame.
    pub fn alloc(&mut self, parent: Option<EnvId>) -> EnvId {
        let id = EnvId(self.frames.len() as u32);
        self.frames.push(EnvFrame {
            parent,
            vars: HashMap::new(),
        });
        id
    }

    pub fn parent(&self, env: EnvId) -> Option<EnvId> {
        self.frames[env.0 as usize].parent
    }

    /// Bind `name` in `env` itself, stamping a fresh version.
    pub fn define(&mut self, env: EnvId, name: &str, value: Value) {
        self.next_version += 1;
        let version = self.next_version;
        self.frames[env.0 as usize]
            .vars
            .insert(name.to_string(), Binding { value, version });
    }

    /// Look `name` up in `env` only.
    pub fn lookup_local(&self, env: EnvId, name: &str) -> Option<&Binding> {
        self.frames[env.0 as usize].vars.get(name)
    }

    /// Walk the parent chain for `name`.
    pub fn lookup(&self, env: EnvId, name: &str) -> Option<&Binding> {
        self.lookup_with_env(env, name).map(|(_, b)| b)
    }

    /// Walk the parent chain for `name`, reporting the frame it was found
    /// in (eager promises pin their speculation to that frame).
    pub fn lookup_with_env(&self, env: EnvId, name: &str) -> Option<(EnvId, &Binding)> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &self.frames[id.0 as usize];
            if let Some(binding) = frame.vars.get(name) {
                return Some((id, binding));
            }
            current = frame.parent;
        }
        None
    }

    /// Current stamp of a binding, if it exists in `env` itself.
    pub fn binding_version(&self, env: EnvId, name: &str) -> Option<u64> {
        self.lookup_local(env, name).map(|b| b.version)
    }
}

impl Default for EnvArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parent_chain() {
        let mut arena = EnvArena::new();
        let base = arena.alloc(None);
        let child = arena.alloc(Some(base));
        arena.define(base, "x", Value::Int(1));
        assert_eq!(arena.lookup(child, "x").map(|b| &b.value), Some(&Value::Int(1)));
        assert!(arena.lookup_local(child, "x").is_none());
    }

    #[test]
    fn test_shadowing_stops_walk() {
        let mut arena = EnvArena::new();
        let base = arena.alloc(None);
        let child = arena.alloc(Some(base));
        arena.define(base, "x", Value::Int(1));
        arena.define(child, "x", Value::Int(2));
        assert_eq!(arena.lookup(child, "x").map(|b| &b.value), Some(&Value::Int(2)));
        let (found_in, _) = arena.lookup_with_env(child, "x").unwrap();
        assert_eq!(found_in, child);
    }

    #[test]
    fn test_redefine_bumps_version() {
        let mut arena = EnvArena::new();
        let env = arena.alloc(None);
        arena.define(env, "x", Value::Int(1));
        let v1 = arena.binding_version(env, "x").unwrap();
        arena.define(env, "x", Value::Int(2));
        let v2 = arena.binding_version(env, "x").unwrap();
        assert!(v2 > v1);
    }
}
