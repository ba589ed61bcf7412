//! Compiled packages.
//!
//! A package maps global names to callables and keeps them in declaration
//! order: the engine pushes every slot onto the stack at start-up, so a
//! global's slot index doubles as its absolute stack position. Native
//! declarations reserve a slot at compile time and are bound by the host
//! before the run.

use crate::object::{Native, NativeFn, Object};
use std::rc::Rc;

#[derive(Debug, Clone)]
struct Slot {
    name: Box<str>,
    object: Option<Rc<Object>>,
}

#[derive(Debug, Clone, Default)]
pub struct Package {
    slots: Vec<Slot>,
}

impl Package {
    pub fn new() -> Package {
        Package::default()
    }

    /// Number of global slots, in declaration order.
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Append a slot. Returns its index, which must agree with the symbol
    /// index the validator assigned to the same global.
    pub fn insert(&mut self, name: &str, object: Option<Rc<Object>>) -> usize {
        self.slots.push(Slot { name: name.into(), object });
        self.slots.len() - 1
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| &*s.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Object>> {
        self.slots.iter().find(|s| &*s.name == name)?.object.as_ref()
    }

    pub fn slot(&self, index: usize) -> Option<&Rc<Object>> {
        self.slots.get(index)?.object.as_ref()
    }

    /// Bind a host callback into the named native slot. Fails when the name
    /// was never declared or already carries a compiled callable.
    pub fn bind_native(&mut self, name: &str, callback: NativeFn) -> Result<(), String> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| &*s.name == name)
            .ok_or_else(|| format!("No native function '{}' declared in package", name))?;
        if slot.object.is_some() {
            return Err(format!("'{}' is not a native function slot", name));
        }
        slot.object = Some(Rc::new(Object::Native(Native { name: name.into(), callback })));
        Ok(())
    }

    /// Iterate slots in declaration order; unbound native slots yield `None`.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Rc<Object>>> {
        self.slots.iter().map(|s| s.object.as_ref())
    }

    /// Like [`Package::iter`], with each slot's name.
    pub fn iter_named(&self) -> impl Iterator<Item = (&str, Option<&Rc<Object>>)> {
        self.slots.iter().map(|s| (&*s.name, s.object.as_ref()))
    }
}
