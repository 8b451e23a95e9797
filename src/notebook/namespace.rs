// src/notebook/namespace.rs

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::script::{Globals, Value};

/// Variable name to last written value, in first-write order.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    vars: IndexMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

/// Handle to a notebook's namespace shared between the scheduler and the
/// executors. Cloning the handle shares the same store.
///
/// The lock is never held across an await point; every accessor takes it
/// for the duration of one call.
#[derive(Debug, Clone, Default)]
pub struct SharedNamespace {
    inner: Arc<Mutex<Namespace>>,
}

impl SharedNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_namespace(ns: Namespace) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ns)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.lock().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.inner.lock().set(name, value);
    }

    /// Write a batch of bindings under one lock acquisition.
    pub fn commit(&self, bindings: IndexMap<String, Value>) {
        let mut ns = self.inner.lock();
        for (name, value) in bindings {
            ns.set(name, value);
        }
    }

    pub fn snapshot(&self) -> Namespace {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Globals for SharedNamespace {
    fn get(&self, name: &str) -> Option<Value> {
        SharedNamespace::get(self, name)
    }

    fn set(&self, name: &str, value: Value) {
        SharedNamespace::set(self, name, value);
    }
}
