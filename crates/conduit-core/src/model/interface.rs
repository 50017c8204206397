//! Capability interfaces: named bundles of method declarations a type can
//! implement, optionally supplying default bodies.

use std::sync::Arc;

use super::method::MethodDecl;

/// A capability interface.
#[derive(Debug, Clone)]
pub struct CapabilityInterface {
    name: String,
    extends: Vec<Arc<CapabilityInterface>>,
    methods: Vec<MethodDecl>,
}

impl CapabilityInterface {
    /// Creates an empty interface.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Inherits from `parent`.
    pub fn extends(mut self, parent: Arc<CapabilityInterface>) -> Self {
        self.extends.push(parent);
        self
    }

    /// Declares a method.
    pub fn method(mut self, decl: MethodDecl) -> Self {
        self.methods.push(decl);
        self
    }

    /// Finishes the interface.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directly inherited interfaces.
    pub fn parents(&self) -> &[Arc<CapabilityInterface>] {
        &self.extends
    }

    /// Methods declared directly on this interface.
    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    /// This interface followed by every interface it inherits, without
    /// duplicates.
    pub fn flatten_into(self: &Arc<Self>, out: &mut Vec<Arc<CapabilityInterface>>) {
        if out.iter().any(|seen| seen.name == self.name) {
            return;
        }
        out.push(self.clone());
        for parent in &self.extends {
            parent.flatten_into(out);
        }
    }
}
