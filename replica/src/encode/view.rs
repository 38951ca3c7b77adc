use std::collections::HashSet;

use crate::graph::{Graph, InstanceId};

/// Per-observer visibility scope. A view never re-derives anything from
/// live state: it only gates which already-computed operations are copied
/// into that observer's buffer.
///
/// An operation on a view-restricted field is included when the view
/// explicitly contains the subject instance, or when the registered
/// predicate admits it. Operations on unrestricted fields always pass.
pub struct View {
    included: HashSet<InstanceId>,
    predicate: Option<Box<dyn Fn(&Graph, InstanceId) -> bool>>,
}

impl View {
    pub fn new() -> Self {
        Self {
            included: HashSet::new(),
            predicate: None,
        }
    }

    /// Explicitly admit an instance into this observer's scope.
    pub fn add(&mut self, instance: InstanceId) {
        self.included.insert(instance);
    }

    pub fn remove(&mut self, instance: InstanceId) {
        self.included.remove(&instance);
    }

    pub fn contains(&self, instance: InstanceId) -> bool {
        self.included.contains(&instance)
    }

    /// Install a predicate consulted for restricted operations whose
    /// subject is not explicitly included.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Graph, InstanceId) -> bool + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Visibility decision for a restricted operation. Side-effect-free.
    pub(crate) fn admits(&self, graph: &Graph, subject: InstanceId) -> bool {
        if self.included.contains(&subject) {
            return true;
        }
        match &self.predicate {
            Some(predicate) => predicate(graph, subject),
            None => false,
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}
