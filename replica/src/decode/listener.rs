use std::collections::HashMap;

use crate::decode::event::SyncEvent;
use crate::graph::{Graph, InstanceId};

type Callback = Box<dyn FnMut(&Graph, &SyncEvent)>;

/// Decode-side callback registry. Callbacks fire synchronously as each
/// operation is applied, in wire order. Registration never affects what is
/// decoded, only what is observed.
pub struct Listeners {
    field: HashMap<(InstanceId, u8), Vec<Callback>>,
    container: HashMap<InstanceId, Vec<Callback>>,
    removal: HashMap<InstanceId, Vec<Callback>>,
    any: Vec<Callback>,
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            field: HashMap::new(),
            container: HashMap::new(),
            removal: HashMap::new(),
            any: Vec::new(),
        }
    }

    /// Observe one field of one instance.
    pub fn on_field<F>(&mut self, instance: InstanceId, index: u8, callback: F)
    where
        F: FnMut(&Graph, &SyncEvent) + 'static,
    {
        self.field
            .entry((instance, index))
            .or_default()
            .push(Box::new(callback));
    }

    /// Observe add/change/remove/move/clear on one container.
    pub fn on_container<F>(&mut self, container: InstanceId, callback: F)
    where
        F: FnMut(&Graph, &SyncEvent) + 'static,
    {
        self.container
            .entry(container)
            .or_default()
            .push(Box::new(callback));
    }

    /// Observe the reclamation of one instance.
    pub fn on_removed<F>(&mut self, instance: InstanceId, callback: F)
    where
        F: FnMut(&Graph, &SyncEvent) + 'static,
    {
        self.removal
            .entry(instance)
            .or_default()
            .push(Box::new(callback));
    }

    /// Observe every event.
    pub fn on_any<F>(&mut self, callback: F)
    where
        F: FnMut(&Graph, &SyncEvent) + 'static,
    {
        self.any.push(Box::new(callback));
    }

    pub(crate) fn fire(&mut self, graph: &Graph, event: &SyncEvent) {
        match event {
            SyncEvent::FieldChanged { instance, index }
            | SyncEvent::FieldRemoved { instance, index } => {
                if let Some(callbacks) = self.field.get_mut(&(*instance, *index)) {
                    for callback in callbacks {
                        callback(graph, event);
                    }
                }
            }
            SyncEvent::EntryAdded { container, .. }
            | SyncEvent::EntryChanged { container, .. }
            | SyncEvent::EntryRemoved { container, .. }
            | SyncEvent::EntryMoved { container, .. }
            | SyncEvent::Cleared { container } => {
                if let Some(callbacks) = self.container.get_mut(container) {
                    for callback in callbacks {
                        callback(graph, event);
                    }
                }
            }
            SyncEvent::InstanceRemoved { instance } => {
                if let Some(callbacks) = self.removal.get_mut(instance) {
                    for callback in callbacks {
                        callback(graph, event);
                    }
                }
            }
            SyncEvent::InstanceCreated { .. } => {}
        }
        for callback in &mut self.any {
            callback(graph, event);
        }
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}
