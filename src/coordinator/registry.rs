//! Local Listener Registry
//!
//! Callbacks interested in "process kind became operational somewhere in the
//! cluster". Listeners live as long as the coordinator; there is no removal.

use crate::storage::types::ProcessKind;

use std::sync::{Arc, RwLock};

pub type ListenerFn = Arc<dyn Fn(ProcessKind) + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<ListenerFn>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register<F>(&self, listener: F)
    where
        F: Fn(ProcessKind) + Send + Sync + 'static,
    {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(Arc::new(listener));

        tracing::debug!("Registered listener #{}", listeners.len());
    }

    /// Calls every listener, in registration order, on the current thread.
    pub fn dispatch(&self, kind: ProcessKind) {
        // Snapshot so a listener may register another one.
        let snapshot: Vec<ListenerFn> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for listener in snapshot {
            listener(kind);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let calls = calls.clone();
            registry.register(move |kind| calls.lock().unwrap().push((tag, kind)));
        }

        registry.dispatch(ProcessKind::Elasticsearch);

        assert_eq!(registry.listener_count(), 3);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                ("first", ProcessKind::Elasticsearch),
                ("second", ProcessKind::Elasticsearch),
                ("third", ProcessKind::Elasticsearch),
            ]
        );
    }

    #[test]
    fn test_dispatch_without_listeners_is_noop() {
        let registry = ListenerRegistry::new();
        registry.dispatch(ProcessKind::App);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let registry = ListenerRegistry::new();
        let inner = registry.clone();
        registry.register(move |_| inner.register(|_| {}));

        registry.dispatch(ProcessKind::WebServer);
        assert_eq!(registry.listener_count(), 2);
    }
}
