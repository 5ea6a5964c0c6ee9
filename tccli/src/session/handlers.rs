//! Ordered registry of inbound-line handlers.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A callback receiving one raw application line.
pub type Handler = Arc<dyn Fn(&str) + Send + Sync>;

/// Handlers invoked, in registration order, for every application line.
///
/// Registration takes `&self` so handlers can be added while a read loop
/// is dispatching; a handler added mid-dispatch sees the next line.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn add<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handlers.write().push(Arc::new(handler));
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handler has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Call every handler with `line`, in registration order.
    ///
    /// The handler list is snapshotted first, so a handler may register
    /// further handlers without deadlocking. Panics propagate.
    pub fn dispatch(&self, line: &str) {
        let snapshot: Vec<Handler> = self.handlers.read().clone();
        for handler in &snapshot {
            handler(line);
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
