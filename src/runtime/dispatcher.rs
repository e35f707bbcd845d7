//! In-process publish/subscribe of named events

use std::fmt;

pub type HandlerId = u64;

type Handler = Box<dyn FnMut(&str, &[u8])>;

struct Registration {
    id: HandlerId,
    event_type: String,
    handler: Handler,
}

/// Handlers run synchronously in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Registration>,
    next_id: HandlerId,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, event_type: &str, handler: F) -> HandlerId
    where
        F: FnMut(&str, &[u8]) + 'static,
    {
        self.next_id += 1;
        self.handlers.push(Registration {
            id: self.next_id,
            event_type: event_type.to_string(),
            handler: Box::new(handler),
        });
        self.next_id
    }

    /// Remove every handler for `event_type`
    pub fn unregister(&mut self, event_type: &str) -> usize {
        let before = self.handlers.len();
        self.handlers.retain(|r| r.event_type != event_type);
        before - self.handlers.len()
    }

    pub fn unregister_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|r| r.id != id);
        before != self.handlers.len()
    }

    /// Invoke every matching handler; returns how many ran
    pub fn dispatch(&mut self, event_type: &str, data: &[u8]) -> usize {
        let mut called = 0;
        for r in self.handlers.iter_mut().filter(|r| r.event_type == event_type) {
            (r.handler)(event_type, data);
            called += 1;
        }
        called
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
