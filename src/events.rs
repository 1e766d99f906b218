//! Synchronous, typed pub/sub between the scene and its host.
//!
//! Handlers are registered per [`EventKind`] and removed by handle
//! ([`Subscription`]) rather than by closure identity. A panicking handler
//! is caught and logged; the remaining handlers still run.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::str::FromStr;

use serde_json::Value;

use crate::overlay::LightRecord;
use crate::token::TokenRecord;

/// Scene mutations reported to the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    TokenCreate(TokenRecord),
    TokenUpdate(TokenRecord),
    TokenRemove(TokenRecord),
    TokenMove { id: String, x: f32, y: f32 },
    TokenPaste(Vec<TokenRecord>),
    TokenVision { id: String, vision: Value },
    SelectionChange(Vec<String>),
    LightUpdate(LightRecord),
    LightRemove { id: String },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TokenCreate(_) => EventKind::TokenCreate,
            Event::TokenUpdate(_) => EventKind::TokenUpdate,
            Event::TokenRemove(_) => EventKind::TokenRemove,
            Event::TokenMove { .. } => EventKind::TokenMove,
            Event::TokenPaste(_) => EventKind::TokenPaste,
            Event::TokenVision { .. } => EventKind::TokenVision,
            Event::SelectionChange(_) => EventKind::SelectionChange,
            Event::LightUpdate(_) => EventKind::LightUpdate,
            Event::LightRemove { .. } => EventKind::LightRemove,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    TokenCreate,
    TokenUpdate,
    TokenRemove,
    TokenMove,
    TokenPaste,
    TokenVision,
    SelectionChange,
    LightUpdate,
    LightRemove,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::TokenCreate,
        EventKind::TokenUpdate,
        EventKind::TokenRemove,
        EventKind::TokenMove,
        EventKind::TokenPaste,
        EventKind::TokenVision,
        EventKind::SelectionChange,
        EventKind::LightUpdate,
        EventKind::LightRemove,
    ];

    /// Wire name, e.g. `"token:create"`.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TokenCreate => "token:create",
            EventKind::TokenUpdate => "token:update",
            EventKind::TokenRemove => "token:remove",
            EventKind::TokenMove => "token:move",
            EventKind::TokenPaste => "token:paste",
            EventKind::TokenVision => "token:vision",
            EventKind::SelectionChange => "selection:change",
            EventKind::LightUpdate => "light:update",
            EventKind::LightRemove => "light:remove",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0:?}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

pub type Handler = Rc<dyn Fn(&Event)>;

/// Handle returned by [`EventBus::on`]; pass it back to unsubscribe.
#[derive(Clone, Debug)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.off(self),
            None => false,
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<HashMap<EventKind, Vec<(u64, Handler)>>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn on(self: &Rc<Self>, kind: EventKind, handler: impl Fn(&Event) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((id, Rc::new(handler)));
        Subscription { kind, id, bus: Rc::downgrade(self) }
    }

    pub fn off(&self, sub: &Subscription) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(&sub.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != sub.id);
        before != list.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.borrow().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe while being called. Returns the number of handlers that
    /// completed without panicking.
    pub fn emit(&self, event: &Event) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Handler> = match self.handlers.borrow().get(&kind) {
            Some(list) => list.iter().map(|(_, h)| Rc::clone(h)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    tracing::error!(event = %kind, "event handler panicked: {msg}");
                }
            }
        }
        delivered
    }

    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(ids: &[&str]) -> Event {
        Event::SelectionChange(ids.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn names_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("token:explode".parse::<EventKind>().is_err());
    }

    #[test]
    fn delivers_only_to_matching_kind() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        bus.on(EventKind::SelectionChange, move |_| h.set(h.get() + 1));
        bus.emit(&selection(&["a"]));
        bus.emit(&Event::LightRemove { id: "l".into() });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unsubscribe_by_handle() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = bus.on(EventKind::SelectionChange, move |_| h.set(h.get() + 1));
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        bus.emit(&selection(&[]));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        bus.on(EventKind::SelectionChange, |_| panic!("boom"));
        let h = hits.clone();
        bus.on(EventKind::SelectionChange, move |_| h.set(h.get() + 1));
        let delivered = bus.emit(&selection(&["x"]));
        assert_eq!(delivered, 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_emit() {
        let bus = EventBus::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let sub = bus.on(EventKind::TokenMove, move |_| {
            if let Some(sub) = s.borrow().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);
        bus.emit(&Event::TokenMove { id: "t".into(), x: 0.0, y: 0.0 });
        assert_eq!(bus.handler_count(EventKind::TokenMove), 0);
    }
}
