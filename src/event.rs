//! Change notification for model observers. Views subscribe a callback and
//! receive one event per successful mutation, after the model is back in a
//! consistent state.

/// What changed in the model. Coarse on purpose: observers redraw, they do
/// not diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    /// The dataset itself was replaced or restored; rebuild everything.
    DataSetChanged,
    /// Attributes were added or removed; rebuild attribute-dependent state.
    DataStructureChanged,
    /// The projection or view moved; repaint.
    ViewChanged,
    /// The selected row set changed.
    SelectionChanged,
    /// Retinal bindings or marker size changed.
    DecorationChanged,
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Single-threaded listener registry. Listeners run in subscription order;
/// `emit` takes `&mut self`, so a listener cannot re-enter the bus.
pub struct EventBus {
    listeners: Vec<(ListenerId, Box<dyn FnMut(ModelEvent)>)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(ModelEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false when the id was already gone.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: ModelEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |e| sink.borrow_mut().push(e));

        bus.emit(ModelEvent::ViewChanged);
        bus.emit(ModelEvent::DataSetChanged);
        assert_eq!(
            *seen.borrow(),
            vec![ModelEvent::ViewChanged, ModelEvent::DataSetChanged]
        );

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(ModelEvent::ViewChanged);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for tag in 0..3 {
            let sink = Rc::clone(&order);
            bus.subscribe(move |_| sink.borrow_mut().push(tag));
        }
        bus.emit(ModelEvent::SelectionChanged);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert_eq!(bus.listener_count(), 3);
    }
}
