//! Change events and the subscriber interface.
//!
//! The monitor translates server pushes into [`ChangeEvent`]s and delivers
//! them synchronously to every subscribed [`ChangeListener`], in the order
//! the listeners subscribed. A listener is purely a sink; it is the caller's
//! responsibility to keep it cheap and panic-free.

use std::sync::{Arc, Mutex, PoisonError};

use mailwatch_imap::Flags;

/// A change observed in the watched mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The message count increased: new mail arrived.
    NewMail,
    /// A message was removed from the mailbox.
    RemovedMail,
    /// Flags changed on a message.
    FlagsChanged {
        /// Sequence number of the affected message.
        index: u32,
        /// The message's flags after the change.
        flags: Flags,
    },
}

/// Receives change events from a monitor.
pub trait ChangeListener: Send {
    /// Called for every change, in server emission order.
    fn on_change(&mut self, event: &ChangeEvent);
}

// Plain closures work as listeners.
impl<F> ChangeListener for F
where
    F: FnMut(&ChangeEvent) + Send,
{
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event);
    }
}

/// Identifies a subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// A listener that logs every event via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ChangeListener for LoggingListener {
    fn on_change(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::NewMail => tracing::info!("new message arrived"),
            ChangeEvent::RemovedMail => tracing::info!("message removed"),
            ChangeEvent::FlagsChanged { index, flags } => {
                tracing::info!(index, %flags, "message flags changed");
            }
        }
    }
}

/// A listener that collects events for later inspection.
///
/// Cloning shares the underlying buffer: subscribe one clone, keep another
/// for assertions. Useful for testing and batch processing.
#[derive(Debug, Default, Clone)]
pub struct CollectingListener {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl CollectingListener {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the collected events.
    #[must_use]
    pub fn collected(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops all collected events.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ChangeListener for CollectingListener {
    fn on_change(&mut self, event: &ChangeEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
