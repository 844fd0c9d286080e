//! Event dispatcher
//!
//! Typed listener sets, one per event kind, plus a broadcast stream of every
//! event as a [`TrainingEvent`]. Listeners run in registration order. The
//! registry lock is released before any listener runs, so listeners may
//! subscribe or unsubscribe from inside a callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

use crate::training::{
    EventKind, TrainingComplete, TrainingEvent, TrainingProgress, TrainingStarted,
};

/// Capacity of the broadcast event stream
const STREAM_CAPACITY: usize = 256;

/// A registered callback
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct ListenerSet<T: ?Sized> {
    entries: Vec<(ListenerId, Listener<T>)>,
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: ?Sized> ListenerSet<T> {
    fn push(&mut self, id: ListenerId, listener: Listener<T>) {
        self.entries.push((id, listener));
    }

    fn remove(&mut self, id: ListenerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        before - self.entries.len()
    }

    fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    fn snapshot(&self) -> Vec<Listener<T>> {
        self.entries.iter().map(|(_, listener)| listener.clone()).collect()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    started: ListenerSet<TrainingStarted>,
    progress: ListenerSet<TrainingProgress>,
    complete: ListenerSet<TrainingComplete>,
    error: ListenerSet<String>,
    stopped: ListenerSet<String>,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Started => self.started.entries.len(),
            EventKind::Progress => self.progress.entries.len(),
            EventKind::Complete => self.complete.entries.len(),
            EventKind::Error => self.error.entries.len(),
            EventKind::Stopped => self.stopped.entries.len(),
        }
    }

    fn remove(&mut self, kind: EventKind, id: Option<ListenerId>) -> usize {
        match (kind, id) {
            (EventKind::Started, Some(id)) => self.started.remove(id),
            (EventKind::Progress, Some(id)) => self.progress.remove(id),
            (EventKind::Complete, Some(id)) => self.complete.remove(id),
            (EventKind::Error, Some(id)) => self.error.remove(id),
            (EventKind::Stopped, Some(id)) => self.stopped.remove(id),
            (EventKind::Started, None) => self.started.clear(),
            (EventKind::Progress, None) => self.progress.clear(),
            (EventKind::Complete, None) => self.complete.clear(),
            (EventKind::Error, None) => self.error.clear(),
            (EventKind::Stopped, None) => self.stopped.clear(),
        }
    }
}

/// Routes inbound events to listeners; cheap to clone
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
    stream: broadcast::Sender<TrainingEvent>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            stream,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Listeners never run under the lock, so a poisoned registry is still consistent
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_started<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TrainingStarted) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = registry.allocate();
        registry.started.push(id, Arc::new(listener));
        id
    }

    pub fn on_progress<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TrainingProgress) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = registry.allocate();
        registry.progress.push(id, Arc::new(listener));
        id
    }

    pub fn on_complete<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TrainingComplete) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = registry.allocate();
        registry.complete.push(id, Arc::new(listener));
        id
    }

    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = registry.allocate();
        registry.error.push(id, Arc::new(listener));
        id
    }

    pub fn on_stopped<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = registry.allocate();
        registry.stopped.push(id, Arc::new(listener));
        id
    }

    /// Remove one listener of `kind`, or all of them when `listener` is `None`.
    ///
    /// Returns the number of listeners removed.
    pub fn off(&self, kind: EventKind, listener: Option<ListenerId>) -> usize {
        self.registry().remove(kind, listener)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry().count(kind)
    }

    /// Stream of every dispatched event
    pub fn subscribe(&self) -> broadcast::Receiver<TrainingEvent> {
        self.stream.subscribe()
    }

    /// Invoke the listeners of the event's kind, then publish it on the stream
    pub fn dispatch(&self, event: &TrainingEvent) {
        match event {
            TrainingEvent::Started(payload) => {
                let listeners = self.registry().started.snapshot();
                invoke(&listeners, payload);
            }
            TrainingEvent::Progress(payload) => {
                let listeners = self.registry().progress.snapshot();
                invoke(&listeners, payload);
            }
            TrainingEvent::Complete(payload) => {
                let listeners = self.registry().complete.snapshot();
                invoke(&listeners, payload);
            }
            TrainingEvent::Error(payload) => {
                let listeners = self.registry().error.snapshot();
                invoke(&listeners, payload);
            }
            TrainingEvent::Stopped(payload) => {
                let listeners = self.registry().stopped.snapshot();
                invoke(&listeners, payload);
            }
        }

        // No subscribers is fine
        let _ = self.stream.send(event.clone());
    }
}

fn invoke<T: ?Sized>(listeners: &[Listener<T>], payload: &T) {
    for listener in listeners {
        listener(payload);
    }
}
