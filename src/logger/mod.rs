//! Activity logging: typed events, the sink trait every component writes to,
//! and the append-only file writer with graceful degradation.

pub mod activity;
pub mod writer;

pub use activity::{ActivityEvent, Severity};

/// Destination for activity events.
///
/// Components take `&mut dyn EventSink` so a run can log to a file or to
/// memory without knowing which.
pub trait EventSink {
    /// Record one event. Must never fail or panic; logging is best-effort.
    fn record(&mut self, event: ActivityEvent);
}

/// Sink that keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<ActivityEvent>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events matching `pred`, in recording order.
    pub fn matching<F>(&self, pred: F) -> Vec<&ActivityEvent>
    where
        F: Fn(&ActivityEvent) -> bool,
    {
        self.events.iter().filter(|e| pred(e)).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: ActivityEvent) {
        self.events.push(event);
    }
}

/// Memory sink that runs a callback on each event before storing it.
#[cfg(test)]
pub(crate) struct HookSink<F: FnMut(&ActivityEvent)> {
    pub inner: MemorySink,
    hook: F,
}

#[cfg(test)]
impl<F: FnMut(&ActivityEvent)> HookSink<F> {
    pub fn new(hook: F) -> Self {
        Self {
            inner: MemorySink::new(),
            hook,
        }
    }
}

#[cfg(test)]
impl<F: FnMut(&ActivityEvent)> EventSink for HookSink<F> {
    fn record(&mut self, event: ActivityEvent) {
        (self.hook)(&event);
        self.inner.record(event);
    }
}
