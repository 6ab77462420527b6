//! Event logging for the optimization pipeline.
//!
//! Passes report what they changed through an [`EventLog`]. The log is append-only and can be
//! shared between the worker threads of [`crate::opt::PassScheduler::run_on_routines`]; events
//! can be inspected for debugging or ignored entirely.
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Collection of events with query and summary helpers
//! - [`EventBuilder`] - Fluent API for creating events
//!
//! # Example
//!
//! ```rust
//! use ironlift::opt::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::ConstantFolded)
//!     .at(0x1000, 0)
//!     .count(3)
//!     .pass("const_fold");
//! log.info("round finished");
//!
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.summary(), "3 constant folded");
//! ```

use std::{collections::HashMap, fmt};

use crate::ir::BlockId;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Instructions with literal inputs were evaluated.
    ConstantFolded,
    /// Duplicated values were merged.
    ValueDeduplicated,
    /// Peephole rules simplified instructions.
    InstructionCombined,
    /// Loads from read-only memory were replaced by literals.
    LoadResolved,
    /// Register reads were forwarded to the written values.
    RegisterPropagated,
    /// Instructions were removed.
    InstructionRemoved,

    /// A routine reached its fixpoint.
    RoutineOptimized,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConstantFolded => "constant folded",
            Self::ValueDeduplicated => "value deduplicated",
            Self::InstructionCombined => "instruction combined",
            Self::LoadResolved => "load resolved",
            Self::RegisterPropagated => "register propagated",
            Self::InstructionRemoved => "instruction removed",
            Self::RoutineOptimized => "routine optimized",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::ConstantFolded
                | Self::ValueDeduplicated
                | Self::InstructionCombined
                | Self::LoadResolved
                | Self::RegisterPropagated
                | Self::InstructionRemoved
        )
    }

    /// Returns true if this is a diagnostic event.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Entry address of the routine, if known.
    pub routine: Option<u64>,
    /// The block the event refers to.
    pub block: Option<BlockId>,
    /// Number of mutations the event stands for.
    pub count: usize,
    /// Human-readable description.
    pub message: String,
    /// Name of the reporting pass.
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            routine: None,
            block: None,
            count: 1,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(pass) = &self.pass {
            write!(f, " ({pass})")?;
        }
        Ok(())
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    routine: Option<u64>,
    block: Option<BlockId>,
    count: usize,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            routine: None,
            block: None,
            count: 1,
            message: None,
            pass: None,
        }
    }

    /// Sets the routine address and the block index where the event occurred.
    pub fn at(mut self, routine: u64, block: usize) -> Self {
        self.routine = Some(routine);
        self.block = Some(BlockId::new(block));
        self
    }

    /// Sets only the routine.
    pub fn routine(mut self, routine: Option<u64>) -> Self {
        self.routine = routine;
        self
    }

    /// Sets only the block.
    pub fn block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }

    /// Sets the number of mutations.
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            routine: self.routine.take(),
            block: self.block.take(),
            count: self.count,
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of optimization events.
///
/// Thread-safe: events can be appended concurrently through shared references.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of every event of `other`.
    pub fn merge(&self, other: &EventLog) {
        for event in other {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events of one routine.
    pub fn filter_routine(&self, routine: u64) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.routine == Some(routine))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns an iterator over diagnostic events only.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Sums the mutation counts grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self {
            *counts.entry(event.kind).or_insert(0) += event.count;
        }
        counts
    }

    /// Total number of mutations recorded by transformation events.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.transformations().map(|e| e.count).sum()
    }

    /// Generates a human-readable summary of all events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

/// Iterator wrapper for EventLog that yields &Event
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

impl Extend<Event> for EventLog {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        for event in iter {
            self.events.push(event);
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::LoadResolved)
            .block(BlockId::new(2))
            .count(4)
            .message("[0x1000] -> 7");

        let event = log.iter().next().unwrap();
        assert_eq!(event.kind, EventKind::LoadResolved);
        assert_eq!(event.block, Some(BlockId::new(2)));
        assert_eq!(event.count, 4);
        assert_eq!(event.to_string(), "[load resolved] [0x1000] -> 7");
    }

    #[test]
    fn test_queries() {
        let log = EventLog::new();
        log.record(EventKind::ConstantFolded).at(0x10, 0).count(2);
        log.record(EventKind::ConstantFolded).at(0x20, 0).count(1);
        log.record(EventKind::InstructionRemoved).at(0x10, 1).count(5);
        log.warn("unusual");

        assert_eq!(log.len(), 4);
        assert!(log.has(EventKind::Warning));
        assert_eq!(log.count_kind(EventKind::ConstantFolded), 2);
        assert_eq!(log.count_by_kind()[&EventKind::ConstantFolded], 3);
        assert_eq!(log.mutation_count(), 8);
        assert_eq!(log.filter_routine(0x10).count(), 2);
        assert_eq!(log.diagnostics().count(), 1);
        assert_eq!(log.summary(), "3 constant folded, 5 instruction removed");
    }

    #[test]
    fn test_merge_and_clone() {
        let a = EventLog::new();
        a.info("one");
        let b = a.clone();
        b.merge(&a);
        assert_eq!(b.len(), 2);
        assert_eq!(a.len(), 1);
        assert_eq!(EventLog::new().summary(), "no events");
    }

    #[test]
    fn test_concurrent_recording() {
        let log = EventLog::new();
        std::thread::scope(|s| {
            for t in 0..4 {
                let log = &log;
                s.spawn(move || {
                    for _ in 0..25 {
                        log.record(EventKind::RegisterPropagated).at(t, 0);
                    }
                });
            }
        });
        assert_eq!(log.count_kind(EventKind::RegisterPropagated), 100);
    }
}
