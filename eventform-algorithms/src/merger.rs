//! Bounded-latency k-way merge of per-module event streams.
//!
//! # Problem
//! Multi-module detectors run one pipeline per module. Each pipeline emits
//! events in (nearly) increasing time order, but the streams advance at
//! different rates and must be combined into one globally ordered stream.
//!
//! # Solution
//! Each source gets its own time-sorted queue. A min-heap over the queue
//! heads pops the globally oldest event, provided it is more than
//! `max_latency` older than the newest event seen on any source. A forced
//! drain ignores the bound and empties every queue in order.

use eventform_core::error::Result;
use eventform_core::{Event, MergeError, MergeStats, MergerConfig};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

/// Head of one source queue as seen by the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueHead {
    time: u64,
    source: usize,
}

impl PartialOrd for QueueHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueHead {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for Min-Heap (oldest event, then lowest source first)
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges independently ordered event streams into one.
#[derive(Debug, Clone)]
pub struct ChronoMerger {
    config: MergerConfig,
    queues: Vec<VecDeque<Event>>,
    newest: Option<u64>,
    last_emitted: Option<u64>,
    stats: MergeStats,
}

impl ChronoMerger {
    /// Creates a merger for `config.sources` streams.
    pub fn new(config: MergerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            queues: vec![VecDeque::new(); config.sources],
            newest: None,
            last_emitted: None,
            stats: MergeStats::default(),
        })
    }

    /// Number of input streams.
    #[must_use]
    pub fn sources(&self) -> usize {
        self.queues.len()
    }

    /// Newest event time seen on any source.
    #[must_use]
    pub fn newest(&self) -> Option<u64> {
        self.newest
    }

    /// Events queued across all sources.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    /// Queues an event from `source_id`.
    ///
    /// The queue stays sorted by time even if the source slips slightly out
    /// of order; equal times keep arrival order.
    pub fn ingest(&mut self, source_id: usize, event: Event) -> Result<()> {
        let sources = self.queues.len();
        let queue = self
            .queues
            .get_mut(source_id)
            .ok_or(MergeError::UnknownSource { source_id, sources })?;
        let at = queue.partition_point(|e| e.time <= event.time);
        queue.insert(at, event);
        self.newest = Some(self.newest.map_or(event.time, |n| n.max(event.time)));
        self.stats.ingested += 1;
        Ok(())
    }

    /// Emits, oldest first, every queued event more than `max_latency`
    /// older than the newest time seen.
    pub fn drain(&mut self) -> Vec<Event> {
        let Some(newest) = self.newest else {
            return Vec::new();
        };
        let max_latency = self.config.max_latency;
        self.emit_while(|time| newest - time > max_latency)
    }

    /// Emits everything queued, oldest first.
    pub fn force_drain(&mut self) -> Vec<Event> {
        self.emit_while(|_| true)
    }

    fn emit_while<F: Fn(u64) -> bool>(&mut self, eligible: F) -> Vec<Event> {
        let mut heap: BinaryHeap<QueueHead> = self
            .queues
            .iter()
            .enumerate()
            .filter_map(|(source, queue)| {
                queue.front().map(|e| QueueHead {
                    time: e.time,
                    source,
                })
            })
            .collect();

        let mut out = Vec::new();
        while let Some(head) = heap.pop() {
            if !eligible(head.time) {
                break;
            }
            let queue = &mut self.queues[head.source];
            let Some(event) = queue.pop_front() else {
                continue;
            };
            if self.last_emitted.is_some_and(|last| event.time < last) {
                self.stats.late += 1;
            }
            self.last_emitted = Some(event.time);
            out.push(event);

            // Replenish from the same source
            if let Some(next) = queue.front() {
                heap.push(QueueHead {
                    time: next.time,
                    source: head.source,
                });
            }
        }

        self.stats.emitted += out.len();
        if !out.is_empty() {
            log::debug!(
                "chrono merger: emitted {}, {} still queued",
                out.len(),
                self.pending()
            );
        }
        out
    }
}
