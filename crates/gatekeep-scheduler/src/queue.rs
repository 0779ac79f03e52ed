//! Queue management for builds waiting on branch capacity.

use crate::triggers::MatchedTrigger;
use chrono::{DateTime, Utc};
use gatekeep_core::event::VcsEvent;
use gatekeep_core::ids::BuildId;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Priority for queue items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal = 1,
    /// Retries configured with `move_to_the_queue_top`.
    High = 2,
}

/// A build that matched a trigger, as submitted to the dispatcher.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub build_id: BuildId,
    pub event: VcsEvent,
    pub matched: MatchedTrigger,
    pub user_overrides: BTreeMap<String, String>,
    /// 1-based; retries increment it.
    pub attempt: u32,
}

impl BuildRequest {
    pub fn new(
        event: VcsEvent,
        matched: MatchedTrigger,
        user_overrides: BTreeMap<String, String>,
    ) -> Self {
        Self {
            build_id: BuildId::new(),
            event,
            matched,
            user_overrides,
            attempt: 1,
        }
    }

    pub fn branch(&self) -> &str {
        &self.matched.branch
    }

    /// The next attempt of the same build.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// A build waiting for capacity on its branch.
#[derive(Debug, Clone)]
pub struct QueuedBuild {
    pub request: BuildRequest,
    pub priority: Priority,
    pub queued_at: DateTime<Utc>,
    sequence: u64,
}

impl PartialEq for QueuedBuild {
    fn eq(&self, other: &Self) -> bool {
        self.request.build_id == other.request.build_id && self.sequence == other.sequence
    }
}

impl Eq for QueuedBuild {}

impl PartialOrd for QueuedBuild {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedBuild {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then first in
        match (self.priority as u8).cmp(&(other.priority as u8)) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other => other,
        }
    }
}

/// Running-build counters per branch plus the wait queue.
#[derive(Debug, Default)]
pub struct QueueManager {
    queue: BinaryHeap<QueuedBuild>,
    running: HashMap<String, usize>,
    next_sequence: u64,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running_on(&self, branch: &str) -> usize {
        self.running.get(branch).copied().unwrap_or(0)
    }

    /// Count a build as running on `branch`.
    pub fn start(&mut self, branch: &str) {
        *self.running.entry(branch.to_string()).or_insert(0) += 1;
    }

    /// Free a running slot on `branch`.
    pub fn finish(&mut self, branch: &str) {
        if let Some(count) = self.running.get_mut(branch) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.running.remove(branch);
            }
        }
    }

    /// Add a build to the queue.
    pub fn enqueue(&mut self, request: BuildRequest, priority: Priority) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(QueuedBuild {
            request,
            priority,
            queued_at: Utc::now(),
            sequence,
        });
    }

    /// Return a dequeued build to the queue with its original place.
    pub fn requeue(&mut self, build: QueuedBuild) {
        self.queue.push(build);
    }

    /// Pop the highest-priority build whose branch has capacity.
    /// `has_capacity` receives the branch and its running count.
    pub fn dequeue_ready(
        &mut self,
        has_capacity: impl Fn(&str, usize) -> bool,
    ) -> Option<QueuedBuild> {
        let mut temp = Vec::new();
        let mut result = None;

        while let Some(build) = self.queue.pop() {
            let branch = build.request.branch();
            if has_capacity(branch, self.running_on(branch)) {
                result = Some(build);
                break;
            }
            temp.push(build);
        }

        // Put back builds that still have to wait
        self.queue.extend(temp);

        result
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the 1-based position of a build in the queue.
    pub fn position(&self, build_id: &BuildId) -> Option<usize> {
        let mut sorted: Vec<_> = self.queue.iter().collect();
        sorted.sort_by(|a, b| b.cmp(a));
        sorted
            .iter()
            .position(|b| &b.request.build_id == build_id)
            .map(|p| p + 1)
    }
}
