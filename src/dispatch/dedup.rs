//! Consumer-side duplicate suppression.
//!
//! Delivery is at-least-once: a frame that was in flight when the link
//! dropped is replayed after reconnect. Consumers feed every received
//! envelope through a [`Deduplicator`] and act only on first sightings.

use std::collections::{HashSet, VecDeque};

use super::Envelope;
use crate::records::Topic;

/// Default number of keys remembered.
const DEFAULT_CAPACITY: usize = 4096;

/// Remembers recently seen `(topic, key)` pairs, evicting the oldest first.
#[derive(Debug)]
pub struct Deduplicator {
    seen: HashSet<(Topic, String)>,
    order: VecDeque<(Topic, String)>,
    capacity: usize,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Deduplicator {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` the first time an envelope's key is seen.
    pub fn accept(&mut self, envelope: &Envelope) -> bool {
        let key = (envelope.event, envelope.idempotency_key());
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity
            && let Some(evicted) = self.order.pop_front()
        {
            self.seen.remove(&evicted);
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CallRecord, Priority, TaskRecord};

    #[test]
    fn replayed_task_is_dropped() {
        let mut dedup = Deduplicator::default();
        let first = Envelope::task(&TaskRecord::new(10, "a", Priority::Low)).unwrap();
        // Same task id, different event id: still a duplicate.
        let replay = Envelope::task(&TaskRecord::new(10, "a", Priority::Low)).unwrap();

        assert!(dedup.accept(&first));
        assert!(!dedup.accept(&replay));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn calls_key_on_event_id() {
        let call = CallRecord {
            name: "Sync".into(),
            members: vec![],
            date: String::new(),
            time: String::new(),
            status: None,
        };
        let mut dedup = Deduplicator::default();
        let env = Envelope::call(&call).unwrap();
        assert!(dedup.accept(&env));
        assert!(!dedup.accept(&env.clone()));
        assert!(dedup.accept(&Envelope::call(&call).unwrap()));
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut dedup = Deduplicator::new(2);
        let envs: Vec<Envelope> = (1..=3)
            .map(|id| Envelope::task(&TaskRecord::new(id, "t", Priority::Medium)).unwrap())
            .collect();
        for env in &envs {
            assert!(dedup.accept(env));
        }
        assert_eq!(dedup.len(), 2);
        // Task 1 was evicted, so it is accepted again.
        assert!(dedup.accept(&envs[0]));
        assert!(!dedup.accept(&envs[2]));
    }
}
