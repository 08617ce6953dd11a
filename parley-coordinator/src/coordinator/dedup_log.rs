use parley_core::MessageId;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Keys already seen, bounded by age and by count.
///
/// A key is forgotten once it has gone unseen for `window`. Every sighting
/// refreshes it, so a relay that keeps redelivering the same envelope never
/// gets it past the log. Once `capacity` keys are held the least recently
/// seen one is evicted first.
#[derive(Debug)]
pub struct DedupLog<K = MessageId> {
    window: Duration,
    capacity: usize,
    last_seen: HashMap<K, Instant>,
    /// Sightings in time order. Entries whose instant no longer matches
    /// `last_seen` are stale and skipped on eviction.
    order: VecDeque<(Instant, K)>,
}

impl<K: Clone + Eq + Hash> DedupLog<K> {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            last_seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record a sighting of `key`; returns false if it was already held.
    pub fn check_and_record(&mut self, key: K, now: Instant) -> bool {
        self.evict_expired(now);
        match self.last_seen.insert(key.clone(), now) {
            None => {
                self.order.push_back((now, key));
                while self.last_seen.len() > self.capacity {
                    self.evict_oldest();
                }
                true
            }
            Some(previous) => {
                if previous != now {
                    self.order.push_back((now, key));
                    self.compact();
                }
                false
            }
        }
    }

    /// Whether `key` is held, without counting this as a sighting.
    pub fn contains(&mut self, key: &K, now: Instant) -> bool {
        self.evict_expired(now);
        self.last_seen.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    fn is_live(&self, at: Instant, key: &K) -> bool {
        self.last_seen.get(key) == Some(&at)
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((at, _)) = self.order.front() {
            if now.duration_since(*at) < self.window {
                break;
            }
            if let Some((at, key)) = self.order.pop_front() {
                if self.is_live(at, &key) {
                    self.last_seen.remove(&key);
                }
            }
        }
    }

    fn evict_oldest(&mut self) {
        while let Some((at, key)) = self.order.pop_front() {
            if self.is_live(at, &key) {
                self.last_seen.remove(&key);
                return;
            }
        }
    }

    /// Drop stale sightings once they outnumber live keys.
    fn compact(&mut self) {
        if self.order.len() <= self.last_seen.len().saturating_mul(2) {
            return;
        }
        let last_seen = &self.last_seen;
        self.order.retain(|(at, key)| last_seen.get(key) == Some(at));
    }
}
