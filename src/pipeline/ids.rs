//! Task id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Issues time-based task ids (Unix milliseconds) that strictly increase
/// even when several are drawn within the same millisecond.
#[derive(Debug, Default)]
pub struct TaskIds {
    last: AtomicU64,
}

impl TaskIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => now.max(prev + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn ids_strictly_increase_in_a_burst() {
        let ids = TaskIds::new();
        let drawn: Vec<u64> = (0..1000).map(|_| ids.next()).collect();
        assert!(drawn.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ids_track_wall_clock() {
        let before = Utc::now().timestamp_millis() as u64;
        let id = TaskIds::new().next();
        assert!(id >= before);
    }

    #[tokio::test]
    async fn ids_unique_across_tasks() {
        let ids = Arc::new(TaskIds::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ids = Arc::clone(&ids);
            handles.push(tokio::spawn(async move {
                (0..250).map(|_| ids.next()).collect::<Vec<_>>()
            }));
        }
        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
    }
}
