//! Performance tracker: rolling per-judge call statistics
//!
//! Append-only: every call outcome bumps counters and running means for the
//! judge involved. Each judge gets its own lock bucket so a burst of updates
//! for one judge never contends with unrelated judges. Reads clone the
//! current stats out; they are eventually accurate under concurrent writes,
//! not linearizable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::JudgeCallOutcome;

/// Rolling statistics for one judge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStat {
    pub judge_name: String,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Running mean latency over successful calls, in milliseconds
    pub avg_latency_ms: f64,
    /// Running mean confidence over successful calls
    pub avg_confidence: f64,
    /// Cumulative cost across all successful calls
    pub total_cost: f64,
    pub last_updated: DateTime<Utc>,
}

impl PerformanceStat {
    fn new(judge_name: &str) -> Self {
        Self {
            judge_name: judge_name.to_string(),
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            avg_latency_ms: 0.0,
            avg_confidence: 0.0,
            total_cost: 0.0,
            last_updated: Utc::now(),
        }
    }

    /// Fraction of calls that succeeded (1.0 when no calls yet)
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            1.0
        } else {
            self.successful_calls as f64 / self.total_calls as f64
        }
    }

    fn record_success(&mut self, latency_ms: u64, confidence: f64, cost: f64) {
        self.total_calls += 1;
        self.successful_calls += 1;
        // Welford-style running means: stable under arbitrarily long uptimes
        let n = self.successful_calls as f64;
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / n;
        self.avg_confidence += (confidence - self.avg_confidence) / n;
        self.total_cost += cost;
        self.last_updated = Utc::now();
    }

    fn record_failure(&mut self) {
        self.total_calls += 1;
        self.failed_calls += 1;
        self.last_updated = Utc::now();
    }
}

/// Process-wide tracker with one lock bucket per judge name
pub struct PerformanceTracker {
    buckets: RwLock<HashMap<String, Arc<Mutex<PerformanceStat>>>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn bucket(&self, judge_name: &str) -> Arc<Mutex<PerformanceStat>> {
        {
            let buckets = self.buckets.read().expect("tracker lock poisoned");
            if let Some(bucket) = buckets.get(judge_name) {
                return bucket.clone();
            }
        }
        let mut buckets = self.buckets.write().expect("tracker lock poisoned");
        buckets
            .entry(judge_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(PerformanceStat::new(judge_name))))
            .clone()
    }

    /// Record one call outcome, creating the judge's stats on first sight
    pub fn record(&self, outcome: &JudgeCallOutcome) {
        let bucket = self.bucket(&outcome.judge_name);
        let mut stat = bucket.lock().expect("stat lock poisoned");
        match &outcome.opinion {
            Some(opinion) => {
                stat.record_success(outcome.elapsed_ms, opinion.confidence, opinion.cost)
            }
            None => stat.record_failure(),
        }
    }

    /// Current stats for one judge
    pub fn snapshot(&self, judge_name: &str) -> Option<PerformanceStat> {
        let buckets = self.buckets.read().expect("tracker lock poisoned");
        buckets
            .get(judge_name)
            .map(|b| b.lock().expect("stat lock poisoned").clone())
    }

    /// Current stats for every judge seen so far, sorted by name
    pub fn snapshot_all(&self) -> Vec<PerformanceStat> {
        let buckets = self.buckets.read().expect("tracker lock poisoned");
        let mut stats: Vec<PerformanceStat> = buckets
            .values()
            .map(|b| b.lock().expect("stat lock poisoned").clone())
            .collect();
        stats.sort_by(|a, b| a.judge_name.cmp(&b.judge_name));
        stats
    }

    /// Drop a judge's stats; only used when the judge itself is removed
    pub fn remove(&self, judge_name: &str) {
        let mut buckets = self.buckets.write().expect("tracker lock poisoned");
        buckets.remove(judge_name);
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallError, Opinion};

    fn success(judge: &str, confidence: f64, cost: f64, latency_ms: u64) -> JudgeCallOutcome {
        JudgeCallOutcome::success(
            Opinion::new(judge, true, confidence)
                .with_cost(cost)
                .with_latency_ms(latency_ms),
            latency_ms,
        )
    }

    #[test]
    fn test_running_means() {
        let tracker = PerformanceTracker::new();
        tracker.record(&success("a", 0.8, 0.01, 100));
        tracker.record(&success("a", 0.6, 0.01, 300));

        let stat = tracker.snapshot("a").unwrap();
        assert_eq!(stat.total_calls, 2);
        assert_eq!(stat.successful_calls, 2);
        assert!((stat.avg_latency_ms - 200.0).abs() < 1e-9);
        assert!((stat.avg_confidence - 0.7).abs() < 1e-9);
        assert!((stat.total_cost - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_failures_counted_separately() {
        let tracker = PerformanceTracker::new();
        tracker.record(&success("a", 0.9, 0.0, 50));
        tracker.record(&JudgeCallOutcome::failure(
            "a",
            CallError::Timeout { timeout_ms: 100 },
            100,
        ));

        let stat = tracker.snapshot("a").unwrap();
        assert_eq!(stat.total_calls, 2);
        assert_eq!(stat.failed_calls, 1);
        assert_eq!(stat.success_rate(), 0.5);
        // Failure latencies do not pollute the success mean
        assert!((stat.avg_latency_ms - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_judge_snapshot_is_none() {
        let tracker = PerformanceTracker::new();
        assert!(tracker.snapshot("nobody").is_none());
    }

    #[test]
    fn test_snapshot_all_sorted() {
        let tracker = PerformanceTracker::new();
        tracker.record(&success("zeta", 0.5, 0.0, 10));
        tracker.record(&success("alpha", 0.5, 0.0, 10));

        let names: Vec<String> = tracker
            .snapshot_all()
            .into_iter()
            .map(|s| s.judge_name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_remove() {
        let tracker = PerformanceTracker::new();
        tracker.record(&success("a", 0.5, 0.0, 10));
        tracker.remove("a");
        assert!(tracker.snapshot("a").is_none());
    }

    #[test]
    fn test_concurrent_appends() {
        let tracker = Arc::new(PerformanceTracker::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                let judge = if i % 2 == 0 { "even" } else { "odd" };
                for _ in 0..100 {
                    tracker.record(&success(judge, 0.5, 0.001, 10));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.snapshot("even").unwrap().total_calls, 400);
        assert_eq!(tracker.snapshot("odd").unwrap().total_calls, 400);
    }
}
