//! Judge pipeline telemetry: counters `judge.received`,
//! `judge.succeeded{answer}`, `judge.failed` and the `judge.run_time` timer.
//!
//! Plain atomics; an exporter in the surrounding system scrapes the snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::Answer;

/// Counter metric (monotonically increasing).
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Duration aggregate: call count, total and maximum milliseconds.
#[derive(Debug, Default)]
pub struct Timer {
    count: AtomicU64,
    total_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl Timer {
    pub fn record(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms.load(Ordering::Relaxed)
    }

    pub fn max_ms(&self) -> u64 {
        self.max_ms.load(Ordering::Relaxed)
    }
}

fn answer_index(answer: Answer) -> usize {
    match answer {
        Answer::NoAnswer => 0,
        Answer::Accepted => 1,
        Answer::WrongAnswer => 2,
        Answer::TimeLimitExceeded => 3,
        Answer::MemoryLimitExceeded => 4,
        Answer::RuntimeError => 5,
        Answer::CompilationError => 6,
    }
}

/// `judge.succeeded` counter family, tagged by answer.
#[derive(Debug, Default)]
pub struct AnswerCounters {
    counters: [Counter; 7],
}

impl AnswerCounters {
    pub fn inc(&self, answer: Answer) {
        self.counters[answer_index(answer)].inc();
    }

    pub fn get(&self, answer: Answer) -> u64 {
        self.counters[answer_index(answer)].get()
    }

    pub fn total(&self) -> u64 {
        self.counters.iter().map(Counter::get).sum()
    }
}

#[derive(Debug, Default)]
pub struct JudgeMetrics {
    /// Messages pulled from the judge queue.
    pub received: Counter,
    /// Evaluations that produced a verdict, tagged by answer.
    pub succeeded: AnswerCounters,
    /// Evaluations that raised an infrastructure error.
    pub failed: Counter,
    /// Wall-clock time of evaluator runs.
    pub run_time: Timer,
}

impl JudgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
