//! Minor-step outcome log.
//!
//! A bounded record of what each minor step did: how many decompositions
//! it spent, how it ended, and how each non-linear link voted. The log
//! survives checkpointing so a failed frame can be diagnosed after the
//! fact.

use lpn_network::SolutionResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How a minor step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    /// Converged and all links confirmed; the major step is done.
    Success,
    /// All links confirmed but convergence is not yet declared.
    Confirm,
    Reject,
    Delay,
    /// The decomposition limit was exceeded; the frame is abandoned.
    DecompLimit,
    /// A numerical failure propagated out of the solve.
    MathFail,
}

/// One minor step's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinorStepRecord {
    pub major_step: u64,
    pub minor_step: usize,
    pub decompositions: usize,
    pub result: StepResult,
    /// (link index, verdict) for each polled non-linear link.
    pub link_results: Vec<(usize, SolutionResult)>,
}

/// Bounded log of minor-step records, oldest dropped first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLog {
    capacity: usize,
    records: VecDeque<MinorStepRecord>,
    current: Option<MinorStepRecord>,
    major_step: u64,
}

impl Default for StepLog {
    fn default() -> Self {
        Self::new(128)
    }
}

impl StepLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: VecDeque::new(),
            current: None,
            major_step: 0,
        }
    }

    pub fn begin_major_step(&mut self, major_step: u64) {
        self.major_step = major_step;
    }

    pub fn begin_minor_step(&mut self, minor_step: usize) {
        self.current = Some(MinorStepRecord {
            major_step: self.major_step,
            minor_step,
            decompositions: 0,
            result: StepResult::Confirm,
            link_results: Vec::new(),
        });
    }

    pub fn record_link_result(&mut self, link: usize, result: SolutionResult) {
        if let Some(current) = &mut self.current {
            current.link_results.push((link, result));
        }
    }

    /// Close out the current minor step with its outcome.
    pub fn record_step_result(&mut self, decompositions: usize, result: StepResult) {
        if let Some(mut record) = self.current.take() {
            record.decompositions = decompositions;
            record.result = result;
            if self.records.len() == self.capacity {
                self.records.pop_front();
            }
            self.records.push_back(record);
        }
    }

    pub fn end_major_step(&mut self) {
        // A dangling minor step (aborted mid-solve) is closed as a failure.
        if self.current.is_some() {
            self.record_step_result(0, StepResult::MathFail);
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &MinorStepRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&MinorStepRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_minor_step_outcomes_in_order() {
        let mut log = StepLog::new(8);
        log.begin_major_step(1);
        log.begin_minor_step(1);
        log.record_link_result(0, SolutionResult::Reject);
        log.record_step_result(1, StepResult::Reject);
        log.begin_minor_step(2);
        log.record_step_result(1, StepResult::Success);
        log.end_major_step();

        let records: Vec<_> = log.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].result, StepResult::Reject);
        assert_eq!(records[0].link_results, vec![(0, SolutionResult::Reject)]);
        assert_eq!(records[1].result, StepResult::Success);
        assert_eq!(records[1].decompositions, 1);
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut log = StepLog::new(2);
        log.begin_major_step(1);
        for minor in 1..=3 {
            log.begin_minor_step(minor);
            log.record_step_result(0, StepResult::Confirm);
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.records().next().unwrap().minor_step, 2);
    }

    #[test]
    fn dangling_step_closed_as_math_fail() {
        let mut log = StepLog::new(4);
        log.begin_major_step(3);
        log.begin_minor_step(1);
        log.end_major_step();
        assert_eq!(log.last().unwrap().result, StepResult::MathFail);
    }

    #[test]
    fn round_trips_through_serde() {
        let mut log = StepLog::new(4);
        log.begin_major_step(2);
        log.begin_minor_step(1);
        log.record_step_result(1, StepResult::Success);

        let json = serde_json::to_string(&log).unwrap();
        let back: StepLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.last().unwrap().result, StepResult::Success);
    }
}
