use crate::Collector;
use anyhow::Result;
use metrik_common::Metric;

pub const POLL_COUNT: &str = "PollCount";

/// Counter `PollCount`, always `1`.
///
/// The repository replaces counters on upsert and the agent deletes this one
/// after each successful report, so the server sees `1` once per report.
#[derive(Default)]
pub struct PollCounter;

impl PollCounter {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for PollCounter {
    fn name(&self) -> &str {
        "poll"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        Ok(vec![Metric::counter(POLL_COUNT, 1)])
    }
}
