//! Metric sampling for the metrik agent.
//!
//! Each [`Collector`] produces one category of metrics (process runtime, host
//! memory, CPU, random value, poll count). The [`Scanner`] runs all of them
//! once per tick and writes the combined sample to a repository.

pub mod alloc;
pub mod cpu;
pub mod memory;
pub mod poll;
pub mod random;
pub mod runtime;
pub mod scanner;

use anyhow::Result;
use metrik_common::Metric;

pub use scanner::Scanner;

/// A metric source sampled by the agent.
///
/// Implementations are registered in the [`Scanner`] and called at each poll
/// interval. The trait requires `Send + Sync` so the scanner can live inside
/// a spawned task.
pub trait Collector: Send + Sync {
    /// Returns the collector name (e.g., `"cpu"`, `"runtime"`), used for logging.
    fn name(&self) -> &str;

    /// Samples the current values.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API yields no data.
    fn collect(&mut self) -> Result<Vec<Metric>>;
}
