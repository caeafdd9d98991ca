use crate::Collector;
use anyhow::Result;
use metrik_common::Metric;
use sysinfo::System;

/// Host memory gauges `TotalMemory` and `FreeMemory`, in bytes.
pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            anyhow::bail!("host memory statistics unavailable");
        }
        Ok(vec![
            Metric::gauge("TotalMemory", total as f64),
            Metric::gauge("FreeMemory", self.system.free_memory() as f64),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_total_and_free() {
        let metrics = MemoryCollector::new().collect().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].id, "TotalMemory");
        assert_eq!(metrics[1].id, "FreeMemory");

        let total = metrics[0].float_value().unwrap();
        let free = metrics[1].float_value().unwrap();
        assert!(total > 0.0);
        assert!(free <= total);
    }
}
