use crate::Collector;
use anyhow::Result;
use metrik_common::Metric;
use sysinfo::System;

/// Per-core utilization as gauges `CPUutilization1..=N`.
///
/// Usage is measured between two refreshes, so the first sample after
/// construction covers the time since `new`.
pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        self.system.refresh_cpu_all();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            anyhow::bail!("no CPUs reported by the host");
        }
        Ok(cpus
            .iter()
            .enumerate()
            .map(|(i, cpu)| {
                Metric::gauge(format!("CPUutilization{}", i + 1), cpu.cpu_usage() as f64)
            })
            .collect())
    }
}
