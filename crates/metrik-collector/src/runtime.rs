use crate::alloc::{self, AllocStats};
use crate::Collector;
use anyhow::Result;
use metrik_common::Metric;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Names of the process-runtime gauges, in report order.
pub const RUNTIME_GAUGES: [&str; 27] = [
    "Alloc",
    "BuckHashSys",
    "Frees",
    "GCCPUFraction",
    "GCSys",
    "HeapAlloc",
    "HeapIdle",
    "HeapInuse",
    "HeapObjects",
    "HeapReleased",
    "HeapSys",
    "LastGC",
    "Lookups",
    "MCacheInuse",
    "MCacheSys",
    "MSpanInuse",
    "MSpanSys",
    "Mallocs",
    "NextGC",
    "NumForcedGC",
    "NumGC",
    "OtherSys",
    "PauseTotalNs",
    "StackInuse",
    "StackSys",
    "Sys",
    "TotalAlloc",
];

/// Resident and virtual size of the current process, in bytes.
#[derive(Debug, Clone, Copy, Default)]
struct ProcessMemory {
    resident: u64,
    virtual_size: u64,
}

/// Process-runtime gauges fed by [`alloc::CountingAllocator`] and the
/// process memory reported by the OS.
///
/// There is no garbage collector and no span/cache allocator to inspect, so
/// those gauges are always `0`.
pub struct RuntimeCollector {
    system: System,
    pid: Option<Pid>,
}

impl RuntimeCollector {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = e, "Process id unavailable, memory gauges will read 0");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }

    fn process_memory(&mut self) -> ProcessMemory {
        let Some(pid) = self.pid else {
            return ProcessMemory::default();
        };
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system
            .process(pid)
            .map(|p| ProcessMemory {
                resident: p.memory(),
                virtual_size: p.virtual_memory(),
            })
            .unwrap_or_default()
    }
}

impl Default for RuntimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn gauge_value(name: &str, heap: &AllocStats, process: &ProcessMemory) -> f64 {
    let live = heap.live_bytes();
    let value = match name {
        "Alloc" | "HeapAlloc" | "HeapInuse" => live,
        "TotalAlloc" => heap.allocated_bytes,
        "Mallocs" => heap.mallocs,
        "Frees" => heap.frees,
        "HeapObjects" => heap.live_objects(),
        "HeapSys" => process.resident,
        "HeapIdle" => process.resident.saturating_sub(live),
        "Sys" => process.virtual_size,
        _ => 0,
    };
    value as f64
}

impl Collector for RuntimeCollector {
    fn name(&self) -> &str {
        "runtime"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        let process = self.process_memory();
        let heap = alloc::stats();
        Ok(RUNTIME_GAUGES
            .iter()
            .map(|name| Metric::gauge(*name, gauge_value(name, &heap, &process)))
            .collect())
    }
}
