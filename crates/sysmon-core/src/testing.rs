//! Deterministic metric source for tests.

use crate::source::{
    MetricSource, NetCounters, Partition, PartitionUsage, SwapMemory, VirtualMemory,
};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn injected(what: &str) -> Error {
    Error::parse("/fake", format!("injected {} failure", what))
}

/// Source returning fixed readings, with switchable failures.
pub(crate) struct FakeSource {
    cpu_percent: f64,
    cpu_max_mhz: f64,
    memory: VirtualMemory,
    swap: SwapMemory,
    partitions: Vec<(Partition, Option<PartitionUsage>)>,
    net_step: NetCounters,
    net_calls: AtomicU64,
    fail_cpu: AtomicBool,
    fail_cpu_frequency: AtomicBool,
    fail_memory: AtomicBool,
    fail_swap: AtomicBool,
    fail_partitions: AtomicBool,
    fail_net: AtomicBool,
    hold_cpu: AtomicBool,
    panic_memory: AtomicBool,
    cpu_calls: AtomicUsize,
    usage_queries: Mutex<HashMap<String, usize>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self {
            cpu_percent: 0.0,
            cpu_max_mhz: 0.0,
            memory: VirtualMemory::default(),
            swap: SwapMemory::default(),
            partitions: Vec::new(),
            net_step: NetCounters::default(),
            net_calls: AtomicU64::new(0),
            fail_cpu: AtomicBool::new(false),
            fail_cpu_frequency: AtomicBool::new(false),
            fail_memory: AtomicBool::new(false),
            fail_swap: AtomicBool::new(false),
            fail_partitions: AtomicBool::new(false),
            fail_net: AtomicBool::new(false),
            hold_cpu: AtomicBool::new(false),
            panic_memory: AtomicBool::new(false),
            cpu_calls: AtomicUsize::new(0),
            usage_queries: Mutex::new(HashMap::new()),
        }
    }

    /// A source where every family reports non-zero values.
    pub(crate) fn healthy() -> Self {
        Self::new()
            .with_cpu(25.0, 3000.0)
            .with_memory(16 << 30, 4 << 30)
            .with_swap(2 << 30, 1 << 30)
            .with_partition(
                Partition::new("/dev/sda1", "/", "ext4"),
                Some(PartitionUsage {
                    total: 100 << 30,
                    used: 40 << 30,
                }),
            )
            .with_net_step(1024, 4096)
    }

    pub(crate) fn with_cpu(mut self, percent: f64, max_mhz: f64) -> Self {
        self.cpu_percent = percent;
        self.cpu_max_mhz = max_mhz;
        self
    }

    pub(crate) fn with_memory(mut self, total: u64, available: u64) -> Self {
        self.memory = VirtualMemory { total, available };
        self
    }

    pub(crate) fn with_swap(mut self, total: u64, free: u64) -> Self {
        self.swap = SwapMemory { total, free };
        self
    }

    /// Adds a mount; `None` usage makes its statvfs query fail.
    pub(crate) fn with_partition(
        mut self,
        partition: Partition,
        usage: Option<PartitionUsage>,
    ) -> Self {
        self.partitions.push((partition, usage));
        self
    }

    /// Counters grow by this many bytes on every read.
    pub(crate) fn with_net_step(mut self, sent: u64, recv: u64) -> Self {
        self.net_step = NetCounters {
            bytes_sent: sent,
            bytes_recv: recv,
        };
        self
    }

    pub(crate) fn fail_cpu(&self, fail: bool) {
        self.fail_cpu.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_cpu_frequency(&self, fail: bool) {
        self.fail_cpu_frequency.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_memory(&self, fail: bool) {
        self.fail_memory.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_swap(&self, fail: bool) {
        self.fail_swap.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_partitions(&self, fail: bool) {
        self.fail_partitions.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_net(&self, fail: bool) {
        self.fail_net.store(fail, Ordering::SeqCst);
    }

    /// While held, `cpu_percent` blocks.
    pub(crate) fn hold_cpu(&self, hold: bool) {
        self.hold_cpu.store(hold, Ordering::SeqCst);
    }

    /// While set, `virtual_memory` panics.
    pub(crate) fn panic_memory(&self, panic: bool) {
        self.panic_memory.store(panic, Ordering::SeqCst);
    }

    pub(crate) fn net_calls(&self) -> u64 {
        self.net_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn cpu_calls(&self) -> usize {
        self.cpu_calls.load(Ordering::SeqCst)
    }

    /// Number of usage queries issued for a mount point.
    pub(crate) fn usage_queries(&self, mount_point: &str) -> usize {
        self.usage_queries
            .lock()
            .unwrap()
            .get(mount_point)
            .copied()
            .unwrap_or(0)
    }
}

impl MetricSource for FakeSource {
    fn cpu_percent(&self, window: Duration) -> Result<f64> {
        self.cpu_calls.fetch_add(1, Ordering::SeqCst);
        while self.hold_cpu.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(5));
        }
        std::thread::sleep(window);
        if self.fail_cpu.load(Ordering::SeqCst) {
            return Err(injected("cpu"));
        }
        Ok(self.cpu_percent)
    }

    fn cpu_max_frequency(&self) -> Result<f64> {
        if self.fail_cpu_frequency.load(Ordering::SeqCst) {
            return Err(injected("cpu frequency"));
        }
        Ok(self.cpu_max_mhz)
    }

    fn virtual_memory(&self) -> Result<VirtualMemory> {
        if self.panic_memory.load(Ordering::SeqCst) {
            panic!("injected memory panic");
        }
        if self.fail_memory.load(Ordering::SeqCst) {
            return Err(injected("memory"));
        }
        Ok(self.memory)
    }

    fn swap_memory(&self) -> Result<SwapMemory> {
        if self.fail_swap.load(Ordering::SeqCst) {
            return Err(injected("swap"));
        }
        Ok(self.swap)
    }

    fn partitions(&self) -> Result<Vec<Partition>> {
        if self.fail_partitions.load(Ordering::SeqCst) {
            return Err(injected("partitions"));
        }
        Ok(self.partitions.iter().map(|(p, _)| p.clone()).collect())
    }

    fn partition_usage(&self, partition: &Partition) -> Result<PartitionUsage> {
        *self
            .usage_queries
            .lock()
            .unwrap()
            .entry(partition.mount_point.clone())
            .or_insert(0) += 1;
        self.partitions
            .iter()
            .find(|(p, _)| p.mount_point == partition.mount_point)
            .and_then(|(_, usage)| *usage)
            .ok_or_else(|| Error::Statvfs {
                mount_point: partition.mount_point.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }

    fn net_counters(&self) -> Result<NetCounters> {
        if self.fail_net.load(Ordering::SeqCst) {
            return Err(injected("network"));
        }
        let calls = self.net_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(NetCounters {
            bytes_sent: self.net_step.bytes_sent * calls,
            bytes_recv: self.net_step.bytes_recv * calls,
        })
    }
}
