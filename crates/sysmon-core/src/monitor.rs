//! Sampling engine.
//!
//! One task per metric family, each on its own timer. A task runs its
//! collector on the blocking pool, then copies the record into the shared
//! snapshot. Tasks never wait on each other, and the snapshot lock is never
//! held during a source query.

use crate::metrics::{
    Collector, CpuCollector, DiskCollector, MemoryCollector, NetworkCollector, NetworkMetrics,
};
use crate::snapshot::{SharedSnapshot, SystemSnapshot};
use crate::source::{MetricSource, ProcfsSource};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Sampling period of every family.
pub const SAMPLE_PERIOD: Duration = Duration::from_secs(1);

struct Running {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Periodic sampling engine.
pub struct Monitor {
    source: Arc<dyn MetricSource>,
    snapshot: Arc<SharedSnapshot>,
    period: Duration,
    cpu_window: Option<Duration>,
    running: Mutex<Option<Running>>,
    stopping: Mutex<Vec<JoinHandle<()>>>,
}

impl Monitor {
    /// Creates a monitor reading the local host through procfs.
    pub fn new(snapshot: Arc<SharedSnapshot>) -> Self {
        Self::with_source(Arc::new(ProcfsSource::new()), snapshot)
    }

    /// Creates a monitor reading from `source` and publishing into `snapshot`.
    pub fn with_source(source: Arc<dyn MetricSource>, snapshot: Arc<SharedSnapshot>) -> Self {
        Self {
            source,
            snapshot,
            period: SAMPLE_PERIOD,
            cpu_window: None,
            running: Mutex::new(None),
            stopping: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_timing(mut self, period: Duration, cpu_window: Duration) -> Self {
        self.period = period;
        self.cpu_window = Some(cpu_window);
        self
    }

    /// Launches one sampling task per metric family.
    ///
    /// The snapshot is reset to zero records first. Calling `start` on a
    /// running monitor does nothing.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            warn!("Monitor already running, ignoring start");
            return;
        }

        self.stopping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|task| !task.is_finished());

        self.snapshot.reset();
        let (shutdown, done) = watch::channel(false);

        let cpu_source = self.source.clone();
        let cpu_window = self.cpu_window;
        let memory_source = self.source.clone();
        let disk_source = self.source.clone();
        let network_source = self.source.clone();

        let tasks = vec![
            self.spawn_family(
                move || match cpu_window {
                    Some(window) => CpuCollector::with_window(cpu_source.clone(), window),
                    None => CpuCollector::new(cpu_source.clone()),
                },
                done.clone(),
                |snapshot: &mut SystemSnapshot, metrics| snapshot.cpu = metrics,
            ),
            self.spawn_family(
                move || MemoryCollector::new(memory_source.clone()),
                done.clone(),
                |snapshot: &mut SystemSnapshot, metrics| snapshot.memory = metrics,
            ),
            self.spawn_family(
                move || DiskCollector::new(disk_source.clone()),
                done.clone(),
                |snapshot: &mut SystemSnapshot, metrics| snapshot.disk = metrics,
            ),
            self.spawn_family(
                move || NetworkCollector::new(network_source.clone()),
                done,
                |snapshot: &mut SystemSnapshot, metrics: Option<NetworkMetrics>| {
                    if let Some(metrics) = metrics {
                        snapshot.record_network(metrics);
                    }
                },
            ),
        ];

        info!("Monitor started with {} collectors", tasks.len());
        *running = Some(Running { shutdown, tasks });
    }

    /// Signals every task to finish after its current iteration.
    ///
    /// In-flight source queries are not interrupted, but their results are
    /// dropped. Safe to call when the monitor is not running, and more than
    /// once.
    pub fn stop(&self) {
        let Some(running) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            debug!("Monitor not running, ignoring stop");
            return;
        };

        // Receivers also observe the sender being dropped
        let _ = running.shutdown.send(true);
        self.stopping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(running.tasks);
        info!("Monitor stopping");
    }

    /// Stops the monitor and waits for every task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let tasks: Vec<_> = self
            .stopping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Collector task ended abnormally: {}", e);
            }
        }
        info!("Monitor stopped");
    }

    /// Returns `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns a copy of the current snapshot.
    pub fn get_snapshot(&self) -> SystemSnapshot {
        self.snapshot.get()
    }

    fn spawn_family<C, M, P>(
        &self,
        make: M,
        done: watch::Receiver<bool>,
        publish: P,
    ) -> JoinHandle<()>
    where
        C: Collector,
        M: Fn() -> C + Send + 'static,
        P: Fn(&mut SystemSnapshot, C::Sample) + Send + 'static,
    {
        let snapshot = Arc::clone(&self.snapshot);
        let stopped = done.clone();
        tokio::spawn(run_collector(make, self.period, done, move |sample| {
            snapshot.update(|s| {
                // Checked under the write lock: after stop() a new run may
                // already have reset the snapshot.
                if !*stopped.borrow() {
                    publish(s, sample);
                }
            })
        }))
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Samples immediately, then on every tick, until `done` fires.
///
/// A collector that panics is rebuilt with `make` and retried on the next
/// tick.
async fn run_collector<C, M, P>(
    make: M,
    period: Duration,
    mut done: watch::Receiver<bool>,
    publish: P,
) where
    C: Collector,
    M: Fn() -> C + Send + 'static,
    P: Fn(C::Sample) + Send + 'static,
{
    let mut collector = make();
    let name = collector.name().to_string();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("{} collector started", name);

    loop {
        tokio::select! {
            biased;
            _ = done.changed() => break,
            _ = ticker.tick() => {}
        }
        if *done.borrow() {
            break;
        }

        let result = tokio::task::spawn_blocking(move || {
            let sample = collector.collect();
            (collector, sample)
        })
        .await;

        let sample = match result {
            Ok((returned, sample)) => {
                collector = returned;
                sample
            }
            Err(e) => {
                error!("{} collector panicked, rebuilding: {}", name, e);
                collector = make();
                continue;
            }
        };

        publish(sample);
    }

    debug!("{} collector stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CpuMetrics, DiskMetrics, MemoryMetrics};
    use crate::testing::FakeSource;
    use std::time::Instant;

    const PERIOD: Duration = Duration::from_millis(50);
    const WINDOW: Duration = Duration::from_millis(5);

    fn monitor(source: Arc<FakeSource>) -> Monitor {
        Monitor::with_source(source, Arc::new(SharedSnapshot::new(8))).with_timing(PERIOD, WINDOW)
    }

    fn all_families_sampled(snapshot: &SystemSnapshot) -> bool {
        snapshot.cpu != CpuMetrics::default()
            && snapshot.memory != MemoryMetrics::default()
            && snapshot.disk != DiskMetrics::default()
            && snapshot.network != NetworkMetrics::default()
    }

    async fn wait_for<F>(monitor: &Monitor, timeout: Duration, predicate: F) -> SystemSnapshot
    where
        F: Fn(&SystemSnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let snapshot = monitor.get_snapshot();
            if predicate(&snapshot) || Instant::now() >= deadline {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_every_family_sampled_within_one_period() {
        let monitor = Monitor::with_source(
            Arc::new(FakeSource::healthy()),
            Arc::new(SharedSnapshot::default()),
        )
        .with_timing(SAMPLE_PERIOD, WINDOW);
        monitor.start();

        // Network publishes on its second read, one period after start
        let snapshot = wait_for(&monitor, SAMPLE_PERIOD * 3 / 2, all_families_sampled).await;
        assert!(all_families_sampled(&snapshot), "{:?}", snapshot);

        assert_eq!(snapshot.cpu.usage_percent, 25.0);
        assert_eq!(snapshot.cpu.frequency_mhz, 750.0);
        assert_eq!(snapshot.memory.usage_percent, 75.0);
        assert_eq!(snapshot.memory.swap_used_percent, 50.0);
        assert_eq!(snapshot.disk.usage_percent, 40.0);
        // 4096 bytes per read over roughly one second
        assert!(
            (2048.0..=8192.0).contains(&snapshot.network.download_rate),
            "{:?}",
            snapshot.network
        );
        assert_eq!(snapshot.network_history.upload.len(), 1);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_first_network_rate_covers_a_full_period() {
        let source = Arc::new(FakeSource::healthy());
        let monitor = monitor(source.clone());
        monitor.start();

        tokio::time::sleep(PERIOD / 5).await;
        let snapshot = monitor.get_snapshot();
        assert!(source.net_calls() >= 1);
        assert_eq!(snapshot.network, NetworkMetrics::default());
        assert!(snapshot.network_history.download.is_empty());

        let snapshot = wait_for(&monitor, Duration::from_secs(2), |s| {
            s.network != NetworkMetrics::default()
        })
        .await;
        // 4096 bytes per read; a rate above this means less than half a
        // period was measured
        let ceiling = 4096.0 / (PERIOD.as_secs_f64() / 2.0);
        assert!(
            snapshot.network.download_rate <= ceiling,
            "{:?}",
            snapshot.network
        );
        assert!(snapshot.network_history.download.max() <= ceiling);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_percentages_stay_in_range() {
        let source = Arc::new(FakeSource::healthy().with_cpu(250.0, 1000.0));
        let monitor = monitor(source);
        monitor.start();

        for _ in 0..5 {
            let s = monitor.get_snapshot();
            for p in [
                s.cpu.usage_percent,
                s.memory.usage_percent,
                s.memory.swap_used_percent,
                s.disk.usage_percent,
            ] {
                assert!((0.0..=100.0).contains(&p), "{} out of range", p);
            }
            assert!(s.network.upload_rate >= 0.0);
            tokio::time::sleep(PERIOD).await;
        }

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let monitor = monitor(Arc::new(FakeSource::healthy()));
        monitor.stop();
        monitor.start();
        assert!(monitor.is_running());

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());

        tokio::time::timeout(Duration::from_secs(2), monitor.shutdown())
            .await
            .expect("shutdown hung");
        monitor.stop();
    }

    #[tokio::test]
    async fn test_double_start_is_ignored() {
        let source = Arc::new(FakeSource::healthy());
        let monitor = monitor(source);
        monitor.start();
        monitor.start();
        let tasks = monitor.running.lock().unwrap().as_ref().unwrap().tasks.len();
        assert_eq!(tasks, 4);
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_snapshot_not_blocked_by_inflight_query() {
        let source = Arc::new(FakeSource::healthy());
        source.hold_cpu(true);
        let monitor = monitor(source.clone());
        monitor.start();

        let snapshot = wait_for(&monitor, Duration::from_secs(2), |s| {
            s.memory != MemoryMetrics::default()
        })
        .await;
        assert!(source.cpu_calls() >= 1);
        assert_ne!(snapshot.memory, MemoryMetrics::default());

        let started = Instant::now();
        let snapshot = monitor.get_snapshot();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(snapshot.cpu, CpuMetrics::default());

        source.hold_cpu(false);
        let snapshot = wait_for(&monitor, Duration::from_secs(2), |s| {
            s.cpu != CpuMetrics::default()
        })
        .await;
        assert_eq!(snapshot.cpu.usage_percent, 25.0);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_failures_publish_zero_and_recover() {
        let source = Arc::new(FakeSource::healthy());
        source.fail_cpu(true);
        source.fail_partitions(true);
        let monitor = monitor(source.clone());
        monitor.start();

        wait_for(&monitor, Duration::from_secs(2), |s| {
            s.memory != MemoryMetrics::default()
        })
        .await;
        tokio::time::sleep(PERIOD * 2).await;
        let snapshot = monitor.get_snapshot();
        assert_eq!(snapshot.cpu, CpuMetrics::default());
        assert_eq!(snapshot.disk, DiskMetrics::default());
        assert!(monitor.is_running());

        source.fail_cpu(false);
        source.fail_partitions(false);
        let snapshot = wait_for(&monitor, Duration::from_secs(2), |s| {
            s.cpu != CpuMetrics::default() && s.disk != DiskMetrics::default()
        })
        .await;
        assert_eq!(snapshot.cpu.usage_percent, 25.0);
        assert_eq!(snapshot.disk.usage_percent, 40.0);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_resets_snapshot() {
        let source = Arc::new(FakeSource::healthy());
        let monitor = monitor(source.clone());
        monitor.start();
        wait_for(&monitor, Duration::from_secs(2), all_families_sampled).await;
        monitor.shutdown().await;

        source.hold_cpu(true);
        monitor.start();
        assert_eq!(monitor.get_snapshot().cpu, CpuMetrics::default());
        source.hold_cpu(false);
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_stopped_run_does_not_publish_into_restart() {
        let source = Arc::new(FakeSource::healthy());
        let monitor = Monitor::with_source(source.clone(), Arc::new(SharedSnapshot::new(8)))
            .with_timing(PERIOD, Duration::from_millis(100));

        source.hold_cpu(true);
        monitor.start();
        wait_for(&monitor, Duration::from_secs(2), |_| source.cpu_calls() >= 1).await;
        monitor.stop();

        // Let the old query leave the hold and run its window, then block
        // the new run's query
        source.hold_cpu(false);
        tokio::time::sleep(Duration::from_millis(20)).await;
        source.hold_cpu(true);
        monitor.start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(source.cpu_calls() >= 2);
        assert_eq!(monitor.get_snapshot().cpu, CpuMetrics::default());

        source.hold_cpu(false);
        let snapshot = wait_for(&monitor, Duration::from_secs(2), |s| {
            s.cpu != CpuMetrics::default()
        })
        .await;
        assert_eq!(snapshot.cpu.usage_percent, 25.0);
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_finished_tasks_are_released_on_start() {
        let monitor = monitor(Arc::new(FakeSource::healthy()));
        for _ in 0..3 {
            monitor.start();
            monitor.stop();
            tokio::time::sleep(PERIOD * 2).await;
        }
        monitor.start();
        assert!(monitor.stopping.lock().unwrap().is_empty());
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_collector_is_rebuilt() {
        let source = Arc::new(FakeSource::healthy());
        source.panic_memory(true);
        let monitor = monitor(source.clone());
        monitor.start();

        wait_for(&monitor, Duration::from_secs(2), |s| {
            s.cpu != CpuMetrics::default()
        })
        .await;
        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(monitor.get_snapshot().memory, MemoryMetrics::default());
        assert!(monitor.is_running());

        source.panic_memory(false);
        let snapshot = wait_for(&monitor, Duration::from_secs(2), |s| {
            s.memory != MemoryMetrics::default()
        })
        .await;
        assert_eq!(snapshot.memory.usage_percent, 75.0);

        monitor.shutdown().await;
    }
}
