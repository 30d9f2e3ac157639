//! Prometheus metrics for job_server.
//!
//! Covers the three moving parts of the engine: admission (submitted and
//! rejected jobs), execution (per-status counts and latency) and scaling
//! (queue depth, active workers, controller decisions).

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Prometheus metrics registry with all engine and server metrics.
///
/// Each [`Engine`](crate::engine::Engine) owns its own registry so several
/// engines can live in one process (tests do this).
pub struct Metrics {
    registry: Registry,

    // === Admission ===
    /// Jobs offered to the queue by outcome (accepted, rejected)
    pub jobs_submitted_total: IntCounterVec,

    // === Execution ===
    /// Jobs executed by status (ok, error, panic)
    pub jobs_executed_total: IntCounterVec,

    /// Job execution duration in seconds
    pub job_duration_seconds: Histogram,

    // === Scaling ===
    /// Queue depth seen by the last controller sample
    pub queue_depth: IntGauge,

    /// Queue capacity (0 when unbounded)
    pub queue_capacity: IntGauge,

    /// Active worker threads
    pub workers_active: IntGauge,

    /// Worker slots
    pub workers_capacity: IntGauge,

    /// Controller decisions that changed the pool (grow, shrink)
    pub scaling_decisions_total: IntCounterVec,

    // === Server ===
    /// Open client connections
    pub connections_active: IntGauge,
}

impl Metrics {
    /// Create a new metrics registry with all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Job latency buckets (in seconds)
        let job_buckets = vec![
            0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
        ];

        let jobs_submitted_total = IntCounterVec::new(
            Opts::new("job_server_jobs_submitted_total", "Jobs offered to the queue"),
            &["outcome"],
        )?;
        registry.register(Box::new(jobs_submitted_total.clone()))?;

        let jobs_executed_total = IntCounterVec::new(
            Opts::new("job_server_jobs_executed_total", "Jobs executed by workers"),
            &["status"],
        )?;
        registry.register(Box::new(jobs_executed_total.clone()))?;

        let job_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "job_server_job_duration_seconds",
                "Job execution duration in seconds",
            )
            .buckets(job_buckets),
        )?;
        registry.register(Box::new(job_duration_seconds.clone()))?;

        let queue_depth = IntGauge::new("job_server_queue_depth", "Current queue depth")?;
        registry.register(Box::new(queue_depth.clone()))?;

        let queue_capacity = IntGauge::new("job_server_queue_capacity", "Queue capacity")?;
        registry.register(Box::new(queue_capacity.clone()))?;

        let workers_active =
            IntGauge::new("job_server_workers_active", "Number of active workers")?;
        registry.register(Box::new(workers_active.clone()))?;

        let workers_capacity =
            IntGauge::new("job_server_workers_capacity", "Number of worker slots")?;
        registry.register(Box::new(workers_capacity.clone()))?;

        let scaling_decisions_total = IntCounterVec::new(
            Opts::new(
                "job_server_scaling_decisions_total",
                "Controller decisions that resized the pool",
            ),
            &["direction"],
        )?;
        registry.register(Box::new(scaling_decisions_total.clone()))?;

        let connections_active =
            IntGauge::new("job_server_connections_active", "Open client connections")?;
        registry.register(Box::new(connections_active.clone()))?;

        Ok(Self {
            registry,
            jobs_submitted_total,
            jobs_executed_total,
            job_duration_seconds,
            queue_depth,
            queue_capacity,
            workers_active,
            workers_capacity,
            scaling_decisions_total,
            connections_active,
        })
    }

    /// Record a queue admission attempt.
    pub fn record_submission(&self, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        self.jobs_submitted_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a finished job.
    pub fn record_execution(&self, status: ExecutionStatus, duration_secs: f64) {
        self.jobs_executed_total
            .with_label_values(&[status.as_str()])
            .inc();
        self.job_duration_seconds.observe(duration_secs);
    }

    /// Record a pool resize made by the controller.
    pub fn record_scaling(&self, from: usize, to: usize) {
        let direction = if to > from { "grow" } else { "shrink" };
        self.scaling_decisions_total
            .with_label_values(&[direction])
            .inc();
    }

    /// Update queue metrics.
    pub fn update_queue_metrics(&self, depth: usize, capacity: Option<usize>) {
        self.queue_depth.set(depth as i64);
        self.queue_capacity.set(capacity.unwrap_or(0) as i64);
    }

    /// Update worker metrics.
    pub fn update_worker_metrics(&self, active: usize, capacity: usize) {
        self.workers_active.set(active as i64);
        self.workers_capacity.set(capacity as i64);
    }

    /// Increment active connections.
    pub fn inc_connections(&self) {
        self.connections_active.inc();
    }

    /// Decrement active connections.
    pub fn dec_connections(&self) {
        self.connections_active.dec();
    }

    /// Number of jobs executed with the given status so far.
    pub fn executed(&self, status: ExecutionStatus) -> u64 {
        self.jobs_executed_total
            .with_label_values(&[status.as_str()])
            .get()
    }

    /// Number of jobs rejected by the queue so far.
    pub fn rejected(&self) -> u64 {
        self.jobs_submitted_total
            .with_label_values(&["rejected"])
            .get()
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Outcome label for executed jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStatus {
    Ok,
    Error,
    Panic,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Ok => "ok",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Panic => "panic",
        }
    }
}
