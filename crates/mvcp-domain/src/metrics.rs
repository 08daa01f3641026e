use prometheus::{CounterVec, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Per-status spawn counts, a point-in-time active-vm gauge, spawn latency,
/// and the policy engine's running evaluation/violation counters. Shared by
/// value across the lifecycle service, the policy engine, and the API layer
/// so every subsystem records into the same registry that `/metrics` renders.
pub struct Metrics {
    registry: Registry,
    spawn_total: CounterVec,
    active_count: Gauge,
    spawn_duration_seconds: Histogram,
    policy_evaluations: IntCounter,
    policy_violations: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let spawn_total = CounterVec::new(
            Opts::new("spawn_total", "Total VM spawn attempts by terminal status"),
            &["status"],
        )
        .expect("static metric opts are valid");
        let active_count =
            Gauge::new("active_count", "Number of microVMs currently running").expect("static metric opts are valid");
        let spawn_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "spawn_duration_seconds",
            "Time spent bringing a microVM from Pending to Running",
        ))
        .expect("static metric opts are valid");
        let policy_evaluations = IntCounter::new("policy_evaluations", "Total policy engine evaluations")
            .expect("static metric opts are valid");
        let policy_violations = IntCounter::new("policy_violations", "Total hard-constraint violations observed")
            .expect("static metric opts are valid");

        registry.register(Box::new(spawn_total.clone())).expect("metric name is unique");
        registry.register(Box::new(active_count.clone())).expect("metric name is unique");
        registry.register(Box::new(spawn_duration_seconds.clone())).expect("metric name is unique");
        registry.register(Box::new(policy_evaluations.clone())).expect("metric name is unique");
        registry.register(Box::new(policy_violations.clone())).expect("metric name is unique");

        Self { registry, spawn_total, active_count, spawn_duration_seconds, policy_evaluations, policy_violations }
    }

    pub fn record_spawn(&self, status: &str, duration_seconds: f64) {
        self.spawn_total.with_label_values(&[status]).inc();
        self.spawn_duration_seconds.observe(duration_seconds);
    }

    pub fn set_active_count(&self, count: i64) {
        self.active_count.set(count as f64);
    }

    pub fn record_policy_evaluation(&self) {
        self.policy_evaluations.inc();
    }

    pub fn record_policy_violation(&self) {
        self.policy_violations.inc();
    }

    /// Render the current values in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus text output is valid utf-8"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
