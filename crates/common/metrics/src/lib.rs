use prometheus_exporter::prometheus::{
    HistogramTimer, HistogramVec, IntCounterVec, IntGaugeVec, default_registry,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry,
};

// Provisioning each metrics
lazy_static::lazy_static! {
    pub static ref BATCH_FORK_CHOICE_ATTESTATIONS_TIME: HistogramVec = create_histogram_vec(
        "beacon_batch_fork_choice_attestations_seconds",
        "Duration of one fork choice attestation batch, per sub-slot interval",
        &["interval"]
    );

    pub static ref FORK_CHOICE_ATTESTATIONS: IntCounterVec = create_int_counter_vec(
        "beacon_fork_choice_attestations_total",
        "Attestations handled while preparing fork choice, by outcome",
        &["outcome"]
    );

    pub static ref SEEN_CACHE_ENTRIES: IntGaugeVec = create_int_gauge_vec(
        "beacon_fork_choice_seen_cache_entries",
        "Number of attestation data roots tracked by the seen cache",
        &[]
    );
}

/// Create a new gauge metric
pub fn create_int_gauge_vec(name: &str, help: &str, label_names: &[&str]) -> IntGaugeVec {
    let registry = default_registry();
    register_int_gauge_vec_with_registry!(name, help, label_names, registry)
        .expect("failed to create int gauge vec")
}

/// Set the value of a gauge metric
pub fn set_int_gauge_vec(gauge_vec: &IntGaugeVec, value: i64, label_values: &[&str]) {
    gauge_vec.with_label_values(label_values).set(value);
}

/// Create a new counter metric
pub fn create_int_counter_vec(name: &str, help: &str, label_names: &[&str]) -> IntCounterVec {
    let registry = default_registry();
    register_int_counter_vec_with_registry!(name, help, label_names, registry)
        .expect("failed to create int counter vec")
}

/// Increase a counter metric by `value`
pub fn inc_int_counter_vec(counter_vec: &IntCounterVec, value: u64, label_values: &[&str]) {
    counter_vec.with_label_values(label_values).inc_by(value);
}

/// Create a new histogram metric
pub fn create_histogram_vec(name: &str, help: &str, label_names: &[&str]) -> HistogramVec {
    let registry = default_registry();
    register_histogram_vec_with_registry!(name, help, label_names, registry)
        .expect("failed to create histogram")
}

/// Start a timer for a histogram metric
pub fn start_timer_vec(histogram_vec: &HistogramVec, label_values: &[&str]) -> HistogramTimer {
    histogram_vec.with_label_values(label_values).start_timer()
}

/// Stop a timer for a histogram metric
pub fn stop_timer(timer: HistogramTimer) {
    timer.observe_duration()
}
