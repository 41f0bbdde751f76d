use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

pub static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sitehook_operations_total",
        "Adapter operations by outcome",
        &["plugin", "operation", "result"]
    )
    .expect("register sitehook_operations_total")
});

pub static MOUNT_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sitehook_mount_attempts_total",
        "Popover mount attempts by outcome",
        &["result"]
    )
    .expect("register sitehook_mount_attempts_total")
});

pub fn record_operation(plugin: &str, operation: &str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    OPERATIONS_TOTAL
        .with_label_values(&[plugin, operation, result])
        .inc();
}

/// `result` is one of `mounted`, `already_present`, `retry`, `abandoned`.
pub fn record_mount(result: &str) {
    MOUNT_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    use prometheus::Encoder;

    Lazy::force(&OPERATIONS_TOTAL);
    Lazy::force(&MOUNT_ATTEMPTS_TOTAL);
    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
