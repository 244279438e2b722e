//! Structured log helpers.
//!
//! Every pipeline log line carries the device context (`dev_eui`, `token_id`,
//! `public_key`) through a span, so the JSON layer emits it without each call
//! site repeating the fields.

/// Open the per-message span that carries device context.
///
/// `token_id` and `public_key` start empty and are recorded once the device
/// has been resolved.
pub fn uplink_span(dev_eui: &str) -> tracing::Span {
    tracing::info_span!(
        "uplink",
        dev_eui = %dev_eui,
        token_id = tracing::field::Empty,
        public_key = tracing::field::Empty,
    )
}

/// Record the resolved device identity on the current uplink span.
pub fn record_device(span: &tracing::Span, token_id: u64, public_key: &str) {
    span.record("token_id", token_id);
    span.record("public_key", public_key);
}

/// Helper to create structured log entries with a subsystem field.
#[macro_export]
macro_rules! log_event {
    (info, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
    (warn, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
    (error, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
    (debug, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uplink_span_records_without_subscriber() {
        let span = uplink_span("0102030405060708");
        record_device(&span, 7, "0xabc");
        let _entered = span.enter();
        log_event!(info, "uplink", "recorded", nonce = 3);
    }
}
