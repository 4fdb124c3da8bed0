use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Device views returned by the HTTP API.
pub mod devices;
/// Health check payloads.
pub mod health;
pub mod validation;
/// WebSocket message definitions.
pub mod ws;

fn format_epoch_millis(millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
