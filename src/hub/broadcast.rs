//! Best-effort event fan-out
//!
//! Each event is serialized once and offered to every target with a
//! non-blocking send. Closed or saturated connections are skipped for that
//! delivery only; removing them from a scope is the job of their own close
//! notification, not of the broadcaster.

use bytes::Bytes;
use serde::Serialize;

use super::connection::{Connection, SendFailure};
use super::event::encode;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Targets that accepted the frame
    pub delivered: usize,
    /// Targets that were closed or full
    pub skipped: usize,
}

/// Offer a pre-encoded frame to every target
pub fn broadcast_frame<'a, I>(frame: &Bytes, targets: I) -> DeliveryReport
where
    I: IntoIterator<Item = &'a Connection>,
{
    let mut report = DeliveryReport::default();

    for conn in targets {
        match conn.try_send(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                report.skipped += 1;
                let reason = match failure {
                    SendFailure::Closed => "closed",
                    SendFailure::Full => "full",
                };
                tracing::debug!(connection_id = %conn.id(), reason = reason, "Delivery skipped");
            }
        }
    }

    report
}

/// Serialize `event` and offer it to every target
///
/// A serialization failure is logged and delivers nothing.
pub fn broadcast<'a, T, I>(event: &T, targets: I) -> DeliveryReport
where
    T: Serialize,
    I: IntoIterator<Item = &'a Connection>,
{
    match encode(event) {
        Ok(frame) => broadcast_frame(&frame, targets),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize event");
            DeliveryReport::default()
        }
    }
}
