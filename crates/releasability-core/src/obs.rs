//! Structured lifecycle events for a releasability check run.
//!
//! Every event carries the run's `correlation_id`. Events are emitted at
//! `info!` (discarded replies at `debug!`, timeouts at `warn!`).

use std::time::Duration;

use tracing::{debug, info, warn};

/// Span scoping all logs of a check run to its correlation id.
///
/// Attach with `tracing::Instrument::instrument` so it follows the future
/// across await points.
pub fn run_span(correlation_id: &str) -> tracing::Span {
    tracing::info_span!("releasability.run", correlation_id = %correlation_id)
}

pub fn emit_started(correlation_id: &str, release: &str) {
    info!(event = "releasability.started", correlation_id = %correlation_id, release = %release);
}

pub fn emit_triggered(correlation_id: &str, message_id: &str) {
    info!(
        event = "releasability.triggered",
        correlation_id = %correlation_id,
        message_id = %message_id,
    );
}

pub fn emit_directory(expected: usize, handlers: usize, budget: Duration) {
    info!(
        event = "releasability.directory",
        expected = expected,
        handlers = handlers,
        budget_secs = budget.as_secs(),
    );
}

pub fn emit_reply_received(correlation_id: &str, check_name: &str, state: &str, received: usize) {
    info!(
        event = "releasability.reply_received",
        correlation_id = %correlation_id,
        check = %check_name,
        state = %state,
        received = received,
    );
}

/// Dropped reply: foreign run, acknowledgement, or undecodable body.
pub fn emit_reply_discarded(message_id: &str, reason: &str) {
    debug!(event = "releasability.reply_discarded", message_id = %message_id, reason = %reason);
}

pub fn emit_finished(correlation_id: &str, received: usize, passed: bool) {
    info!(
        event = "releasability.finished",
        correlation_id = %correlation_id,
        received = received,
        passed = passed,
    );
}

pub fn emit_timed_out(correlation_id: &str, received: usize, expected: usize) {
    warn!(
        event = "releasability.timed_out",
        correlation_id = %correlation_id,
        received = received,
        expected = expected,
    );
}
