/*!
 * Tracing
 * Subscriber setup and per-request spans
 *
 * RUST_LOG selects the level (default: info). JSON output is chosen by
 * `PagerConfig::trace_json`, which PAGER_TRACE_JSON sets.
 */

use crate::core::types::TaskId;
use crate::ipc::IpcTag;
use std::time::Instant;
use tracing::{debug, info, span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Install the global subscriber
///
/// `log` records from the pager modules are forwarded through the
/// `tracing-log` bridge. Calling this twice is harmless; the second
/// installation is ignored.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json, "Pager tracing initialized");
    }
}

/// Unique id correlating the log lines of one request
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one inbound request
pub struct RequestSpan {
    span: Span,
    start: Instant,
    trace_id: String,
}

impl RequestSpan {
    pub fn new(tag: IpcTag, sender: TaskId) -> Self {
        let trace_id = generate_trace_id();
        let span = span!(
            Level::DEBUG,
            "pager_request",
            trace_id = %trace_id,
            tag = ?tag,
            sender = sender,
            status = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record the reply status and elapsed time
    pub fn finish(self, status: i64) {
        let elapsed = self.start.elapsed().as_micros() as u64;
        self.span.record("status", status);
        self.span.record("duration_us", elapsed);
        let _entered = self.span.enter();
        debug!(status, duration_us = elapsed, "request complete");
    }
}
