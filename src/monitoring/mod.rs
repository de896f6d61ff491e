/*!
 * Monitoring
 * Structured tracing for the pager
 */

pub mod tracer;

pub use tracer::{generate_trace_id, init_tracing, RequestSpan};
