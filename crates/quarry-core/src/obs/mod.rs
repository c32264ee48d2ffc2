//! Observability: query trace events and the sink boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect
//! assembly or execution semantics.

mod trace;


// re-exports
pub use trace::{QueryTraceEvent, QueryTraceSink, RecordingSink};
