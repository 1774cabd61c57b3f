//! Insights - Observability for ringview.
//!
//! Spans around benchmark runs, plus an optional Tracy profiler layer.
//!
//! # Usage
//!
//! ## Console output
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Tracy profiler (real-time visualization)
//! ```toml
//! ringview = { version = "0.1", features = ["tracy"] }
//! ```
//! ```rust,ignore
//! ringview::init_tracy()?;
//! ```
//! Then run Tracy profiler: https://github.com/wolfpld/tracy

use tracing::Span;

/// Initialize Tracy profiler (call once at startup)
#[cfg(feature = "tracy")]
pub fn init_tracy() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    use tracing_subscriber::layer::SubscriberExt;
    tracing::subscriber::set_global_default(
        tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default())
    )
}

#[cfg(not(feature = "tracy"))]
pub fn init_tracy() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    Ok(())
}

/// Span covering one timed strategy run
#[inline]
pub fn run_span(strategy: &'static str, events: u64) -> Span {
    tracing::info_span!("run", strategy, events)
}

/// Span covering one round of `run_rounds`
#[inline]
pub fn round_span(strategy: &'static str, round: u32) -> Span {
    tracing::debug_span!("round", strategy, round)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_compile() {
        // No subscriber installed; spans are disabled but must still enter cleanly.
        let _run = run_span("copy", 100).entered();
        let _round = round_span("view", 3).entered();
    }
}
