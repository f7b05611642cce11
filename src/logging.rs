//! Logging and tracing setup.
//!
//! The engine only emits `tracing` events; hosts that want them printed call
//! one of the initializers below once at startup. Filtering follows
//! `RUST_LOG` and defaults to `info`.

use std::sync::Once;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber with human-readable output.
///
/// Subsequent calls, and calls after another subscriber was installed,
/// are ignored.
pub fn init_tracing() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true);

        if tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .try_init()
            .is_ok()
        {
            info!("memview tracing initialized");
        }
    });
}

/// Initialize tracing with JSON output, one object per event.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_names(true)
            .with_current_span(true);

        if tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .try_init()
            .is_ok()
        {
            info!("memview tracing initialized (JSON mode)");
        }
    });
}

/// Macro for creating spans around engine operations
#[macro_export]
macro_rules! span_trace {
    ($name:expr) => {
        tracing::debug_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::debug_span!($name, $($field)*)
    };
}

/// Macro for logging and returning errors
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::warn!(error = %e, "Operation failed");
        e
    }};
    ($err:expr, $msg:expr) => {{
        let e = $err;
        tracing::warn!(error = %e, context = $msg, "Operation failed");
        e
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_once() {
        init_tracing();
        init_tracing();
        init_tracing_json();
    }

    #[test]
    fn test_structured_logging() {
        init_tracing();
        let base = 0x1000u64;
        debug!(base = format_args!("{:#x}", base), rows = 16, "Opened range");
    }

    #[test]
    fn test_span_and_error_macros() {
        init_tracing();
        let span = span_trace!("open_range", pointer = 0x1000u64);
        let _guard = span.enter();
        let err = crate::log_error!(crate::error::MemViewError::InvalidPointer(0), "jump");
        assert!(matches!(err, crate::error::MemViewError::InvalidPointer(0)));
    }
}
