//! vendstock-observability — process-wide tracing setup.
//!
//! Library crates emit events through `tracing` and never install a
//! subscriber themselves; whatever hosts the stock system calls [`init`]
//! once at startup.

/// Initialize process-wide tracing/logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;
