//! Runtime diagnostics.
//!
//! - `DispatchCounters`: optional counters for `profile` runs
//! - `init_tracing`: one-shot subscriber setup driven by the environment

use std::sync::Once;

/// Performance counters for the dispatch engine.
///
/// Stored as `Option<DispatchCounters>` on the `Runtime`; when `None`, every
/// increment is skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchCounters {
    pub sends: u64,
    pub fast_path_hits: u64,
    pub hydrations: u64,
    pub method_missing: u64,
    pub raises: u64,
}

impl DispatchCounters {
    #[inline]
    pub fn count_send(&mut self) {
        self.sends = self.sends.wrapping_add(1);
    }

    #[inline]
    pub fn count_fast_path(&mut self) {
        self.fast_path_hits = self.fast_path_hits.wrapping_add(1);
    }

    #[inline]
    pub fn count_hydration(&mut self) {
        self.hydrations = self.hydrations.wrapping_add(1);
    }

    #[inline]
    pub fn count_method_missing(&mut self) {
        self.method_missing = self.method_missing.wrapping_add(1);
    }

    #[inline]
    pub fn count_raise(&mut self) {
        self.raises = self.raises.wrapping_add(1);
    }

    /// Format a summary report.
    pub fn report(&self) -> String {
        format!(
            "Dispatch profile:\n  \
             Sends:             {}\n  \
             Fast-path hits:    {}\n  \
             Hydrations:        {}\n  \
             Method missing:    {}\n  \
             Raises:            {}",
            self.sends, self.fast_path_hits, self.hydrations, self.method_missing, self.raises,
        )
    }
}

static TRACING_INIT: Once = Once::new();

/// Install a tracing subscriber, once per process.
///
/// The filter comes from `GARNET_LOG`, falling back to `RUST_LOG`. Nothing is
/// installed when neither is set. `GARNET_LOG_TREE` selects the hierarchical
/// span layout over the flat one.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match std::env::var("GARNET_LOG") {
            Ok(directives) => EnvFilter::new(directives),
            Err(_) if std::env::var("RUST_LOG").is_ok() => EnvFilter::from_default_env(),
            Err(_) => return,
        };

        let registry = tracing_subscriber::registry().with(filter);
        let installed = if std::env::var_os("GARNET_LOG_TREE").is_some() {
            registry
                .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_target(true).with_level(true))
                .try_init()
        };
        if installed.is_err() {
            tracing::debug!("a global subscriber was already installed");
        }
    });
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
