//! Shared runtime for the `blocking_*` wrappers.

use std::sync::OnceLock;

use tokio::runtime::Runtime;

/// Process-wide multi-threaded runtime, created on first use.
///
/// Must not be used from inside another tokio runtime: `block_on` panics there.
pub(crate) fn blocking_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime for blocking operations")
    })
}
