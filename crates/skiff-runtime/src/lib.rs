//! skiff-runtime — the container-runtime abstraction.
//!
//! The orchestrator core never talks to a container daemon directly; it
//! issues commands through the [`ContainerRuntime`] trait and observes the
//! world through label-filtered listings. Drivers are selected at startup
//! by name via [`connect`]; the core never names a specific runtime.
//!
//! The in-process [`fake::FakeRuntime`] is a complete implementation used
//! by the test suites and by standalone development mode. Daemon-backed
//! drivers (docker, containerd) plug in behind the same registry.

pub mod error;
pub mod fake;
pub mod port;
pub mod types;

pub use error::{RuntimeError, RuntimeResult};
pub use port::ContainerRuntime;
pub use types::*;

use std::sync::Arc;

use skiff_core::config::RuntimeConfig;

/// Resolve and connect the configured runtime driver.
///
/// Returns [`RuntimeError::UnknownDriver`] for unrecognized names, which is
/// fatal at startup.
pub fn connect(config: &RuntimeConfig) -> RuntimeResult<Arc<dyn ContainerRuntime>> {
    match config.driver.as_str() {
        "fake" => Ok(Arc::new(fake::FakeRuntime::new(config.clone()))),
        other => Err(RuntimeError::UnknownDriver(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_resolves_fake_driver() {
        let config = RuntimeConfig::default();
        assert!(connect(&config).is_ok());
    }

    #[test]
    fn connect_rejects_unknown_driver() {
        let config = RuntimeConfig {
            driver: "hypervisor-9000".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            connect(&config),
            Err(RuntimeError::UnknownDriver(_))
        ));
    }
}
