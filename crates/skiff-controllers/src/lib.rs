//! skiff-controllers — the reconciliation engine.
//!
//! Three independent control loops observe desired state through the store
//! and actual state through the runtime port, and issue imperative commands
//! until the two agree:
//!
//! - [`WorkloadController`] — replica counts for Deployments and
//!   StatefulSets (5 s cadence)
//! - [`ServiceController`] — label-selector endpoint resolution (10 s)
//! - [`NodeReporter`] — the self-describing `local-node` resource (30 s)
//!
//! The design is level-triggered: nothing is cached between ticks, every
//! tick re-derives the world from a runtime listing. Loops never surface
//! errors upward; they log and self-heal on the next tick. Shutdown is a
//! shared `watch` channel observed between ticks.

pub mod node;
pub mod service;
pub mod workload;

pub use node::NodeReporter;
pub use service::ServiceController;
pub use workload::WorkloadController;
