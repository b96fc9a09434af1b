//! skiff-core — manifest model and shared conventions for Skiff.
//!
//! Defines the Kubernetes-shaped resource types accepted by the API
//! (Pod, Deployment, StatefulSet, Service, Node), server-side defaulting,
//! the container label schema used to tie runtime containers back to the
//! workloads that own them, resource-quantity parsing, and the daemon
//! configuration.

pub mod config;
pub mod labels;
pub mod manifest;
pub mod quantity;

pub use config::{Config, RuntimeConfig};
pub use manifest::*;
