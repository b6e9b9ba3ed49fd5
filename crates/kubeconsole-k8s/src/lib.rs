//! Kubernetes client for kubeconsole
//!
//! This crate provides kubeconfig handling and the pod log and event sources
//! that the pollers fetch from.

mod client;
mod sources;

pub use client::KubeClient;
pub use sources::{
    event_to_item, log_params, CLOCK_SKEW_MARGIN_SECS, PodEventSource, PodLogSource, SourceError,
};

// Re-export types that are used in our public API
pub use kubeconsole_types::ConsoleTarget;
