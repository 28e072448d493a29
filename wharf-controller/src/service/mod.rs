//! Service Module
//!
//! The controller's core: webhook authentication, connection sessions, the
//! project registry and the deployment pipeline.

pub mod hub;
pub mod ingress;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod signature;

pub use hub::{SessionHub, spawn_liveness_probe};
pub use ingress::{IngressError, WebhookIngress};
pub use pipeline::{BuildPipeline, PipelineSettings};
pub use registry::ProjectRegistry;
pub use session::{ConnectionId, Role, Sessions};
