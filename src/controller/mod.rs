//! # Controller
//!
//! Core controller modules for the Key Vault Secret Controller.
//!
//! - `backoff`: Exponential per-key retry backoff
//! - `cluster`: Cluster access traits and their kube implementations
//! - `dispatch`: Routes resource events onto the structural and vault-drift queues
//! - `events`: Kubernetes Event recording
//! - `handlers`: Turns each Key Vault object type into output data
//! - `hash`: Content digests for change detection
//! - `queue`: De-duplicating, rate-limited work queue
//! - `reconciler`: Output and vault reconciliation passes
//! - `server`: HTTP server for metrics and health checks
//! - `status`: Conflict-safe status writes

pub mod backoff;
pub mod cluster;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod hash;
pub mod queue;
pub mod reconciler;
pub mod server;
pub mod status;
