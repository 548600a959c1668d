//! # pairline-runtime
//!
//! The session lifecycle manager.
//!
//! - [`SessionRecord`]: the per-session state machine
//! - [`SessionRegistry`]: id → session index with retired-id tracking
//! - Per-session actors that serialize every transition for one id
//! - [`NotificationBus`]: fan-out of [`LifecycleEvent`](pairline_core::LifecycleEvent)s
//! - [`SessionManager`]: the entry point used by the gateway

#![deny(unsafe_code)]

mod actor;
pub mod adapter;
pub mod bus;
pub mod errors;
pub mod handle;
pub mod manager;
pub mod record;
pub mod registry;

pub use bus::NotificationBus;
pub use errors::{RegistryError, TransitionError};
pub use handle::SessionHandle;
pub use manager::{ManagerConfig, SessionManager};
pub use record::{SessionRecord, SessionView, Trigger};
pub use registry::SessionRegistry;
