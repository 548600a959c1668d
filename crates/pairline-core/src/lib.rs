//! # pairline-core
//!
//! Foundation types shared by every pairline crate:
//!
//! - **Branded IDs**: [`SessionId`] as a newtype for type safety
//! - **Session state**: [`SessionState`], the seven lifecycle states
//! - **Lifecycle events**: [`LifecycleEvent`], the push-channel vocabulary
//! - **Errors**: [`SessionError`] taxonomy via `thiserror`
//! - **Addressing**: [`normalize_address`] for outbound destinations
//! - **Logging**: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod address;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod state;

pub use address::{MESSAGING_DOMAIN, normalize_address};
pub use errors::SessionError;
pub use events::LifecycleEvent;
pub use ids::SessionId;
pub use state::SessionState;
