//! # pairline-client
//!
//! The contract between the session lifecycle manager and the external
//! messaging client that performs pairing and delivery.
//!
//! - [`MessagingClient`]: commands (`initialize`, `send_message`, `logout`, `destroy`)
//! - [`ClientEvent`]: the five asynchronous events, delivered on a channel
//! - [`ClientFactory`]: spawns one client per session
//! - [`AuthStore`]: per-session credential directories and their purge
//! - [`PairingEncoder`]: turns a raw pairing code into a displayable payload
//! - [`SidecarClientFactory`]: real implementation over a child process
//! - [`testing::FakeClientFactory`]: in-memory implementation for tests

#![deny(unsafe_code)]

pub mod auth_store;
pub mod client;
pub mod errors;
pub mod pairing;
pub mod sidecar;
pub mod testing;

pub use auth_store::AuthStore;
pub use client::{ClientEvent, ClientFactory, MessagingClient, SpawnedClient};
pub use errors::ClientError;
pub use pairing::{DataUrlEncoder, PairingEncoder};
pub use sidecar::{SidecarClient, SidecarClientFactory};
