//! Discord HTTP-interactions adapter.
//!
//! Inbound payloads are verified ([`verify`]), decoded ([`model`]) and handed
//! to the reducer; replies are encoded back into wire JSON ([`response`]).
//! The REST side ([`client`], [`roles`]) registers commands, resolves role
//! names and posts backup reports.

pub mod client;
pub mod model;
pub mod response;
pub mod roles;
pub mod verify;

pub use client::{BackupChannel, DiscordClient, DiscordError};
pub use model::{Inbound, ModelError, RawInteraction};
pub use roles::{CachedRoleDirectory, RoleDirectory, StaticRoleDirectory};
pub use verify::{SignatureVerifier, VerifyError};
