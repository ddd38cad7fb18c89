//! Discord bot tracking three per-member counters.
//!
//! Members credit amounts to each other through a panel of buttons, member
//! pickers and forms; staff can overwrite or reset members and wipe
//! everything after an automatic backup.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Discord adapter (axum + reqwest)        │  ← signatures, wire JSON, REST
//! ├──────────────────────────────────────────┤
//! │  Store runtime                           │  ← effects, feedback, shutdown
//! ├──────────────────────────────────────────┤
//! │  InteractionReducer                      │  ← routing by decoded intent,
//! │                                          │    role gate, validation
//! ├──────────────────────────────────────────┤
//! │  CounterStore (SQLite) / Archive         │  ← durable counters, backups
//! └──────────────────────────────────────────┘
//! ```
//!
//! No flow state lives in memory between events: every component carries its
//! next step in its identifier, so a restart mid-flow loses nothing.

pub mod config;
pub mod discord;
pub mod environment;
pub mod error;
pub mod reducer;
pub mod server;
pub mod types;
pub mod views;

pub use config::{Config, ConfigError};
pub use environment::BotEnvironment;
pub use error::AppError;
pub use reducer::InteractionReducer;
pub use server::{AppState, BotStore, router};
pub use types::{BotAction, BotState, Interaction, InteractionId, InteractionKind, Reply};
