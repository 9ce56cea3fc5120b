//! # Agent Activity Core
//!
//! Shared, runtime-agnostic logic for Agent Activity: log record models,
//! the store abstraction, session reconstruction, windowed statistics,
//! tool-name extraction, and pagination.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Everything above the [`store::LogStore`]
//! trait is a pure function of the records it is handed.

pub mod error;
pub mod models;
pub mod pagination;
pub mod reconstruct;
pub mod stats;
pub mod store;
pub mod tools;

pub use error::{ActivityError, Result};
pub use models::{LogRecord, NewLogRecord, Page, Phase, Session, StatsWindow, TimeWindow};
