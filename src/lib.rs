//! # Agent Activity
//!
//! Turns the raw activity log written by coding agents into two read
//! models: reconstructed sessions and windowed statistics.
//!
//! Agents append one [`LogRecord`](agent_activity_core::models::LogRecord)
//! per step. Nothing derived is ever stored; every session list and every
//! statistics document is recomputed from the log when asked for.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ JSONL ingest│──▶│  LogStore    │──▶│  QueryFacade         │
//! │  (activity) │   │ SQLite / mem │   │ reconstruct + stats  │
//! └─────────────┘   └──────────────┘   └──────────┬───────────┘
//!                                                  │
//!                                ┌─────────────────┤
//!                                ▼                 ▼
//!                           ┌──────────┐      ┌──────────┐
//!                           │   CLI    │      │   HTTP   │
//!                           └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! activity init                        # create database
//! activity ingest ./agent-log.jsonl    # append records
//! activity sessions --page 1           # list sessions
//! activity stats --hours 24            # windowed statistics
//! activity serve                       # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite log store |
//! | [`facade`] | Session listing and statistics |
//! | [`ingest`] | JSON Lines ingestion |
//! | [`sessions`] | `activity sessions` command |
//! | [`stats`] | `activity stats` command |
//! | [`server`] | HTTP API |
//!
//! The store-independent logic (record model, reconstruction, aggregation
//! and pagination) lives in the `agent-activity-core` crate.

pub mod config;
pub mod db;
pub mod facade;
pub mod ingest;
pub mod migrate;
pub mod server;
pub mod sessions;
pub mod sqlite_store;
pub mod stats;
