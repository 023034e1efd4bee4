//! # CRM Filler Core
//!
//! Runtime-free logic for CRM Filler: record models, fuzzy name matching,
//! context building, identifier minting, model-output parsing,
//! reconciliation, and the store abstraction.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. The application
//! crate supplies the JSON-file store, the generation clients, and the
//! surfaces (CLI and HTTP server).

pub mod context;
pub mod de;
pub mod fuzzy;
pub mod ids;
pub mod models;
pub mod output;
pub mod reconcile;
pub mod store;
pub mod stored;
