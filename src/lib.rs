//! # CRM Filler
//!
//! Turns free-text meeting notes into structured CRM updates.
//!
//! A meeting is matched against what the store already knows (fuzzy company
//! and contact lookup plus recent deals and meetings), a language model
//! proposes contacts, companies, and deals with temporary ids, and the
//! reconciliation engine merges those proposals into the JSON collection
//! files, minting stable ids for new records.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Meeting text │──▶│  Extractor   │──▶│ Reconcile +  │
//! │  + hints     │   │ prompt/retry │   │  JSON store  │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           │                  │
//!                      ┌────┴──────────────────┤
//!                      ▼                       ▼
//!                 ┌──────────┐           ┌──────────┐
//!                 │   CLI    │           │   HTTP   │
//!                 │  (crmf)  │           │  (axum)  │
//!                 └──────────┘           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! crmf init                                  # create the data files
//! crmf extract notes.txt --company "Mercury Consulting" --contact Ravi
//! crmf apply extraction.json                 # merge into the store
//! crmf serve                                 # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Service-boundary error type |
//! | [`json_store`] | JSON-file record store |
//! | [`llm`] | Generation clients (OpenAI, Ollama) |
//! | [`prompt`] | Extraction prompt composition |
//! | [`retry`] | Bounded retry policy |
//! | [`extract`] | Extraction driver |
//! | [`import`] | Apply payload parsing (extraction or table form) |
//! | [`service`] | Extract and apply operations |
//! | [`server`] | HTTP server |
//!
//! Matching, context building, id minting, output parsing, and
//! reconciliation live in the runtime-free `crm_filler_core` crate.

pub mod config;
pub mod error;
pub mod extract;
pub mod import;
pub mod json_store;
pub mod llm;
pub mod prompt;
pub mod retry;
pub mod server;
pub mod service;
