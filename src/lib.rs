//! # Pyrilo
//!
//! Repackages folder-based submission information packages (SIPs) into
//! BagIt-style bags, each carrying a `sip.json` descriptor for the GAMS
//! ingest service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  SIPs root  │──▶│   Locator   │──▶│ Extractors  │──▶│ Bag assembler│
//! │ (folders)   │   │ name+layout │   │ TEI/GML/... │   │  bags root   │
//! └─────────────┘   └─────────────┘   └──────┬──────┘   └──────┬───────┘
//!                                            │                 │
//!                                            ▼                 ▼
//!                                    ┌──────────────┐   ┌─────────────┐
//!                                    │ search index │   │  zip (pack) │
//!                                    └──────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pyrilo init                   # write config, create sips/ and bagit/
//! pyrilo sips                   # list resolved SIP folders
//! pyrilo search-index demo      # optional: SEARCH_INDEX.json per TEI SIP
//! pyrilo bag demo               # clear bagit/ and build one bag per SIP
//! pyrilo pack                   # zip every bag for upload
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`models`] | Core data types and the `sip.json` envelope |
//! | [`xml`] | Source-document parsing and path queries |
//! | [`locator`] | SIP folder discovery and validation |
//! | [`datastreams`] | Per-file datastream descriptors |
//! | [`extract`] | Content-model metadata extractors |
//! | [`bag`] | Bag assembly |
//! | [`search_index`] | Search-index JSON for TEI SIPs |
//! | [`package`] | Zip archives of finished bags |
//! | [`sips`] | SIP listing for the CLI |
//! | [`logging`] | Tracing subscriber setup |

pub mod bag;
pub mod config;
pub mod datastreams;
pub mod error;
pub mod extract;
pub mod locator;
pub mod logging;
pub mod models;
pub mod package;
pub mod search_index;
pub mod sips;
pub mod xml;

pub use error::{Result, SipError};
