//! Threshold alerting for LPerf.
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                    AlertEngine                     │
//! │  rules (id = metric_comparator_threshold)          │
//! │     │                                              │
//! │  evaluate(subject, latest) ──► AlertEvent          │
//! │                                   │                │
//! │  dispatch ──► AlertChannel × N (retry policy)      │
//! │     │                                              │
//! │  history ──► AlertReport                           │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! Channels are pluggable through [`AlertChannel`]; console, log, file and
//! in-memory channels ship with the crate.

#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod templates;

// ── Re-exports ──────────────────────────────────────────────────────

pub use channel::{
    AlertChannel, ChannelKind, ChannelSpec, ConsoleChannel, FileChannel, LogChannel,
    MemoryChannel,
};
pub use config::AlertConfig;
pub use engine::{default_rules, AlertEngine, ChannelFailure, DispatchOutcome};
pub use error::{AlertError, AlertResult};
pub use report::{AlertReport, ChannelInfo};
pub use templates::{RuleTemplate, RuleTemplates};
