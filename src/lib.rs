//! Risk triage for newly launched tokens: actor classification, chart pattern
//! detection, risk scoring and the per-token analysis lifecycle.

pub mod actors;
pub mod chart;
pub mod config;
pub mod domain;
pub mod error;
pub mod journal;
pub mod lifecycle;
pub mod logger;
pub mod notifier;
pub mod risk;
pub mod scanner;
pub mod sources;
pub mod state;
pub mod time;
