//! Library side of News Harvest: every pipeline stage, usable on its own.
//!
//! See the binary's documentation for how the stages fit together.

pub mod cli;
pub mod fetcher;
pub mod links;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod scrapers;
pub mod store;
