//! srm-bot — lead-generation chat assistant for a driving-school
//! aggregator.

pub mod analytics;
pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod flow;
pub mod i18n;
pub mod links;
pub mod render;
pub mod session;
pub mod validators;
