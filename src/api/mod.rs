//! Backend API: wire types and the retrying HTTP client.

pub mod client;
pub mod types;

pub use client::{ApiClient, CatalogApi};
