//! Async client for the Gemini API / Vertex AI cached content endpoints.

pub mod caches;
pub mod client;
pub mod error;
mod http_response;
pub mod pagination;

#[cfg(test)]
mod test_support;

pub use genai_caches_types as types;

pub use caches::{Caches, CachedContentsPage};
pub use client::{Backend, Client, ClientBuilder, Credentials, HttpOptions, VertexConfig};
pub use error::{Error, Result};
pub use pagination::PageOutcome;
pub use tokio_util::sync::CancellationToken;
