//! Shared types for the Gemini cached content client.

mod base64_serde;

pub mod caches;
pub mod content;
pub mod http;
