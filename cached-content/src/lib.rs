//! Cached content walkthrough: create a cache over two PDFs, then list
//! caches with auto-paging iteration and with manual page tokens.
//!
//! ```text
//! # Vertex AI
//! export GOOGLE_GENAI_USE_VERTEXAI=true
//! export GOOGLE_CLOUD_PROJECT={YOUR_PROJECT_ID}
//! export GOOGLE_CLOUD_LOCATION={YOUR_LOCATION}
//!
//! # Gemini API
//! export GOOGLE_GENAI_USE_VERTEXAI=false
//! export GOOGLE_API_KEY={YOUR_API_KEY}
//!
//! cargo run -p cached-content -- --model=gemini-1.5-pro-002
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::{pin_mut, StreamExt};
use genai_caches::types::caches::{CreateCachedContentConfig, ListCachedContentsConfig};
use genai_caches::types::content::{Content, Part, Role};
use genai_caches::{Backend, CachedContentsPage, Client, PageOutcome};
use serde::Serialize;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-002";
pub const SAMPLE_PDF_URI: &str = "gs://cloud-samples-data/generative-ai/pdf/2312.11805v3.pdf";
pub const NO_MORE_PAGES_MESSAGE: &str = "No more cached content to retrieve.";

/// Command line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "cached-content", about = "Create and list Gemini cached contents")]
pub struct Args {
    /// The model name, e.g. gemini-1.5-pro-002
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,
}

/// Run configuration, built once from the parsed flags.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub model: String,
    pub ttl: String,
    pub page_size: i32,
    pub contents: Vec<Content>,
}

impl SampleConfig {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ttl: "86400s".to_string(),
            page_size: 2,
            contents: vec![Content::from_parts(
                vec![
                    Part::file_data(SAMPLE_PDF_URI, "application/pdf"),
                    Part::file_data(SAMPLE_PDF_URI, "application/pdf"),
                ],
                Role::User,
            )],
        }
    }

    fn create_config(&self) -> CreateCachedContentConfig {
        CreateCachedContentConfig {
            ttl: Some(self.ttl.clone()),
            contents: Some(self.contents.clone()),
            ..Default::default()
        }
    }

    fn list_config(&self, page_token: Option<String>) -> ListCachedContentsConfig {
        ListCachedContentsConfig {
            page_size: Some(self.page_size),
            page_token,
            ..Default::default()
        }
    }
}

impl From<&Args> for SampleConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.model.clone())
    }
}

/// Pretty-prints a value as JSON on its own line.
pub fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    writeln!(out, "{rendered}")?;
    Ok(())
}

#[must_use]
pub const fn backend_banner(backend: Backend) -> &'static str {
    match backend {
        Backend::VertexAi => "Calling VertexAI Backend...",
        Backend::GeminiApi => "Calling GeminiAPI Backend...",
    }
}

/// Runs the walkthrough against `client`, writing all results to `out`.
///
/// Stops at the first failure. Running out of pages during manual
/// pagination prints a notice and counts as success.
///
/// # Errors
/// Returns the first create or list failure, or an output write failure.
pub async fn run(client: &Client, config: &SampleConfig, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", backend_banner(client.backend()))?;
    let caches = client.caches();

    let created = caches
        .create(config.model.as_str(), config.create_config())
        .await
        .with_context(|| format!("failed to create cached content for {}", config.model))?;
    info!(name = ?created.name, "cached content created");
    print_json(out, &created)?;

    // Option 1: auto-paging iteration.
    let all = caches.all_with_config(config.list_config(None));
    pin_mut!(all);
    while let Some(item) = all.next().await {
        let item = item.context("failed to list cached contents")?;
        print_json(out, &item)?;
    }

    // Option 2: manual pagination.
    let first = caches.list_page(config.list_config(None)).await;
    let Some(first) = page_or_notice(first, out)? else {
        return Ok(());
    };
    debug!(items = first.items.len(), "first page");

    let Some(second) = page_or_notice(first.next_page().await, out)? else {
        return Ok(());
    };
    debug!(items = second.items.len(), "second page");

    // Resume from the second page's token; a missing token resumes with an
    // empty one, which reports exhaustion instead of restarting the listing.
    let token = second.next_page_token.clone().unwrap_or_default();
    let resumed = caches.list_page(config.list_config(Some(token))).await;
    let Some(resumed) = page_or_notice(resumed, out)? else {
        return Ok(());
    };
    print_json(out, &resumed.items)?;
    Ok(())
}

fn page_or_notice(
    outcome: genai_caches::Result<PageOutcome<CachedContentsPage>>,
    out: &mut impl Write,
) -> Result<Option<CachedContentsPage>> {
    match outcome.context("failed to fetch cached contents page")? {
        PageOutcome::Page(page) => Ok(Some(page)),
        PageOutcome::NoMorePages => {
            writeln!(out, "{NO_MORE_PAGES_MESSAGE}")?;
            Ok(None)
        }
    }
}
