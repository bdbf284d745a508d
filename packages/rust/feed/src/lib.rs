//! Documentation feed client.
//!
//! Retrieves the table-of-contents document for a deliverable, the content
//! fragment behind each entry link, and the stylesheets the pages reference.

use std::time::Duration;

use atlasdash_shared::{AtlasToc, BuildConfig, DocLocation, DocsetError, Entry, Result, TocContent};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for feed requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum response size we accept (32 MB).
const MAX_RESPONSE_SIZE: u64 = 32 * 1024 * 1024;

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("atlasdash/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Feed options
// ---------------------------------------------------------------------------

/// Endpoints and limits for the feed client.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Base URL of the documentation API.
    pub base_url: Url,
    /// Base URL stylesheets are served from.
    pub stylesheet_base_url: Url,
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl FeedOptions {
    /// Point both the API and stylesheets at `base_url` (used against mock servers).
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            stylesheet_base_url: base_url.clone(),
            base_url,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl From<&BuildConfig> for FeedOptions {
    fn from(config: &BuildConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            stylesheet_base_url: config.stylesheet_base_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

/// HTTP client for the documentation feed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    base_url: Url,
    stylesheet_base_url: Url,
}

impl FeedClient {
    pub fn new(opts: &FeedOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| DocsetError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: opts.base_url.clone(),
            stylesheet_base_url: opts.stylesheet_base_url.clone(),
        })
    }

    /// URL of the table-of-contents document for a deliverable.
    pub fn toc_url(&self, locale: &str, deliverable: &str) -> String {
        format!(
            "{}/get_document/atlas.{locale}.{deliverable}.meta",
            trim_base(&self.base_url)
        )
    }

    /// URL of the content fragment behind `entry`'s link (anchor removed).
    pub fn content_url(&self, entry: &Entry, doc: &DocLocation) -> Result<String> {
        let rel_link = entry.rel_link(true).ok_or_else(|| {
            DocsetError::validation(format!("link not found for {}", entry.id))
        })?;

        Ok(format!(
            "{}/get_document_content/{}/{rel_link}/{}/{}",
            trim_base(&self.base_url),
            doc.deliverable,
            doc.locale,
            doc.doc_version
        ))
    }

    /// URL of a stylesheet by file name.
    pub fn stylesheet_url(&self, file_name: &str) -> String {
        format!("{}/{file_name}", trim_base(&self.stylesheet_base_url))
    }

    /// Retrieve and parse the table of contents for a deliverable.
    #[instrument(skip(self))]
    pub async fn get_toc(&self, locale: &str, deliverable: &str) -> Result<AtlasToc> {
        let url = self.toc_url(locale, deliverable);
        info!(%url, "fetching table of contents");

        let toc: AtlasToc = self.get_json(&url).await?;

        info!(
            title = %toc.doc_title,
            version = %toc.version.doc_version,
            entries = toc.entries.len(),
            "table of contents loaded"
        );
        Ok(toc)
    }

    /// Retrieve the content fragment for an entry.
    pub async fn get_content(&self, entry: &Entry, doc: &DocLocation) -> Result<TocContent> {
        let url = self.content_url(entry, doc)?;
        debug!(%url, id = %entry.id, "fetching content");
        self.get_json(&url).await
    }

    /// Download a stylesheet verbatim.
    pub async fn get_stylesheet(&self, file_name: &str) -> Result<Vec<u8>> {
        let url = self.stylesheet_url(file_name);
        debug!(%url, "fetching stylesheet");
        self.get_bytes(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| DocsetError::parse(format!("{url}: {e}")))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DocsetError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocsetError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(DocsetError::validation(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DocsetError::Network(format!("{url}: failed to read body: {e}")))?;
        Ok(body.to_vec())
    }
}

fn trim_base(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}

// ---------------------------------------------------------------------------
// Version check
// ---------------------------------------------------------------------------

/// Ensure the retrieved document is the newest published version.
///
/// An empty version list leaves nothing to compare against and passes.
pub fn verify_version(toc: &AtlasToc) -> Result<()> {
    let Some(latest) = toc.available_versions.first() else {
        return Ok(());
    };

    if toc.version.doc_version != latest.doc_version {
        return Err(DocsetError::VersionMismatch {
            found: toc.version.doc_version.clone(),
            latest: latest.doc_version.clone(),
        });
    }
    Ok(())
}
