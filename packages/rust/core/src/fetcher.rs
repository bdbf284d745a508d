//! Bounded-concurrency content downloader.
//!
//! One [`ThrottledFetcher`] is shared by every walk of a build run. Each
//! scheduled entry becomes a task that writes the entry's page under the build
//! directory unless it is already there.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use atlasdash_feed::FeedClient;
use atlasdash_shared::{DocLocation, DocsetError, Entry, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// What a finished download task did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Written,
    Skipped,
}

/// Counts of finished download tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Files downloaded and written.
    pub written: usize,
    /// Files left alone because they already existed.
    pub skipped: usize,
}

impl FetchStats {
    fn add(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Written => self.written += 1,
            FetchOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Worker pool with a fixed number of in-flight downloads.
pub struct ThrottledFetcher {
    client: FeedClient,
    build_dir: PathBuf,
    header: Arc<str>,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<Result<FetchOutcome>>,
    scheduled: HashSet<PathBuf>,
    stats: FetchStats,
}

impl ThrottledFetcher {
    /// Create a fetcher writing under `build_dir`, prefixing every page with `header`.
    pub fn new(
        client: FeedClient,
        build_dir: impl Into<PathBuf>,
        header: impl Into<Arc<str>>,
        capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(DocsetError::validation("fetch capacity must be at least 1"));
        }

        Ok(Self {
            client,
            build_dir: build_dir.into(),
            header: header.into(),
            semaphore: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
            scheduled: HashSet::new(),
            stats: FetchStats::default(),
        })
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Number of distinct paths scheduled so far.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    /// Schedule the download of `entry`'s content.
    ///
    /// Waits for a free slot when every slot is busy. Fails fast if an earlier
    /// download has already failed.
    pub async fn schedule(&mut self, entry: &Entry, doc: &Arc<DocLocation>) -> Result<()> {
        let rel_path = doc.content_path(entry, true)?;
        let path = self.build_dir.join(&rel_path);
        if !self.scheduled.insert(path.clone()) {
            debug!(path = %rel_path, "already scheduled");
            return Ok(());
        }

        let permit = self.acquire().await?;
        let client = self.client.clone();
        let header = Arc::clone(&self.header);
        let doc = Arc::clone(doc);
        let leaf = Entry {
            text: entry.text.clone(),
            id: entry.id.clone(),
            link_attr: entry.link_attr.clone(),
            children: Vec::new(),
        };

        self.tasks.spawn(async move {
            let _permit = permit;
            if exists(&path).await? {
                return Ok(FetchOutcome::Skipped);
            }
            let content = client.get_content(&leaf, &doc).await?;
            write_file(&path, format!("{header}{}", content.content).as_bytes()).await?;
            debug!(id = %leaf.id, path = %path.display(), "page written");
            Ok(FetchOutcome::Written)
        });
        Ok(())
    }

    /// Schedule the download of a stylesheet into the build directory root.
    pub async fn schedule_stylesheet(&mut self, file_name: &str) -> Result<()> {
        let path = self.build_dir.join(file_name);
        if !self.scheduled.insert(path.clone()) {
            return Ok(());
        }

        let permit = self.acquire().await?;
        let client = self.client.clone();
        let file_name = file_name.to_string();

        self.tasks.spawn(async move {
            let _permit = permit;
            if exists(&path).await? {
                return Ok(FetchOutcome::Skipped);
            }
            let body = client.get_stylesheet(&file_name).await?;
            write_file(&path, &body).await?;
            debug!(%file_name, "stylesheet written");
            Ok(FetchOutcome::Written)
        });
        Ok(())
    }

    /// Wait for every scheduled download. The first failure cancels the rest.
    pub async fn join(mut self) -> Result<FetchStats> {
        while let Some(joined) = self.tasks.join_next().await {
            let outcome = self.settle(joined)?;
            self.stats.add(outcome);
        }
        Ok(self.stats)
    }

    async fn acquire(&mut self) -> Result<OwnedSemaphorePermit> {
        self.reap()?;
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| DocsetError::Task(format!("fetch pool closed: {e}")))
    }

    /// Collect tasks that already finished, surfacing the first failure.
    fn reap(&mut self) -> Result<()> {
        while let Some(joined) = self.tasks.try_join_next() {
            let outcome = self.settle(joined)?;
            self.stats.add(outcome);
        }
        Ok(())
    }

    fn settle(
        &mut self,
        joined: std::result::Result<Result<FetchOutcome>, JoinError>,
    ) -> Result<FetchOutcome> {
        let result = joined
            .map_err(|e| DocsetError::Task(format!("download task failed: {e}")))
            .and_then(|r| r);
        if let Err(e) = &result {
            warn!(error = %e, pending = self.tasks.len(), "download failed, cancelling");
            self.tasks.abort_all();
        }
        result
    }
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| DocsetError::io(path, e))
}

/// Write `bytes` to `path` through a sibling `.part` file, so `path` only
/// ever exists complete.
pub(crate) async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DocsetError::io(parent, e))?;
    }

    let part = part_path(path);
    if let Err(e) = tokio::fs::write(&part, bytes).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(DocsetError::io(&part, e));
    }
    tokio::fs::rename(&part, path)
        .await
        .map_err(|e| DocsetError::io(path, e))
}

fn part_path(path: &Path) -> PathBuf {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{apexcode, client_for, temp_build_dir};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const CONTENT_PATH: &str =
        "/get_document_content/apexcode/apex_class_System_Account.htm/en-us/224.0";

    fn account() -> Entry {
        Entry::new("Account Class", "apex_class_System_Account")
            .with_link("apex_class_System_Account.htm")
    }

    async fn mount_account(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(CONTENT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "apex_class_System_Account",
                "title": "Account Class",
                "content": "<h1>Account</h1>"
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn page_path(dir: &Path) -> PathBuf {
        dir.join("atlas.en-us.apexcode.meta/apexcode/apex_class_System_Account.htm")
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let client = FeedClient::new(&atlasdash_feed::FeedOptions::with_base_url(
            url::Url::parse("http://localhost").unwrap(),
        ))
        .unwrap();
        let err = ThrottledFetcher::new(client, temp_build_dir(), "", 0).err().unwrap();
        assert!(matches!(err, DocsetError::Validation { .. }));
    }

    #[tokio::test]
    async fn writes_header_and_content() {
        let server = MockServer::start().await;
        mount_account(&server, 1).await;
        let dir = temp_build_dir();
        let doc = Arc::new(apexcode());

        let mut fetcher = ThrottledFetcher::new(client_for(&server), &dir, "<hdr/>", 4).unwrap();
        fetcher.schedule(&account(), &doc).await.unwrap();
        let stats = fetcher.join().await.unwrap();

        assert_eq!(stats, FetchStats { written: 1, skipped: 0 });
        let written = std::fs::read_to_string(page_path(&dir)).unwrap();
        assert_eq!(written, "<hdr/><h1>Account</h1>");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn anchored_links_share_one_download() {
        let server = MockServer::start().await;
        mount_account(&server, 1).await;
        let dir = temp_build_dir();
        let doc = Arc::new(apexcode());

        let methods = Entry::new("Account Methods", "apex_System_Account_methods")
            .with_link("apex_class_System_Account.htm#apex_System_Account_methods");

        let mut fetcher = ThrottledFetcher::new(client_for(&server), &dir, "", 4).unwrap();
        fetcher.schedule(&account(), &doc).await.unwrap();
        fetcher.schedule(&methods, &doc).await.unwrap();
        fetcher.schedule(&account(), &doc).await.unwrap();
        assert_eq!(fetcher.scheduled_count(), 1);

        let stats = fetcher.join().await.unwrap();
        assert_eq!(stats.written, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn existing_pages_are_not_fetched_again() {
        let server = MockServer::start().await;
        mount_account(&server, 1).await;
        let dir = temp_build_dir();
        let doc = Arc::new(apexcode());

        let mut first = ThrottledFetcher::new(client_for(&server), &dir, "", 2).unwrap();
        first.schedule(&account(), &doc).await.unwrap();
        first.join().await.unwrap();

        let mut second = ThrottledFetcher::new(client_for(&server), &dir, "<new/>", 2).unwrap();
        second.schedule(&account(), &doc).await.unwrap();
        let stats = second.join().await.unwrap();

        assert_eq!(stats, FetchStats { written: 0, skipped: 1 });
        let kept = std::fs::read_to_string(page_path(&dir)).unwrap();
        assert_eq!(kept, "<h1>Account</h1>");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn leftover_partial_write_is_replaced() {
        let server = MockServer::start().await;
        mount_account(&server, 1).await;
        let dir = temp_build_dir();
        let doc = Arc::new(apexcode());
        let page = page_path(&dir);
        std::fs::create_dir_all(page.parent().unwrap()).unwrap();
        std::fs::write(part_path(&page), "<h1>Acc").unwrap();

        let mut fetcher = ThrottledFetcher::new(client_for(&server), &dir, "", 2).unwrap();
        fetcher.schedule(&account(), &doc).await.unwrap();
        let stats = fetcher.join().await.unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(std::fs::read_to_string(&page).unwrap(), "<h1>Account</h1>");
        assert!(!part_path(&page).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn downloads_never_exceed_capacity() {
        const DELAY: Duration = Duration::from_millis(150);

        /// Logs when each request reaches the server.
        struct Arrivals(Arc<Mutex<Vec<Instant>>>);

        impl Respond for Arrivals {
            fn respond(&self, _request: &Request) -> ResponseTemplate {
                self.0.lock().unwrap().push(Instant::now());
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "p", "title": "P", "content": "<p/>" }))
                    .set_delay(DELAY)
            }
        }

        let server = MockServer::start().await;
        let arrivals = Arc::new(Mutex::new(Vec::new()));
        Mock::given(method("GET"))
            .and(path_regex("^/get_document_content/apexcode/page[0-9].htm/"))
            .respond_with(Arrivals(Arc::clone(&arrivals)))
            .expect(6)
            .mount(&server)
            .await;
        let dir = temp_build_dir();
        let doc = Arc::new(apexcode());

        let mut fetcher = ThrottledFetcher::new(client_for(&server), &dir, "", 2).unwrap();
        let start = Instant::now();
        for i in 0..6 {
            let entry = Entry::new(format!("Page {i}"), format!("page{i}"))
                .with_link(format!("page{i}.htm"));
            fetcher.schedule(&entry, &doc).await.unwrap();
        }
        // The last two slots only free up after two full rounds.
        assert!(start.elapsed() >= DELAY * 2 - Duration::from_millis(20));

        let stats = fetcher.join().await.unwrap();
        assert_eq!(stats, FetchStats { written: 6, skipped: 0 });

        // With two slots, a third request cannot start before one of the
        // previous two has been answered.
        let mut times = arrivals.lock().unwrap().clone();
        times.sort();
        assert_eq!(times.len(), 6);
        for window in times.windows(3) {
            assert!(window[2] - window[0] >= DELAY - Duration::from_millis(10));
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn server_error_fails_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENT_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let dir = temp_build_dir();
        let doc = Arc::new(apexcode());

        let mut fetcher = ThrottledFetcher::new(client_for(&server), &dir, "", 1).unwrap();
        fetcher.schedule(&account(), &doc).await.unwrap();
        let err = fetcher.join().await.unwrap_err();

        assert!(matches!(err, DocsetError::Network(ref msg) if msg.contains("500")));
        assert!(!page_path(&dir).exists());
        assert!(!part_path(&page_path(&dir)).exists());
    }

    #[tokio::test]
    async fn linkless_entry_cannot_be_scheduled() {
        let server = MockServer::start().await;
        let doc = Arc::new(apexcode());
        let mut fetcher =
            ThrottledFetcher::new(client_for(&server), temp_build_dir(), "", 1).unwrap();

        let err = fetcher
            .schedule(&Entry::new("Reference", "apex_reference"), &doc)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "validation error: link not found for apex_reference");
    }

    #[tokio::test]
    async fn stylesheets_land_in_build_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs.min.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .expect(1)
            .mount(&server)
            .await;
        let dir = temp_build_dir();

        let mut fetcher = ThrottledFetcher::new(client_for(&server), &dir, "", 2).unwrap();
        fetcher.schedule_stylesheet("docs.min.css").await.unwrap();
        fetcher.schedule_stylesheet("docs.min.css").await.unwrap();
        fetcher.join().await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.join("docs.min.css")).unwrap(), "body{}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
