//! End-to-end `build` pipeline: feed → walk → fetch + index → docset.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use atlasdash_classifier::{TypeClassifier, TypeRegistry};
use atlasdash_feed::{FeedClient, FeedOptions, verify_version};
use atlasdash_shared::{BuildConfig, DocLocation, DocsetError, IndexRecord, Result};
use atlasdash_storage::{BuildOutcome, INDEX_DB_NAME, Storage};
use tracing::{info, instrument, warn};

use crate::fetcher::ThrottledFetcher;
use crate::page::{page_header, save_main_page};
use crate::walker::HierarchyWalker;

/// Outcome of building one deliverable.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub deliverable: String,
    /// Document title from the feed.
    pub title: String,
    /// Display version, e.g. "Winter '20".
    pub version_text: String,
    /// Canonical version, e.g. "224.0".
    pub doc_version: String,
    /// Index records written.
    pub records: u64,
    /// Linked entries handed to the fetcher.
    pub scheduled: usize,
    /// Linked entries no type rule matched.
    pub unclassified: usize,
    /// The feed served something other than the newest version.
    pub version_mismatch: bool,
}

/// Result of the whole `build` pipeline.
#[derive(Debug)]
pub struct BuildResult {
    /// Docset build directory.
    pub output_dir: PathBuf,
    pub deliverables: Vec<BuildSummary>,
    /// Pages and stylesheets downloaded.
    pub pages_written: usize,
    /// Pages and stylesheets already present.
    pub pages_skipped: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called for every record written to the index.
    fn entry_indexed(&self, record: &IndexRecord);
    /// Called when a deliverable has been walked.
    fn deliverable_done(&self, summary: &BuildSummary);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn entry_indexed(&self, _record: &IndexRecord) {}
    fn deliverable_done(&self, _summary: &BuildSummary) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the full `build` pipeline.
///
/// 1. Open and clear the index
/// 2. Schedule stylesheet downloads
/// 3. Per deliverable: table of contents, main page, version check, tree walks
/// 4. Wait for every download
#[instrument(skip_all, fields(locale = %config.locale, deliverables = ?config.deliverables))]
pub async fn build_docset(
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    config.validate()?;
    if config.deliverables.is_empty() {
        return Err(DocsetError::validation("at least one deliverable is required"));
    }

    let start = Instant::now();
    info!(output = %config.output_dir.display(), "starting build pipeline");

    // --- Phase 1: Storage ---
    progress.phase("Opening index");
    let storage = Storage::open(&config.output_dir.join(INDEX_DB_NAME)).await?;
    storage.truncate_index().await?;

    // --- Phase 2: Collaborators ---
    let client = FeedClient::new(&FeedOptions::from(config))?;
    let classifier = TypeClassifier::new(TypeRegistry::from_config(&config.types));
    let mut fetcher = ThrottledFetcher::new(
        client.clone(),
        &config.output_dir,
        page_header(&config.stylesheets),
        config.concurrency,
    )?;

    progress.phase("Downloading stylesheets");
    for css in &config.stylesheets {
        fetcher.schedule_stylesheet(css).await?;
    }

    // --- Phase 3: Deliverables, one at a time ---
    let mut summaries = Vec::with_capacity(config.deliverables.len());
    for deliverable in &config.deliverables {
        let summary = build_deliverable(
            config,
            deliverable,
            &client,
            &classifier,
            &mut fetcher,
            &storage,
            progress,
        )
        .await?;
        progress.deliverable_done(&summary);
        summaries.push(summary);
    }

    // --- Phase 4: Drain downloads ---
    progress.phase("Waiting for downloads");
    let stats = fetcher.join().await?;

    let result = BuildResult {
        output_dir: config.output_dir.clone(),
        deliverables: summaries,
        pages_written: stats.written,
        pages_skipped: stats.skipped,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        deliverables = result.deliverables.len(),
        pages_written = result.pages_written,
        pages_skipped = result.pages_skipped,
        elapsed_ms = result.elapsed.as_millis(),
        "build pipeline complete"
    );

    Ok(result)
}

#[instrument(skip(config, client, classifier, fetcher, storage, progress))]
async fn build_deliverable(
    config: &BuildConfig,
    deliverable: &str,
    client: &FeedClient,
    classifier: &TypeClassifier,
    fetcher: &mut ThrottledFetcher,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<BuildSummary> {
    let run_id = storage.insert_build_run(deliverable, &config.locale).await?;

    progress.phase(&format!("Fetching {deliverable} table of contents"));
    let toc = client.get_toc(&config.locale, deliverable).await?;
    save_main_page(&config.output_dir, &toc).await?;

    let version_mismatch = match verify_version(&toc) {
        Ok(()) => false,
        Err(e) if e.is_recoverable() => {
            warn!("{e}");
            true
        }
        Err(e) => return Err(e),
    };

    progress.phase(&format!("Indexing {}", toc.doc_title));
    let doc = Arc::new(DocLocation::from_toc(&toc));
    let mut summary = BuildSummary {
        deliverable: deliverable.to_string(),
        title: toc.doc_title.clone(),
        version_text: toc.version.version_text.clone(),
        doc_version: toc.version.doc_version.clone(),
        records: 0,
        scheduled: 0,
        unclassified: 0,
        version_mismatch,
    };

    let roots = toc
        .entries
        .iter()
        .filter(|root| config.root_ids.is_empty() || config.root_ids.contains(&root.id));
    for root in roots {
        let walker =
            HierarchyWalker::new(classifier, &mut *fetcher, storage, Arc::clone(&doc), progress);
        let walked = walker.walk(root).await?;
        summary.records += walked.records;
        summary.scheduled += walked.scheduled;
        summary.unclassified += walked.unclassified;
    }

    storage
        .finish_build_run(
            &run_id,
            &BuildOutcome {
                title: summary.title.clone(),
                version_text: summary.version_text.clone(),
                doc_version: summary.doc_version.clone(),
                record_count: summary.records,
            },
        )
        .await?;

    info!(
        title = %summary.title,
        version = %summary.version_text,
        doc_version = %summary.doc_version,
        records = summary.records,
        unclassified = summary.unclassified,
        "deliverable indexed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_build_dir;
    use url::Url;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOC_PATH: &str = "/get_document/atlas.en-us.apexcode.meta";
    const STYLESHEETS: [&str; 2] = ["docs.min.css", "syntax.min.css"];

    fn fixture_toc() -> serde_json::Value {
        let raw = std::fs::read_to_string("../../../fixtures/json/toc.fixture.json")
            .expect("fixture file");
        serde_json::from_str(&raw).unwrap()
    }

    fn build_config(server: &MockServer, output_dir: PathBuf) -> BuildConfig {
        let url = Url::parse(&server.uri()).unwrap();
        BuildConfig {
            locale: "en-us".into(),
            deliverables: vec!["apexcode".into()],
            output_dir,
            concurrency: 4,
            base_url: url.clone(),
            stylesheet_base_url: url,
            stylesheets: STYLESHEETS.iter().map(|s| s.to_string()).collect(),
            root_ids: vec!["apex_reference".into()],
            timeout_secs: 5,
            types: Vec::new(),
        }
    }

    async fn mount_feed(server: &MockServer, toc: serde_json::Value, content_calls: u64) {
        Mock::given(method("GET"))
            .and(path(TOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(toc))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/get_document_content/apexcode/.+/en-us/224\.0$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "page",
                "title": "Page",
                "content": "<p>body</p>"
            })))
            .expect(content_calls)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"\.css$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn builds_docset_from_fixture() {
        let server = MockServer::start().await;
        // System namespace page and the Account class page (shared by its anchors).
        mount_feed(&server, fixture_toc(), 2).await;
        let dir = temp_build_dir();

        let result = build_docset(&build_config(&server, dir.clone()), &SilentProgress)
            .await
            .unwrap();

        let summary = &result.deliverables[0];
        assert_eq!(summary.title, "Apex Developer Guide");
        assert_eq!(summary.version_text, "Winter '20");
        assert_eq!(summary.doc_version, "224.0");
        assert_eq!(summary.records, 3);
        assert!(!summary.version_mismatch);
        assert_eq!(result.pages_written, 4);

        let storage = Storage::open_readonly(&dir.join(INDEX_DB_NAME)).await.unwrap();
        let records: Vec<_> = storage
            .list_records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.name, r.type_name, r.path))
            .collect();
        let base = "atlas.en-us.apexcode.meta/apexcode";
        assert_eq!(
            records,
            vec![
                ("System".into(), "Namespace".into(), format!("{base}/apex_namespace_System.htm")),
                ("Account".into(), "Class".into(), format!("{base}/apex_class_System_Account.htm")),
                (
                    "Account.getName()".into(),
                    "Method".into(),
                    format!("{base}/apex_class_System_Account.htm#apex_System_Account_getName")
                ),
            ]
        );

        let page = std::fs::read_to_string(dir.join(format!("{base}/apex_namespace_System.htm")))
            .unwrap();
        assert!(page.contains(r#"<link rel="stylesheet" type="text/css" href="docs.min.css">"#));
        assert!(page.ends_with("<p>body</p>"));
        assert!(dir.join("apexcode.html").exists());
        assert!(dir.join("docs.min.css").exists());

        let runs = storage.list_build_runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].record_count, Some(3));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rebuild_reuses_downloaded_pages() {
        let server = MockServer::start().await;
        mount_feed(&server, fixture_toc(), 2).await;
        let dir = temp_build_dir();
        let config = build_config(&server, dir.clone());

        build_docset(&config, &SilentProgress).await.unwrap();
        let second = build_docset(&config, &SilentProgress).await.unwrap();

        assert_eq!(second.pages_written, 0);
        assert_eq!(second.pages_skipped, 4);
        assert_eq!(second.deliverables[0].records, 3);

        let storage = Storage::open_readonly(&dir.join(INDEX_DB_NAME)).await.unwrap();
        assert_eq!(storage.count_records().await.unwrap(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_root_filter_walks_every_root() {
        let server = MockServer::start().await;
        mount_feed(&server, fixture_toc(), 2).await;
        let dir = temp_build_dir();
        let mut config = build_config(&server, dir.clone());
        config.root_ids.clear();

        let result = build_docset(&config, &SilentProgress).await.unwrap();
        // apex_intro is a root, so it is neither fetched nor indexed.
        assert_eq!(result.deliverables[0].records, 3);
        assert!(!dir.join("atlas.en-us.apexcode.meta/apexcode/apex_intro.htm").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn stale_version_only_warns() {
        let server = MockServer::start().await;
        let mut toc = fixture_toc();
        toc["version"]["doc_version"] = "222.0".into();
        Mock::given(method("GET"))
            .and(path(TOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(toc))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/get_document_content/apexcode/.+/en-us/222\.0$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "page", "title": "Page", "content": "<p>old</p>"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"\.css$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .mount(&server)
            .await;
        let dir = temp_build_dir();

        let result = build_docset(&build_config(&server, dir.clone()), &SilentProgress)
            .await
            .unwrap();
        assert!(result.deliverables[0].version_mismatch);
        assert_eq!(result.deliverables[0].records, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_toc_aborts_the_build() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"\.css$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .mount(&server)
            .await;
        let dir = temp_build_dir();

        let err = build_docset(&build_config(&server, dir.clone()), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsetError::Network(ref msg) if msg.contains("404")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn no_deliverables_is_rejected() {
        let server = MockServer::start().await;
        let mut config = build_config(&server, temp_build_dir());
        config.deliverables.clear();

        let err = build_docset(&config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, DocsetError::Validation { .. }));
    }
}
