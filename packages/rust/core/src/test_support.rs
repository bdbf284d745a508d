//! Fixtures shared by the core unit tests.

use std::path::PathBuf;

use atlasdash_feed::{FeedClient, FeedOptions};
use atlasdash_shared::DocLocation;
use atlasdash_storage::Storage;
use url::Url;
use uuid::Uuid;

/// A fresh, empty build directory under the system temp dir.
pub(crate) fn temp_build_dir() -> PathBuf {
    std::env::temp_dir().join(format!("atlasdash-build-{}", Uuid::now_v7()))
}

/// A read-write index database in its own temp build directory.
pub(crate) async fn temp_storage() -> Storage {
    let path = temp_build_dir().join(atlasdash_storage::INDEX_DB_NAME);
    Storage::open(&path).await.expect("open test db")
}

pub(crate) fn client_for(server: &wiremock::MockServer) -> FeedClient {
    let url = Url::parse(&server.uri()).unwrap();
    FeedClient::new(&FeedOptions::with_base_url(url)).unwrap()
}

pub(crate) fn apexcode() -> DocLocation {
    DocLocation {
        locale: "en-us".into(),
        deliverable: "apexcode".into(),
        doc_version: "224.0".into(),
    }
}

/// Serve `<p>{id}</p>` for any content request.
pub(crate) async fn mount_any_content(server: &wiremock::MockServer) {
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path_regex("^/get_document_content/"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
            serde_json::json!({ "id": "page", "title": "Page", "content": "<p>page</p>" }),
        ))
        .mount(server)
        .await;
}
