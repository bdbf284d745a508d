//! Static page assembly: presentational headers and the deliverable landing page.

use std::path::Path;

use atlasdash_shared::{AtlasToc, DocsetError, Result};
use tracing::debug;

use crate::fetcher::write_file;

/// Charset declaration every written page starts with.
pub const META_HEADER: &str =
    "<meta http-equiv='Content-Type' content='text/html; charset=UTF-8' />";

/// Header prepended to every entry page.
///
/// Content pages live two directories below the build root, where the
/// stylesheets are stored.
pub fn page_header(stylesheets: &[String]) -> String {
    let mut header = format!("{META_HEADER}<base href=\"../../\"/>\n");
    for css in stylesheets {
        header.push_str(&format!(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"{css}\">"
        ));
    }
    header.push_str("<style>body { padding: 15px; }</style>");
    header
}

/// Write the deliverable's landing page to `<build_dir>/<deliverable>.html`.
///
/// Returns `false` when the page already exists.
pub async fn save_main_page(build_dir: &Path, toc: &AtlasToc) -> Result<bool> {
    let path = build_dir.join(format!("{}.html", toc.deliverable));
    if tokio::fs::try_exists(&path)
        .await
        .map_err(|e| DocsetError::io(&path, e))?
    {
        debug!(path = %path.display(), "main page exists, skipping");
        return Ok(false);
    }

    write_file(&path, format!("{META_HEADER}{}", toc.content).as_bytes()).await?;

    debug!(path = %path.display(), "main page written");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_build_dir;

    #[test]
    fn header_links_every_stylesheet() {
        let header = page_header(&["docs.min.css".into(), "holygrail.min.css".into()]);
        assert!(header.starts_with(META_HEADER));
        assert!(header.contains("<base href=\"../../\"/>\n"));
        assert!(header.contains(r#"<link rel="stylesheet" type="text/css" href="docs.min.css">"#));
        assert!(header.contains(r#"href="holygrail.min.css""#));
        assert!(header.ends_with("<style>body { padding: 15px; }</style>"));
    }

    #[tokio::test]
    async fn main_page_is_written_once() {
        let dir = temp_build_dir();
        let mut toc = AtlasToc {
            deliverable: "apexcode".into(),
            content: "<h1>Apex</h1>".into(),
            ..AtlasToc::default()
        };

        assert!(save_main_page(&dir, &toc).await.unwrap());
        let written = std::fs::read_to_string(dir.join("apexcode.html")).unwrap();
        assert_eq!(written, format!("{META_HEADER}<h1>Apex</h1>"));

        toc.content = "<h1>Changed</h1>".into();
        assert!(!save_main_page(&dir, &toc).await.unwrap());
        let unchanged = std::fs::read_to_string(dir.join("apexcode.html")).unwrap();
        assert!(unchanged.contains("<h1>Apex</h1>"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
