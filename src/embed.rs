use std::path::Path;

use tokio::fs;

use url::form_urlencoded::byte_serialize;

use crate::{error::Error, queue::Uploaded};

/// Mixcloud widget iframe for an uploaded show.
pub fn embed_snippet(key: &str) -> String {
    let feed: String = byte_serialize(key.as_bytes()).collect();
    format!(
        r#"<iframe width="100%" height="120" src="https://www.mixcloud.com/widget/iframe/?hide_cover=1&feed={feed}" frameborder="0"></iframe>"#
    )
}

/// Writes one snippet line per upload to `path`, replacing the file.
pub async fn write_embeds(path: &Path, uploads: &[Uploaded]) -> Result<(), Error> {
    let mut out = String::new();
    for upload in uploads {
        out.push_str(&embed_snippet(&upload.key));
        out.push('\n');
    }
    fs::write(path, out).await?;
    Ok(())
}
