use std::path::{Path, PathBuf};

use tokio::fs::read_dir;

use tracing::{info, warn};

/// Extension a show file must carry, compared case-insensitively.
#[derive(Clone, Copy, Debug)]
pub struct FilePattern(&'static str);

pub const AUDIO: FilePattern = FilePattern("mp3");
pub const IMAGE: FilePattern = FilePattern("jpg");

impl FilePattern {
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case(self.0))
    }
}

/// The resolved audio/image pair of a show folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShowFiles {
    pub audio: PathBuf,
    pub image: PathBuf,
}

/// Resolves the single audio and single image file directly inside `folder`.
///
/// Returns `None` when either pattern matches zero or several files, or the
/// folder can't be listed; the caller skips the show.
pub async fn locate_show(folder: &Path) -> Option<ShowFiles> {
    let mut audio = Vec::new();
    let mut image = Vec::new();

    let mut dir = match read_dir(folder).await {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Can't read show folder {}: {e}", folder.display());
            return None;
        }
    };
    loop {
        let entry = match dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Can't read show folder {}: {e}", folder.display());
                return None;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if AUDIO.matches(&path) {
            audio.push(path);
        } else if IMAGE.matches(&path) {
            image.push(path);
        }
    }

    match (single(audio), single(image)) {
        (Ok(audio), Ok(image)) => {
            info!("Selected audio file {}", audio.display());
            info!("Selected image file {}", image.display());
            Some(ShowFiles { audio, image })
        }
        (audio, image) => {
            warn!(
                folder = %folder.display(),
                audio = audio.err().unwrap_or(1),
                image = image.err().unwrap_or(1),
                "Expected exactly one .mp3 and one .jpg"
            );
            None
        }
    }
}

/// The only element, or the number of elements found.
fn single(mut found: Vec<PathBuf>) -> Result<PathBuf, usize> {
    if found.len() == 1 {
        Ok(found.remove(0))
    } else {
        Err(found.len())
    }
}
