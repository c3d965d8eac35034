use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use super::formats::FontFormat;

/// What a directory walk found.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Supported font files, sorted by path.
    pub fonts: Vec<PathBuf>,
    /// Entries the walk could not read. Files below them are unaccounted
    /// for, not gone.
    pub unreadable: Vec<PathBuf>,
}

impl Discovery {
    /// True when `path` lies at or below an entry the walk could not read.
    pub fn is_unreadable(&self, path: &Path) -> bool {
        self.unreadable.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Recursively collect every supported font file under `directory`.
///
/// Symlinked font files are always picked up; `follow_symlinks` only decides
/// whether symlinked directories are descended into. A missing root yields
/// an empty result so the caller's missing-file detection can take over.
pub fn discover_fonts(directory: &Path, follow_symlinks: bool) -> Discovery {
    let mut discovery = Discovery::default();

    for entry in WalkDir::new(directory).follow_links(follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.io_error().map(|io| io.kind()) == Some(io::ErrorKind::NotFound) {
                    continue;
                }
                let path = e.path().unwrap_or(directory).to_path_buf();
                warn!("Could not read {}: {}", path.display(), e);
                discovery.unreadable.push(path);
                continue;
            }
        };

        if entry.path().is_file() && FontFormat::from_path(entry.path()).is_some() {
            discovery.fonts.push(entry.path().to_path_buf());
        }
    }

    // Sort by path for consistent ordering
    discovery.fonts.sort();

    discovery
}
