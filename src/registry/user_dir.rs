//! Registration by linking into a per-user font directory.
//!
//! fontconfig on Linux and CoreText on macOS both pick up fonts placed in the
//! user's font directory, so a link there is a registration.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::FontRegistry;
use crate::error::RegistryError;

/// Number of hex digits of the path digest kept in a link name.
const LINK_DIGEST_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct UserFontDirRegistry {
    font_dir: PathBuf,
}

impl UserFontDirRegistry {
    pub fn new(font_dir: impl Into<PathBuf>) -> Self {
        Self {
            font_dir: font_dir.into(),
        }
    }

    /// `<platform user font dir>/fontshelf`.
    pub fn default_location() -> Result<Self, RegistryError> {
        let base = dirs::font_dir().ok_or(RegistryError::NoFontDir)?;
        Ok(Self::new(base.join("fontshelf")))
    }

    pub fn font_dir(&self) -> &Path {
        &self.font_dir
    }

    /// Where the registration for `path` lives.
    pub fn link_path(&self, path: &Path) -> PathBuf {
        let hex = format!("{:x}", Sha256::digest(path.to_string_lossy().as_bytes()));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.font_dir
            .join(format!("{}-{}", &hex[..LINK_DIGEST_LEN], file_name))
    }

    fn io_error(path: &Path, source: io::Error) -> RegistryError {
        RegistryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl FontRegistry for UserFontDirRegistry {
    fn register(&self, path: &Path) -> Result<(), RegistryError> {
        let link = self.link_path(path);
        if fs::symlink_metadata(&link).is_ok() {
            return Ok(());
        }

        fs::create_dir_all(&self.font_dir).map_err(|e| Self::io_error(&self.font_dir, e))?;
        link_font(path, &link).map_err(|e| Self::io_error(path, e))?;
        debug!("Registered {} as {}", path.display(), link.display());
        Ok(())
    }

    fn unregister(&self, path: &Path) -> Result<(), RegistryError> {
        let link = self.link_path(path);
        match fs::remove_file(&link) {
            Ok(()) => {
                debug!("Unregistered {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&link, e)),
        }
    }

    fn is_registered(&self, path: &Path) -> Result<bool, RegistryError> {
        let link = self.link_path(path);
        match fs::symlink_metadata(&link) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(&link, e)),
        }
    }
}

#[cfg(unix)]
fn link_font(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link_font(target: &Path, link: &Path) -> io::Result<()> {
    fs::copy(target, link).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_register_round_trip() {
        let dir = tempdir().unwrap();
        let font = dir.path().join("Serif.ttf");
        fs::write(&font, b"font").unwrap();
        let registry = UserFontDirRegistry::new(dir.path().join("fonts"));

        assert!(!registry.is_registered(&font).unwrap());
        registry.register(&font).unwrap();
        assert!(registry.is_registered(&font).unwrap());
        // Second register is a no-op
        registry.register(&font).unwrap();

        registry.unregister(&font).unwrap();
        assert!(!registry.is_registered(&font).unwrap());
        // Unregistering again is fine too
        registry.unregister(&font).unwrap();
    }

    #[test]
    fn test_same_file_name_in_different_dirs_does_not_collide() {
        let registry = UserFontDirRegistry::new("/tmp/fonts");
        let a = registry.link_path(Path::new("/a/Serif.ttf"));
        let b = registry.link_path(Path::new("/b/Serif.ttf"));

        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with("-Serif.ttf"));
    }

    #[test]
    fn test_link_name_is_hex_digest_prefix() {
        let registry = UserFontDirRegistry::new("/tmp/fonts");
        let link = registry.link_path(Path::new("/a/Serif.ttf"));
        let name = link.file_name().unwrap().to_string_lossy().to_string();
        let (prefix, rest) = name.split_at(LINK_DIGEST_LEN);

        assert_eq!(rest, "-Serif.ttf");
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        let full = format!("{:x}", Sha256::digest(b"/a/Serif.ttf"));
        assert!(full.starts_with(prefix));
    }

    #[cfg(unix)]
    #[test]
    fn test_registration_survives_source_removal_until_unregistered() {
        let dir = tempdir().unwrap();
        let font = dir.path().join("Gone.otf");
        fs::write(&font, b"font").unwrap();
        let registry = UserFontDirRegistry::new(dir.path().join("fonts"));

        registry.register(&font).unwrap();
        fs::remove_file(&font).unwrap();

        // A dangling link is still a registration the catalog must remove.
        assert!(registry.is_registered(&font).unwrap());
        registry.unregister(&font).unwrap();
        assert!(!registry.is_registered(&font).unwrap());
    }
}
