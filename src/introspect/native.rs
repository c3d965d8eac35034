//! In-process introspection of sfnt fonts and collections.

use std::fs;
use std::path::Path;

use read_fonts::tables::name::NameId;
use read_fonts::{FontRef, TableProvider};

use super::{FaceInfo, FaceIntrospector};
use crate::error::IntrospectError;
use crate::scanner::FontFormat;

/// OS/2 fsSelection bits.
const FS_SELECTION_ITALIC: u16 = 1 << 0;
const FS_SELECTION_OBLIQUE: u16 = 1 << 9;

/// Parses TrueType/OpenType files and collections with `read-fonts`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeIntrospector;

impl NativeIntrospector {
    pub fn new() -> Self {
        Self
    }
}

impl FaceIntrospector for NativeIntrospector {
    fn describe(&self, path: &Path) -> Result<Vec<FaceInfo>, IntrospectError> {
        match FontFormat::from_path(path) {
            Some(format) if !format.is_web_only() => {}
            Some(format) => {
                return Err(IntrospectError::Unsupported(format.extension().to_string()))
            }
            None => return Err(IntrospectError::Unsupported(path.display().to_string())),
        }

        let data = fs::read(path)?;
        let fallback_family = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut faces = Vec::new();
        for font in FontRef::fonts(&data) {
            let font = font.map_err(|e| IntrospectError::Parse(e.to_string()))?;
            let index = font.ttc_index().unwrap_or(0);
            faces.push(describe_face(&font, index, &fallback_family));
        }

        if faces.is_empty() {
            return Err(IntrospectError::Parse("no faces found".to_string()));
        }
        Ok(faces)
    }
}

fn describe_face(font: &FontRef, index: u32, fallback_family: &str) -> FaceInfo {
    let names = FaceNames::read(font);

    let family_name = names
        .typographic_family
        .or(names.family)
        .unwrap_or_else(|| fallback_family.to_string());
    let style_name = names.typographic_subfamily.or(names.subfamily);

    let (weight, width, selection) = match font.os2() {
        Ok(os2) => (
            Some(f64::from(os2.us_weight_class())),
            Some(f64::from(os2.us_width_class())),
            os2.fs_selection().bits(),
        ),
        Err(_) => (None, None, 0),
    };
    let slant = font
        .post()
        .ok()
        .map(|post| post.italic_angle().to_f64())
        .filter(|angle| *angle != 0.0);
    let italic = selection & (FS_SELECTION_ITALIC | FS_SELECTION_OBLIQUE) != 0 || slant.is_some();

    FaceInfo {
        index,
        family_name,
        full_name: names.full,
        postscript_name: names.postscript,
        style_name,
        weight,
        width,
        slant,
        italic,
        variable: font.fvar().is_ok(),
    }
}

#[derive(Default)]
struct FaceNames {
    family: Option<String>,
    subfamily: Option<String>,
    typographic_family: Option<String>,
    typographic_subfamily: Option<String>,
    full: Option<String>,
    postscript: Option<String>,
}

impl FaceNames {
    fn read(font: &FontRef) -> Self {
        let mut names = FaceNames::default();
        let Ok(name_table) = font.name() else {
            return names;
        };
        let data = name_table.string_data();

        for record in name_table.name_record() {
            if !record.is_unicode() {
                continue;
            }
            let slot = match record.name_id() {
                NameId::FAMILY_NAME => &mut names.family,
                NameId::SUBFAMILY_NAME => &mut names.subfamily,
                NameId::TYPOGRAPHIC_FAMILY_NAME => &mut names.typographic_family,
                NameId::TYPOGRAPHIC_SUBFAMILY_NAME => &mut names.typographic_subfamily,
                NameId::FULL_NAME => &mut names.full,
                NameId::POSTSCRIPT_NAME => &mut names.postscript,
                _ => continue,
            };
            if slot.is_some() {
                continue;
            }
            if let Ok(entry) = record.string(data) {
                let rendered = entry.to_string();
                let trimmed = rendered.trim();
                if !trimmed.is_empty() {
                    *slot = Some(trimmed.to_string());
                }
            }
        }

        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_web_formats_are_unsupported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Sans.woff2");
        fs::write(&path, b"wOF2").unwrap();

        let err = NativeIntrospector::new().describe(&path).unwrap_err();
        assert!(matches!(err, IntrospectError::Unsupported(_)));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Broken.ttf");
        fs::write(&path, b"definitely not a font").unwrap();

        let err = NativeIntrospector::new().describe(&path).unwrap_err();
        assert!(matches!(err, IntrospectError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = NativeIntrospector::new()
            .describe(&dir.path().join("Gone.otf"))
            .unwrap_err();
        assert!(matches!(err, IntrospectError::Io(_)));
    }
}
