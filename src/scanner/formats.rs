//! Supported font container formats.

use std::path::Path;

/// Font container formats the catalog accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFormat {
    TrueType,
    OpenType,
    TrueTypeCollection,
    OpenTypeCollection,
    Woff,
    Woff2,
}

impl FontFormat {
    pub const ALL: [FontFormat; 6] = [
        FontFormat::TrueType,
        FontFormat::OpenType,
        FontFormat::TrueTypeCollection,
        FontFormat::OpenTypeCollection,
        FontFormat::Woff,
        FontFormat::Woff2,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ttf" => Some(FontFormat::TrueType),
            "otf" => Some(FontFormat::OpenType),
            "ttc" => Some(FontFormat::TrueTypeCollection),
            "otc" => Some(FontFormat::OpenTypeCollection),
            "woff" => Some(FontFormat::Woff),
            "woff2" => Some(FontFormat::Woff2),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FontFormat::TrueType => "ttf",
            FontFormat::OpenType => "otf",
            FontFormat::TrueTypeCollection => "ttc",
            FontFormat::OpenTypeCollection => "otc",
            FontFormat::Woff => "woff",
            FontFormat::Woff2 => "woff2",
        }
    }

    /// Whether the OS can register files of this format as system fonts.
    pub fn install_supported(&self) -> bool {
        !self.is_web_only()
    }

    /// Every accepted format can be previewed in-app.
    pub fn preview_supported(&self) -> bool {
        true
    }

    pub fn is_web_only(&self) -> bool {
        matches!(self, FontFormat::Woff | FontFormat::Woff2)
    }
}
