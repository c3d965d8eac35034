//! Face introspection collaborators.
//!
//! The scanner never parses fonts itself. It asks a [`FaceIntrospector`] for
//! the faces inside a file and treats any failure as a per-file error.

#[cfg(feature = "native")]
pub mod native;
pub mod rpc;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::IntrospectError;

#[cfg(feature = "native")]
pub use native::NativeIntrospector;
pub use rpc::RpcIntrospector;

/// One face reported by an introspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceInfo {
    /// Index of the face within a collection file; 0 for single-face files.
    #[serde(default)]
    pub index: u32,
    pub family_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub postscript_name: Option<String>,
    #[serde(default)]
    pub style_name: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub slant: Option<f64>,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub variable: bool,
}

impl FaceInfo {
    pub fn new(index: u32, family_name: impl Into<String>) -> Self {
        Self {
            index,
            family_name: family_name.into(),
            full_name: None,
            postscript_name: None,
            style_name: None,
            weight: None,
            width: None,
            slant: None,
            italic: false,
            variable: false,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style_name = Some(style.into());
        self
    }
}

/// Extracts per-face metadata from a font file.
///
/// Implementations must be callable from several scanner workers at once.
pub trait FaceIntrospector: Send + Sync {
    fn describe(&self, path: &Path) -> Result<Vec<FaceInfo>, IntrospectError>;
}
