//! Fakes shared by tests across modules.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::IntrospectError;
use crate::introspect::{FaceInfo, FaceIntrospector};

/// Introspector answering from a table keyed by file name. Unknown files
/// fail with a parse error.
#[derive(Default)]
pub struct FixedIntrospector {
    answers: Mutex<HashMap<String, Vec<FaceInfo>>>,
}

impl FixedIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, file_name: &str, faces: &[(u32, &str, &str)]) -> Self {
        self.set(file_name, faces);
        self
    }

    pub fn set(&self, file_name: &str, faces: &[(u32, &str, &str)]) {
        let faces = faces
            .iter()
            .map(|(index, family, style)| FaceInfo::new(*index, *family).with_style(*style))
            .collect();
        self.answers
            .lock()
            .unwrap()
            .insert(file_name.to_string(), faces);
    }

    pub fn forget(&self, file_name: &str) {
        self.answers.lock().unwrap().remove(file_name);
    }
}

impl FaceIntrospector for FixedIntrospector {
    fn describe(&self, path: &Path) -> Result<Vec<FaceInfo>, IntrospectError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.answers
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .ok_or_else(|| IntrospectError::Parse(format!("not a font: {}", name)))
    }
}
