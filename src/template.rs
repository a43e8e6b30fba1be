// src/template.rs

//! Build-script templating.
//!
//! The build script is opaque text with four recognised placeholders:
//!
//! | placeholder  | value                                        |
//! |--------------|----------------------------------------------|
//! | `{filepath}` | absolute path of the source document         |
//! | `{filename}` | file name without extension                  |
//! | `{fileext}`  | extension without the leading dot            |
//! | `{dirpath}`  | absolute path of the containing directory    |
//!
//! Substitution is a single left-to-right scan over the template. Text that
//! was inserted for one placeholder is never scanned again, so the result does
//! not depend on the order the placeholders are listed in, and a value that
//! happens to contain `{dirpath}` is emitted literally.

use std::path::{Path, PathBuf};

/// Absolute paths derived from the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_ext: String,
    pub dir_path: PathBuf,
}

impl DocumentPaths {
    /// Derive the substitution values for `document`.
    ///
    /// Returns `None` if the path has no file name or no parent directory
    /// (e.g. `/`). Relative paths are resolved against the current directory.
    pub fn from_document(document: &Path) -> Option<Self> {
        let file_path = if document.is_absolute() {
            document.to_path_buf()
        } else {
            std::env::current_dir().ok()?.join(document)
        };

        let dir_path = file_path.parent()?.to_path_buf();
        let file_name = file_path.file_stem()?.to_string_lossy().into_owned();
        let file_ext = file_path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();

        Some(Self {
            file_path,
            file_name,
            file_ext,
            dir_path,
        })
    }

    /// Path of the derived artifact: the document path with its extension
    /// replaced by `extension`.
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        self.file_path.with_extension(extension)
    }

    fn value_for(&self, placeholder: Placeholder) -> String {
        match placeholder {
            Placeholder::FilePath => self.file_path.to_string_lossy().into_owned(),
            Placeholder::FileName => self.file_name.clone(),
            Placeholder::FileExt => self.file_ext.clone(),
            Placeholder::DirPath => self.dir_path.to_string_lossy().into_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    FilePath,
    FileName,
    FileExt,
    DirPath,
}

impl Placeholder {
    const ALL: [(Placeholder, &'static str); 4] = [
        (Placeholder::FilePath, "{filepath}"),
        (Placeholder::FileName, "{filename}"),
        (Placeholder::FileExt, "{fileext}"),
        (Placeholder::DirPath, "{dirpath}"),
    ];

    fn match_at(text: &str) -> Option<(Placeholder, usize)> {
        Self::ALL
            .iter()
            .find(|(_, token)| text.starts_with(token))
            .map(|(placeholder, token)| (*placeholder, token.len()))
    }
}

/// Immutable script text with placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    text: String,
}

impl ScriptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Substitute all placeholders with values from `paths`.
    pub fn render(&self, paths: &DocumentPaths) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(idx) = rest.find('{') {
            out.push_str(&rest[..idx]);
            rest = &rest[idx..];

            match Placeholder::match_at(rest) {
                Some((placeholder, len)) => {
                    out.push_str(&paths.value_for(placeholder));
                    rest = &rest[len..];
                }
                None => {
                    out.push('{');
                    rest = &rest[1..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// True if a rendered script has nothing to run.
pub fn is_blank_script(script: &str) -> bool {
    script.trim().is_empty()
}
