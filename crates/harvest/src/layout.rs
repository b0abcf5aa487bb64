use std::path::{Path, PathBuf};

use crate::sanitize::sanitize_filename;

/// Extension assumed when the URL has none, and for the pre-download probe.
pub const DEFAULT_EXTENSION: &str = ".pdf";

/// Where downloaded syllabi land: `<root>/<semester>/<category>/<course>.<ext>`.
#[derive(Debug, Clone)]
pub struct DownloadLayout {
    root: PathBuf,
}

impl DownloadLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, semester: &str, category: &str) -> PathBuf {
        self.root
            .join(sanitize_filename(semester.trim()))
            .join(sanitize_filename(category.trim()))
    }

    /// The existence probe always assumes a PDF, whatever the real extension
    /// turns out to be. A previously saved non-PDF file is fetched again.
    pub fn probe_path(&self, dir: &Path, course: &str) -> PathBuf {
        self.file_path(dir, course, DEFAULT_EXTENSION)
    }

    pub fn file_path(&self, dir: &Path, course: &str, ext: &str) -> PathBuf {
        dir.join(format!("{}{}", sanitize_filename(course), ext))
    }
}

/// Extension (with the dot) of the last path segment of `url`, or `.pdf`.
///
/// Only the path is considered; query strings such as presigned-URL
/// signatures are ignored. Leading dots do not start an extension.
pub fn url_extension(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let stem_start = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name[stem_start..].rfind('.') {
        Some(dot) => {
            let ext = &file_name[stem_start + dot..];
            if ext.len() > 1 {
                ext.to_string()
            } else {
                DEFAULT_EXTENSION.to_string()
            }
        }
        None => DEFAULT_EXTENSION.to_string(),
    }
}
