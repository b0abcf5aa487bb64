use std::path::PathBuf;

/// Every file a run reads or writes, rooted at the working directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("syllabi.json")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.base.join("downloads")
    }

    pub fn report_file(&self) -> PathBuf {
        self.base.join("missing_syllabi_report.md")
    }

    pub fn log_file(&self) -> PathBuf {
        self.base.join("run.log")
    }

    pub fn browser_profile_dir(&self) -> PathBuf {
        self.base.join("browser-profile")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_rooted_at_base() {
        let paths = Paths::with_base(PathBuf::from("/tmp/harvest"));
        assert_eq!(paths.downloads_dir(), PathBuf::from("/tmp/harvest/downloads"));
        assert_eq!(
            paths.report_file(),
            PathBuf::from("/tmp/harvest/missing_syllabi_report.md")
        );
        assert_eq!(paths.log_file(), PathBuf::from("/tmp/harvest/run.log"));
    }
}
