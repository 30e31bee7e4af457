use crate::error::ConfigError;
use git2::Repository as Git2Repo;
use std::path::Path;
use tracing::debug;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open the repository at `path`, bare or not
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let repo = Git2Repo::open(path).map_err(|e| {
            ConfigError::Repository(format!("{}: {}", path.display(), e.message()))
        })?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }
}

impl super::Repository for Git2Repository {
    fn read_file_at(&self, ref_name: &str, path: &str) -> Result<Vec<u8>, ConfigError> {
        let not_found = || ConfigError::ScriptNotFound {
            file: path.to_string(),
            ref_name: ref_name.to_string(),
        };

        let spec = format!("{}:{}", ref_name, path);
        let object = self.repo.revparse_single(&spec).map_err(|e| {
            debug!(spec = %spec, error = %e.message(), "revparse failed");
            not_found()
        })?;

        let blob = object.into_blob().map_err(|object| {
            debug!(spec = %spec, kind = ?object.kind(), "not a blob");
            not_found()
        })?;

        Ok(blob.content().to_vec())
    }
}
