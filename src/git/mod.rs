//! Read-only access to the pushed repository
//!
//! The deployment only ever needs one thing from git: the bytes of a single
//! file as recorded at a given ref. That is what the [Repository] trait
//! abstracts, so the orchestrator can be tested without a real repository.
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: A mock implementation for testing
//!
//! ```rust
//! # use sieve_git_pushdeploy::git::Repository;
//! # fn example<R: Repository>(repo: &R) -> Result<(), Box<dyn std::error::Error>> {
//! let script = repo.read_file_at("refs/heads/master", "main.sieve")?;
//! println!("{} bytes", script.len());
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::ConfigError;

/// Source of file contents at a given ref
pub trait Repository {
    /// Get the full content of `path` as recorded at `ref_name`
    ///
    /// Equivalent to `git show <ref_name>:<path>`. The working tree is never
    /// consulted.
    ///
    /// # Arguments
    /// * `ref_name` - A ref, branch, tag or commit id (e.g. "refs/heads/master")
    /// * `path` - Path of the file relative to the repository root
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - The complete file content
    /// * `Err(ConfigError::ScriptNotFound)` - If the ref or the file does not
    ///   exist, or the path names something other than a file
    fn read_file_at(&self, ref_name: &str, path: &str) -> Result<Vec<u8>, ConfigError>;
}
