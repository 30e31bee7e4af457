use crate::error::ConfigError;
use crate::git::Repository;
use std::cell::RefCell;
use std::collections::HashMap;

/// Mock repository for testing without actual git operations
pub struct MockRepository {
    files: HashMap<(String, String), Vec<u8>>,
    reads: RefCell<Vec<(String, String)>>,
}

impl MockRepository {
    /// Create a new empty mock repository
    pub fn new() -> Self {
        MockRepository {
            files: HashMap::new(),
            reads: RefCell::new(Vec::new()),
        }
    }

    /// Record `content` for `path` at `ref_name`
    pub fn add_file(
        &mut self,
        ref_name: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) {
        self.files
            .insert((ref_name.into(), path.into()), content.into());
    }

    /// Every `(ref, path)` pair read so far, in order
    pub fn reads(&self) -> Vec<(String, String)> {
        self.reads.borrow().clone()
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn read_file_at(&self, ref_name: &str, path: &str) -> Result<Vec<u8>, ConfigError> {
        self.reads
            .borrow_mut()
            .push((ref_name.to_string(), path.to_string()));

        self.files
            .get(&(ref_name.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| ConfigError::ScriptNotFound {
                file: path.to_string(),
                ref_name: ref_name.to_string(),
            })
    }
}
