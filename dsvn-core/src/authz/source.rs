//! Retrieval collaborator interface (spec §6): where rules-file bytes come
//! from. The engine itself never touches a filesystem or repository
//! directly — `Authz::load` goes through a `RuleSource`.

use std::path::Path;

use super::error::{AuthzError, Result};

/// Fetches rules-file text given a locator string (a filesystem path today;
/// a `repo-url:path` locator is a natural future extension, see DESIGN.md).
pub trait RuleSource {
    fn read_rules(&self, locator: &str) -> Result<String>;
}

/// Reads rules files directly off the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRuleSource;

impl RuleSource for FsRuleSource {
    fn read_rules(&self, locator: &str) -> Result<String> {
        let path = Path::new(locator);
        if !path.is_file() {
            return Err(AuthzError::BadTarget(locator.to_string()));
        }
        std::fs::read_to_string(path).map_err(|source| AuthzError::Io {
            path: locator.to_string(),
            source,
        })
    }
}
