//! Path-based authorization engine.
//!
//! Decides whether a user may read or write a path within a named
//! repository, based on a declarative, SVN-style rules file: flattens
//! users/aliases/groups into an identity set, filters the rules file down to
//! the sections that apply, compiles the result into a segment-indexed
//! prefix tree, and answers access queries over that tree in time
//! proportional to the query path's depth.
//!
//! ```
//! use dsvn_core::authz::{Authz, Rights};
//!
//! let authz = Authz::parse("[/]\n* = r\n[/trunk]\nalice = rw\n", None).unwrap();
//! assert!(authz.check_access(None, Some("/trunk"), Some("alice"), Rights::WRITE, false).unwrap());
//! assert!(!authz.check_access(None, Some("/"), Some("alice"), Rights::WRITE, false).unwrap());
//! ```

mod config;
mod error;
mod identity;
mod rules;
mod source;
mod tree;
mod validate;

pub use config::{Config, RulesConfig};
pub use error::{AuthzError, Result};
pub use rules::Rights;
pub use source::{FsRuleSource, RuleSource};
pub use tree::{Node, Tree};

use std::path::Path;

use tracing::debug;

/// A loaded, validated rules document, ready to answer access queries.
///
/// Cheap to clone-share behind an `Arc`: the underlying `RulesConfig` is
/// immutable once loaded, and `check_access` compiles a fresh tree per call
/// (spec §5 leaves tree caching to the caller).
#[derive(Debug, Clone)]
pub struct Authz {
    config: RulesConfig,
}

impl Authz {
    /// Load a rules file (and optional separate groups file) from disk,
    /// validating it before returning.
    ///
    /// If `must_exist` is `false` and the main rules file does not exist,
    /// returns an `Authz` with no rules (deny-all for every query) instead
    /// of an error.
    pub fn load(path: &Path, groups_path: Option<&Path>, must_exist: bool) -> Result<Self> {
        let source = FsRuleSource;
        let locator = path.to_string_lossy().into_owned();

        let main_text = match source.read_rules(&locator) {
            Ok(text) => text,
            Err(AuthzError::BadTarget(_)) if !must_exist => String::new(),
            Err(e) => return Err(e),
        };

        let groups_text = match groups_path {
            Some(p) => Some(source.read_rules(&p.to_string_lossy())?),
            None => None,
        };

        Self::parse(&main_text, groups_text.as_deref())
    }

    /// Parse a rules document (and optional separate groups document) from
    /// in-memory strings, validating it before returning.
    pub fn parse(main: &str, groups: Option<&str>) -> Result<Self> {
        let config = RulesConfig::parse_merged(main, groups)?;
        validate::validate(&config)?;
        Ok(Authz { config })
    }

    /// `check_access(repo_name, path, user, required, recursive)` — spec §4.7.
    ///
    /// - `repo_name` absent is treated as `""` (matches only rules with no
    ///   `repo:` prefix).
    /// - `path` absent answers "does the user have *any* access anywhere in
    ///   the repo" via the root's `max_rights`.
    /// - `path` present must start with `/`, or this returns
    ///   `AuthzError::InvalidPath`.
    pub fn check_access(
        &self,
        repo_name: Option<&str>,
        path: Option<&str>,
        user: Option<&str>,
        required: Rights,
        recursive: bool,
    ) -> Result<bool> {
        let repo = repo_name.unwrap_or("");
        let identities = identity::identity_set(&self.config, user);
        let filtered = rules::filter_rules(&self.config, repo, &identities);
        let compiled = tree::Tree::build(&filtered);

        debug!(repo, user, path, ?required, recursive, "authz check_access");

        match path {
            None => Ok(compiled.root.max_rights.contains(required)),
            Some(p) => {
                let stripped = p
                    .strip_prefix('/')
                    .ok_or_else(|| AuthzError::InvalidPath(p.to_string()))?;
                Ok(compiled.check_access(stripped, required, recursive))
            }
        }
    }
}
