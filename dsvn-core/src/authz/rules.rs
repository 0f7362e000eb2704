//! Access rights bitset and the per-section rule filter (spec §3, §4.3).

use std::collections::HashSet;

use super::config::Config;

/// A bitset over `{read, write}`. `recursive` is a query modifier, never
/// stored here (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rights(u8);

impl Rights {
    pub const NONE: Rights = Rights(0);
    pub const READ: Rights = Rights(1 << 0);
    pub const WRITE: Rights = Rights(1 << 1);

    pub fn contains(self, required: Rights) -> bool {
        self & required == required
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a value string drawn from `{'r', 'w'} + whitespace` (spec §3).
    /// Any other non-whitespace byte is a validation error.
    pub fn parse(value: &str) -> Result<Rights, char> {
        let mut rights = Rights::NONE;
        for ch in value.chars() {
            match ch {
                'r' => rights = rights | Rights::READ,
                'w' => rights = rights | Rights::WRITE,
                c if c.is_whitespace() => {}
                c => return Err(c),
            }
        }
        Ok(rights)
    }
}

impl std::ops::BitOr for Rights {
    type Output = Rights;
    fn bitor(self, rhs: Rights) -> Rights {
        Rights(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Rights {
    fn bitor_assign(&mut self, rhs: Rights) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for Rights {
    type Output = Rights;
    fn bitand(self, rhs: Rights) -> Rights {
        Rights(self.0 & rhs.0)
    }
}

impl std::ops::BitAndAssign for Rights {
    fn bitand_assign(&mut self, rhs: Rights) {
        self.0 &= rhs.0;
    }
}

/// One `(path, rights)` pair emitted by the rule filter for a section that
/// applied to the current `(repo, identities)` tuple.
#[derive(Debug, Clone)]
pub struct FilteredRule {
    pub path: String,
    pub rights: Rights,
}

/// Collapse every path-rule section in `config` that applies to `repo`
/// against `identities` into a sequence of `(path, rights)` pairs (spec §4.3).
///
/// A section applies when:
/// - its name has no `repo:` prefix and `repo` is empty, or
/// - its name's `repo:` prefix matches `repo` exactly.
///
/// Within an applying section, every entry whose key matches the identity
/// set (XOR a leading `~` inversion) contributes its rights via OR; a
/// section with zero matching entries is skipped entirely.
pub fn filter_rules(config: &dyn Config, repo: &str, identities: &HashSet<String>) -> Vec<FilteredRule> {
    let mut out = Vec::new();

    config.enumerate_sections(&mut |name| {
        if let Some(rights) = filter_section(config, name, repo, identities) {
            out.push(rights);
        }
        true
    });

    out
}

fn filter_section(
    config: &dyn Config,
    name: &str,
    repo: &str,
    identities: &HashSet<String>,
) -> Option<FilteredRule> {
    let path_part = match name.split_once(':') {
        Some((repo_prefix, path_part)) => {
            if repo_prefix != repo {
                return None;
            }
            path_part
        }
        None => name,
    };

    if !path_part.starts_with('/') {
        // Not a path rule (e.g. `groups`, `aliases`, or an unknown section).
        return None;
    }

    let mut accumulator = Rights::NONE;
    let mut matched_any = false;

    config.enumerate_entries(name, &mut |key, value| {
        let (inverted, subject) = match key.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, key),
        };
        let matches = identities.contains(subject);
        if matches != inverted {
            matched_any = true;
            // Validation guarantees `value` contains only {'r', 'w', whitespace}.
            accumulator |= Rights::parse(value).unwrap_or(Rights::NONE);
        }
        true
    });

    if matched_any {
        Some(FilteredRule {
            path: path_part.to_string(),
            rights: accumulator,
        })
    } else {
        None
    }
}
