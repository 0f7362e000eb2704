//! Read-only view over a parsed rules document, and the small INI-style
//! parser that produces one from raw text.
//!
//! The engine core (identity resolution, rule filtering, tree building,
//! validation) depends only on the [`Config`] trait below, never on
//! [`RulesConfig`] directly — any other source of sections/entries can be
//! substituted without touching the rest of `authz`.

use super::error::{AuthzError, Result};

/// Read-only view over a parsed rules document (spec §4.1).
pub trait Config {
    /// Does a section with this exact name exist?
    fn has_section(&self, name: &str) -> bool;

    /// Call `visitor` for each section name in file order; stop early if
    /// `visitor` returns `false`.
    fn enumerate_sections(&self, visitor: &mut dyn FnMut(&str) -> bool);

    /// Call `visitor` for each `(key, value)` entry in `section`, in file
    /// order; stop early if `visitor` returns `false`. No-op if the section
    /// does not exist.
    fn enumerate_entries(&self, section: &str, visitor: &mut dyn FnMut(&str, &str) -> bool);

    /// Look up a single entry's value.
    fn get(&self, section: &str, key: &str) -> Option<&str>;
}

/// One `[section]` and its ordered `key = value` entries.
#[derive(Debug, Clone)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

/// A rules document parsed from INI-style text (spec §6).
///
/// Preserves section and entry order; the engine never relies on order for
/// correctness (spec §5), but deterministic iteration makes validation error
/// messages reproducible.
#[derive(Debug, Clone, Default)]
pub struct RulesConfig {
    sections: Vec<Section>,
}

impl RulesConfig {
    /// Parse a single document with no separate groups file.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_merged(text, None)
    }

    /// Parse a main document and an optional separate groups document,
    /// enforcing the split described in spec §6: when `groups` is present,
    /// `main` must not itself define `[groups]`.
    pub fn parse_merged(main: &str, groups: Option<&str>) -> Result<Self> {
        let mut sections = parse_sections(main)?;

        if let Some(groups_text) = groups {
            if sections.iter().any(|s| s.name == "groups") {
                return Err(AuthzError::InvalidConfig(
                    "Authz file cannot contain any groups when global groups are being used"
                        .to_string(),
                ));
            }
            let mut groups_sections = parse_sections(groups_text)?;
            groups_sections.extend(sections);
            sections = groups_sections;
        }

        Ok(Self { sections })
    }
}

impl Config for RulesConfig {
    fn has_section(&self, name: &str) -> bool {
        self.sections.iter().any(|s| s.name == name)
    }

    fn enumerate_sections(&self, visitor: &mut dyn FnMut(&str) -> bool) {
        for section in &self.sections {
            if !visitor(&section.name) {
                break;
            }
        }
    }

    fn enumerate_entries(&self, section: &str, visitor: &mut dyn FnMut(&str, &str) -> bool) {
        let Some(section) = self.sections.iter().find(|s| s.name == section) else {
            return;
        };
        for (key, value) in &section.entries {
            if !visitor(key, value) {
                break;
            }
        }
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        let section = self.sections.iter().find(|s| s.name == section)?;
        section
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Tokenize raw text into an ordered section list.
///
/// Format: `[name]` section headers, `key = value` entries, `#`/`;` line
/// comments, blank lines ignored. Case-sensitive, no interpolation.
fn parse_sections(text: &str) -> Result<Vec<Section>> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<Section> = None;

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(Section {
                name: name.to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        let Some(section) = current.as_mut() else {
            return Err(AuthzError::InvalidConfig(format!(
                "line {}: entry outside of any section: {}",
                lineno + 1,
                raw_line
            )));
        };

        let mut parts = line.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            return Err(AuthzError::InvalidConfig(format!(
                "line {}: malformed entry: {}",
                lineno + 1,
                raw_line
            )));
        }

        section.entries.push((key.to_string(), value.to_string()));
    }

    if let Some(section) = current.take() {
        sections.push(section);
    }

    Ok(sections)
}
