//! Static structural validation of a rules document (spec §4.6, §7).
//!
//! Best-effort: proves rules are *referable*, not that they are
//! semantically useful. Reports the first error found.

use std::collections::HashSet;

use super::config::Config;
use super::error::{AuthzError, Result};
use super::rules::Rights;

/// Run every check in spec §4.6 against `config`, returning the first error.
pub fn validate(config: &dyn Config) -> Result<()> {
    validate_groups(config)?;
    validate_path_rule_sections(config)?;
    Ok(())
}

/// `[groups]`: every `@group` token must name a defined group (and must not
/// form a cycle); every `&alias` token must name a defined alias.
fn validate_groups(config: &dyn Config) -> Result<()> {
    let mut defined: HashSet<String> = HashSet::new();
    config.enumerate_entries("groups", &mut |name, _| {
        defined.insert(name.to_string());
        true
    });

    for group in &defined {
        let mut chain = Vec::new();
        check_group_cycle(config, group, &defined, &mut chain)?;
    }

    let mut result = Ok(());
    config.enumerate_entries("groups", &mut |group_name, member_list| {
        for token in member_list.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Some(group) = token.strip_prefix('@') {
                if !defined.contains(group) {
                    result = Err(AuthzError::InvalidConfig(format!(
                        "group '{group_name}' references undefined group '@{group}'"
                    )));
                    return false;
                }
            } else if let Some(alias) = token.strip_prefix('&') {
                if config.get("aliases", alias).is_none() {
                    result = Err(AuthzError::InvalidConfig(format!(
                        "group '{group_name}' references undefined alias '&{alias}'"
                    )));
                    return false;
                }
            }
        }
        true
    });

    result
}

/// Depth-first walk over `@group` membership, tracking the chain of groups
/// visited so far so that a repeat can be reported as the full cycle (every
/// group involved), not just the one group whose revisit happened to trip
/// the detection (spec §8 scenario 6: the error must name both groups).
fn check_group_cycle(
    config: &dyn Config,
    group: &str,
    defined: &HashSet<String>,
    chain: &mut Vec<String>,
) -> Result<()> {
    if let Some(start) = chain.iter().position(|g| g == group) {
        let mut cycle: Vec<String> = chain[start..].iter().map(|g| format!("'{g}'")).collect();
        cycle.push(format!("'{group}'"));
        return Err(AuthzError::InvalidConfig(format!(
            "circular dependency: {}",
            cycle.join(" -> ")
        )));
    }

    chain.push(group.to_string());

    let members = config.get("groups", group);
    if let Some(members) = members {
        for token in members.split(',') {
            let token = token.trim();
            if let Some(parent) = token.strip_prefix('@') {
                if defined.contains(parent) {
                    check_group_cycle(config, parent, defined, chain)?;
                }
            }
        }
    }

    chain.pop();
    Ok(())
}

/// Path-rule sections: canonical path, valid entry keys, valid entry values.
fn validate_path_rule_sections(config: &dyn Config) -> Result<()> {
    let mut groups: HashSet<String> = HashSet::new();
    config.enumerate_entries("groups", &mut |name, _| {
        groups.insert(name.to_string());
        true
    });

    // Two sections resolving to the same (repo, path) is an authoring error
    // (spec §4.4 step 2, §7): reject it here, at load time, rather than
    // leaving the tree builder to discover the collision on every query.
    let mut seen_paths: HashSet<String> = HashSet::new();
    let mut result = Ok(());
    config.enumerate_sections(&mut |name| {
        if name == "groups" || name == "aliases" {
            return true;
        }
        let path_part = name.split_once(':').map(|(_, p)| p).unwrap_or(name);
        if !path_part.starts_with('/') {
            // Unknown, non-path section: not addressed by spec §4.6, ignore.
            return true;
        }

        if let Err(e) = validate_canonical_path(path_part) {
            result = Err(e);
            return false;
        }

        if !seen_paths.insert(name.to_string()) {
            result = Err(AuthzError::InvalidConfig(format!(
                "duplicate path rule section '[{name}]'"
            )));
            return false;
        }

        let mut entry_err = Ok(());
        config.enumerate_entries(name, &mut |key, value| {
            if let Err(e) = validate_entry_key(key, &groups, config) {
                entry_err = Err(e);
                return false;
            }
            if Rights::parse(value).is_err() {
                entry_err = Err(AuthzError::InvalidConfig(format!(
                    "section '{name}': invalid rights value '{value}' for key '{key}'"
                )));
                return false;
            }
            true
        });
        if entry_err.is_err() {
            result = entry_err;
            return false;
        }

        true
    });

    result
}

fn validate_canonical_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(AuthzError::InvalidConfig(format!(
            "path '{path}' must start with '/'"
        )));
    }
    if path != "/" && path.ends_with('/') {
        return Err(AuthzError::InvalidConfig(format!(
            "path '{path}' has a trailing '/'"
        )));
    }
    for segment in path.split('/') {
        if segment == "." || segment == ".." {
            return Err(AuthzError::InvalidConfig(format!(
                "path '{path}' contains a non-canonical '.' or '..' component"
            )));
        }
    }
    if path.contains("//") {
        return Err(AuthzError::InvalidConfig(format!(
            "path '{path}' contains a redundant '/'"
        )));
    }
    Ok(())
}

fn validate_entry_key(key: &str, groups: &HashSet<String>, config: &dyn Config) -> Result<()> {
    let (inverted, rest) = match key.strip_prefix('~') {
        Some(rest) => {
            if rest.starts_with('~') {
                return Err(AuthzError::InvalidConfig(format!(
                    "key '{key}' is doubly negated"
                )));
            }
            (true, rest)
        }
        None => (false, key),
    };

    if inverted && rest == "*" {
        return Err(AuthzError::InvalidConfig(format!(
            "key '{key}' negates '*', which matches no one"
        )));
    }

    if let Some(group) = rest.strip_prefix('@') {
        if group.is_empty() || !groups.contains(group) {
            return Err(AuthzError::InvalidConfig(format!(
                "key '{key}' references undefined group '@{group}'"
            )));
        }
    } else if let Some(alias) = rest.strip_prefix('&') {
        if alias.is_empty() || config.get("aliases", alias).is_none() {
            return Err(AuthzError::InvalidConfig(format!(
                "key '{key}' references undefined alias '&{alias}'"
            )));
        }
    } else if let Some(token) = rest.strip_prefix('$') {
        if token != "anonymous" && token != "authenticated" {
            return Err(AuthzError::InvalidConfig(format!(
                "key '{key}' uses unknown token '${token}'"
            )));
        }
    } else if rest == "*" {
        // always valid
    } else if rest.is_empty() {
        return Err(AuthzError::InvalidConfig(format!(
            "key '{key}' is empty or matches no one (bare '~*' is an error)"
        )));
    }
    // A bare user literal is always valid.

    Ok(())
}
