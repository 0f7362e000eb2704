//! Identity resolution: user → the set of names a rules file can address
//! them by (spec §4.2).

use std::collections::{HashMap, HashSet};

use super::config::Config;

/// Build the identity set for `user` (spec §3, §4.2).
///
/// `user == None` means anonymous and always yields exactly
/// `{"*", "$anonymous"}`, regardless of the config's content.
pub fn identity_set(config: &dyn Config, user: Option<&str>) -> HashSet<String> {
    let Some(user) = user else {
        let mut anon = HashSet::new();
        anon.insert("*".to_string());
        anon.insert("$anonymous".to_string());
        return anon;
    };

    let mut identities = HashSet::new();
    identities.insert(user.to_string());

    config.enumerate_entries("aliases", &mut |name, value| {
        if value == user {
            identities.insert(format!("&{name}"));
        }
        true
    });

    let reverse = build_reverse_membership(config, &identities);
    close_transitively(&mut identities, &reverse);

    identities.insert("*".to_string());
    identities.insert("$authenticated".to_string());
    identities
}

/// For every `(group_name, member_list)` entry in `[groups]`, record a
/// reverse edge `member -> "@group_name"` for every member token that is
/// already in `seed` or is itself a group reference (`@...`). The latter
/// lets the closure discover group-of-group membership without re-scanning
/// `[groups]` on every work-list pop.
fn build_reverse_membership(config: &dyn Config, seed: &HashSet<String>) -> HashMap<String, Vec<String>> {
    let mut reverse: HashMap<String, Vec<String>> = HashMap::new();

    config.enumerate_entries("groups", &mut |group_name, member_list| {
        let parent = format!("@{group_name}");
        for member in member_list.split(',') {
            let member = member.trim();
            if member.is_empty() {
                continue;
            }
            if member.starts_with('@') || seed.contains(member) {
                reverse.entry(member.to_string()).or_default().push(parent.clone());
            }
        }
        true
    });

    reverse
}

/// Work-list closure: pop a name, add every parent group it maps to that
/// isn't already in `identities`, push those onto the work-list. Terminates
/// because the rule set is finite and the closure only grows `identities`
/// (spec §4.2 step 5); group cycles are rejected earlier by the validator.
fn close_transitively(identities: &mut HashSet<String>, reverse: &HashMap<String, Vec<String>>) {
    let mut worklist: Vec<String> = identities.iter().cloned().collect();

    while let Some(name) = worklist.pop() {
        let Some(parents) = reverse.get(&name) else {
            continue;
        };
        for parent in parents {
            if identities.insert(parent.clone()) {
                worklist.push(parent.clone());
            }
        }
    }
}
