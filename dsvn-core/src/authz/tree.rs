//! Segment-indexed prefix tree: builds from filtered rules, annotates
//! inherited/min/max rights, answers `check_access` (spec §4.4, §4.5).

use std::collections::HashMap;

use super::rules::{FilteredRule, Rights};

/// One node of the compiled tree (spec §3).
///
/// The root's `access` is always `Some` once [`Tree::build`] returns
/// (defaulted to `Rights::NONE` if no rule assigned one), enforcing the
/// "never null at root" invariant in the type rather than at every call site.
#[derive(Debug)]
pub struct Node {
    pub segment: String,
    pub access: Option<Rights>,
    pub min_rights: Rights,
    pub max_rights: Rights,
    pub children: HashMap<String, Box<Node>>,
}

impl Node {
    fn new(segment: String) -> Self {
        Node {
            segment,
            access: None,
            min_rights: Rights::NONE,
            max_rights: Rights::NONE,
            children: HashMap::new(),
        }
    }
}

/// A compiled, immutable prefix tree for one `(config, repo, user)` tuple
/// (spec §3 lifecycle).
#[derive(Debug)]
pub struct Tree {
    pub root: Node,
}

impl Tree {
    /// Build a tree from the filtered `(path, rights)` pairs produced by
    /// `rules::filter_rules` (spec §4.4).
    ///
    /// Infallible: `validate::validate` rejects any rules document with two
    /// path-rule sections resolving to the same path before `Authz::parse`
    /// ever returns, so by the time a tree is built from a loaded `Authz`,
    /// no two `rules` entries can collide on the same path (spec §7 — a
    /// well-formed, loaded authz object is infallible under valid queries).
    pub fn build(rules: &[FilteredRule]) -> Self {
        let mut root = Node::new(String::new());

        for rule in rules {
            insert(&mut root, &rule.path, rule.rights);
        }

        if root.access.is_none() {
            root.access = Some(Rights::NONE);
        }

        finalize(&mut root, root.access.unwrap());

        Tree { root }
    }

    /// `check_access(path, required, recursive)` — spec §4.5.
    ///
    /// `path` must already have its leading `/` stripped by the caller
    /// (the public API boundary in `authz::mod` does that stripping); an
    /// empty string denotes the root.
    pub fn check_access(&self, path: &str, required: Rights, recursive: bool) -> bool {
        let segments = normalize_segments(path);

        let mut current = &self.root;
        let mut access = self.root.access.unwrap_or(Rights::NONE);
        let mut min = current.min_rights;
        let mut max = current.max_rights;

        for segment in &segments {
            if !max.contains(required) {
                return false;
            }
            if min.contains(required) {
                return true;
            }
            if (min & required) == (max & required) {
                return (min & required) == required;
            }

            match current.children.get(segment) {
                Some(child) => {
                    current = child;
                    if let Some(child_access) = child.access {
                        access = child_access;
                    }
                    min = current.min_rights;
                    max = current.max_rights;
                }
                None => {
                    // The subtree beyond this point is governed entirely by
                    // the last explicit access assignment seen.
                    min = access;
                    max = access;
                    break;
                }
            }
        }

        if recursive {
            min.contains(required)
        } else {
            access.contains(required)
        }
    }
}

/// Tokenize `path` on `/`. A leading slash introduces an empty first
/// segment which is stripped (the root is implicit); empty intermediate
/// segments from `//` runs are preserved as the reference implementation
/// tolerates them at both tokenization and lookup time (spec §4.4, §4.5).
fn normalize_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.first() == Some(&"") {
        segments.remove(0);
    }
    if segments.last() == Some(&"") {
        segments.pop();
    }
    segments
}

fn insert(root: &mut Node, path: &str, rights: Rights) {
    let segments = normalize_segments(path);

    let mut node = root;
    for segment in segments {
        node = node
            .children
            .entry(segment.to_string())
            .or_insert_with(|| Box::new(Node::new(segment.to_string())));
    }

    debug_assert!(
        node.access.is_none(),
        "duplicate path rule for {path}: validate() should have rejected this at load time"
    );
    node.access = Some(rights);
}

/// Post-order finalize: `effective` is `node.access` if set, else the
/// `inherited` value passed down from the nearest ancestor with an access
/// assignment. `min_rights`/`max_rights` aggregate over the entire subtree,
/// not just direct children (spec §4.4 step 4).
fn finalize(node: &mut Node, inherited: Rights) -> (Rights, Rights) {
    let effective = node.access.unwrap_or(inherited);
    let mut min = effective;
    let mut max = effective;

    for child in node.children.values_mut() {
        let (child_min, child_max) = finalize(child, effective);
        min &= child_min;
        max |= child_max;
    }

    node.min_rights = min;
    node.max_rights = max;
    (min, max)
}
