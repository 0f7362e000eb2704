//! End-to-end authorization scenarios, loaded from real rules files on disk.

use dsvn_core::authz::{Authz, Rights};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_rules(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn root_deny_leaf_grant_from_disk() {
    let rules = write_rules("[/]\n* =\n\n[/trunk]\nalice = rw\n");
    let authz = Authz::load(rules.path(), None, true).unwrap();

    assert!(!authz
        .check_access(None, Some("/"), Some("alice"), Rights::READ, false)
        .unwrap());
    assert!(authz
        .check_access(None, Some("/trunk"), Some("alice"), Rights::READ, false)
        .unwrap());
    assert!(authz
        .check_access(None, Some("/trunk/src/a.c"), Some("alice"), Rights::READ, false)
        .unwrap());
    assert!(!authz
        .check_access(None, Some("/branches"), Some("alice"), Rights::READ, false)
        .unwrap());
}

#[test]
fn separate_groups_file() {
    let groups = write_rules("[groups]\ndevs = alice, bob\n");
    let main = write_rules("[/code]\n@devs = rw\n");

    let authz = Authz::load(main.path(), Some(groups.path()), true).unwrap();
    assert!(authz
        .check_access(None, Some("/code"), Some("alice"), Rights::WRITE, false)
        .unwrap());
    assert!(!authz
        .check_access(None, Some("/code"), Some("carol"), Rights::READ, false)
        .unwrap());
}

#[test]
fn main_file_with_groups_section_rejected_when_groups_file_given() {
    let groups = write_rules("[groups]\ndevs = alice\n");
    let main = write_rules("[groups]\ndevs = alice\n[/code]\n@devs = rw\n");

    let err = Authz::load(main.path(), Some(groups.path()), true).unwrap_err();
    assert!(err.to_string().contains("cannot contain any groups"));
}

#[test]
fn recursive_query_implies_non_recursive_at_same_path() {
    let authz = Authz::parse(
        "[/]\n* =\n[/trunk]\nalice = r\n",
        None,
    )
    .unwrap();

    let recursive = authz
        .check_access(None, Some("/trunk"), Some("alice"), Rights::READ, true)
        .unwrap();
    let single = authz
        .check_access(None, Some("/trunk"), Some("alice"), Rights::READ, false)
        .unwrap();
    assert!(!recursive || single);
}

#[test]
fn deny_by_default_with_no_rules_at_all() {
    let authz = Authz::parse("", None).unwrap();
    assert!(!authz
        .check_access(None, Some("/"), Some("alice"), Rights::READ, false)
        .unwrap());
    assert!(!authz
        .check_access(None, Some("/anything/at/all"), None, Rights::WRITE, false)
        .unwrap());
}

#[test]
fn reordering_entries_and_sections_does_not_change_answers() {
    let a = Authz::parse(
        "[/]\n* = r\nbob = rw\n\n[/trunk]\n@devs = r\nalice = rw\n[groups]\ndevs = carol\n",
        None,
    )
    .unwrap();
    let b = Authz::parse(
        "[groups]\ndevs = carol\n\n[/trunk]\nalice = rw\n@devs = r\n\n[/]\nbob = rw\n* = r\n",
        None,
    )
    .unwrap();

    for user in [None, Some("alice"), Some("bob"), Some("carol"), Some("dave")] {
        for path in ["/", "/trunk", "/trunk/x"] {
            for rights in [Rights::READ, Rights::WRITE] {
                assert_eq!(
                    a.check_access(None, Some(path), user, rights, false).unwrap(),
                    b.check_access(None, Some(path), user, rights, false).unwrap(),
                    "mismatch for user={user:?} path={path} rights={rights:?}"
                );
            }
        }
    }
}

#[test]
fn group_cycle_is_rejected_naming_both_groups() {
    let err = Authz::parse("[groups]\na = @b\nb = @a\n", None).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'a'"), "message did not name group 'a': {message}");
    assert!(message.contains("'b'"), "message did not name group 'b': {message}");
}
