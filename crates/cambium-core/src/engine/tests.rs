use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::config::{EngineConfig, MissingPolicyConfig, VaultConfig};
use crate::model::NoteDraft;
use crate::resolver::NOT_FOUND_TARGET;

fn draft(name: &str, body: &str) -> NoteDraft {
    NoteDraft {
        name: name.to_string(),
        body: body.to_string(),
        ..NoteDraft::default()
    }
}

fn engine_in(dir: &TempDir) -> Engine {
    Engine::init(EngineConfig::single_vault(dir.path())).unwrap()
}

fn vault_listing(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_query_and_write_scenario() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("foo.md"), "---\nid: id.foo\n---\n").unwrap();

    let engine = engine_in(&dir);

    let hits = engine.query("");
    let names: Vec<&str> = hits.iter().map(|n| n.name.as_str()).collect();
    assert!(names.contains(&"foo"));
    assert!(names.contains(&ROOT_NAME));

    engine.write(draft("bond", "")).unwrap();

    assert_eq!(vault_listing(&dir), vec!["bond.md", "foo.md", "root.md"]);
}

#[test]
fn test_write_then_reload_round_trip() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    let written = engine
        .write(draft("project.alpha", "alpha body with [[project.beta]]\n"))
        .unwrap();

    engine.reload().unwrap();

    let reloaded = engine.get(&written.id).expect("note survives reload");
    assert_eq!(reloaded.name, "project.alpha");
    assert_eq!(reloaded.body, written.body);
    assert_eq!(reloaded.links.len(), 1);
    assert_eq!(reloaded.links[0].target, "project.beta");
}

#[test]
fn test_id_stable_across_updates_and_rename() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    let original = engine.write(draft("journal.day", "first")).unwrap();

    let mut update = draft("journal.day", "second revision");
    update.id = Some(original.id.clone());
    let updated = engine.write(update).unwrap();
    assert_eq!(updated.id, original.id);

    let mut rename = draft("journal.archive.day", "second revision");
    rename.id = Some(original.id.clone());
    let renamed = engine.write(rename).unwrap();
    assert_eq!(renamed.id, original.id);

    // Old file gone, new file present, index agrees.
    assert!(!dir.path().join("journal.day.md").exists());
    assert!(dir.path().join("journal.archive.day.md").exists());
    assert_eq!(engine.get(&original.id).unwrap().name, "journal.archive.day");
}

#[test]
fn test_rename_crash_leftover_reconciled_on_reload() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    let note = engine.write(draft("before", "body v1")).unwrap();
    let mut rename = draft("after", "body v2");
    rename.id = Some(note.id.clone());
    engine.write(rename).unwrap();

    // Simulate a crash between "persist to new path" and "remove old
    // path": the stale old-path artifact is back on disk, older than the
    // authoritative copy.
    std::fs::write(
        dir.path().join("before.md"),
        format!("---\nid: {}\n---\nbody v1", note.id),
    )
    .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    let new_body = std::fs::read_to_string(dir.path().join("after.md")).unwrap();
    std::fs::write(dir.path().join("after.md"), new_body).unwrap();

    engine.reload().unwrap();

    let survivor = engine.get(&note.id).expect("one authoritative note");
    assert_eq!(survivor.name, "after");
    let matches = engine
        .query("")
        .into_iter()
        .filter(|n| n.id == note.id)
        .count();
    assert_eq!(matches, 1, "duplicate artifact must not corrupt the index");
}

#[test]
fn test_write_adopts_stub_identity() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine.write(draft("a.b.c", "leaf")).unwrap();
    let stub_id = engine
        .query("a.b")
        .into_iter()
        .find(|n| n.name == "a.b")
        .unwrap()
        .id;

    let materialized = engine.write(draft("a.b", "now real")).unwrap();
    assert_eq!(materialized.id, stub_id);
    assert!(!materialized.stub);
}

#[test]
fn test_delete_leaf_and_delete_with_children() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    let parent = engine.write(draft("topic", "parent")).unwrap();
    let child = engine.write(draft("topic.child", "child")).unwrap();

    engine.delete(&parent.id).unwrap();
    assert!(!dir.path().join("topic.md").exists());
    // Still anchors its child as a stub.
    let kept = engine.get(&parent.id).unwrap();
    assert!(kept.stub);

    engine.delete(&child.id).unwrap();
    assert!(!dir.path().join("topic.child.md").exists());
    assert!(engine.get(&child.id).is_none());
    // The stub chain is pruned once nothing hangs off it.
    assert!(engine.get(&parent.id).is_none());
}

#[test]
fn test_resolve_stub_page_policy_through_engine() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    let note = engine
        .write(draft("page", "see [[no.such.note]]"))
        .unwrap();

    let nodes = engine
        .resolve(&note.id, ResolveMode::RenderedMarkup)
        .unwrap();

    let mut missing = None;
    for node in &nodes {
        if let BodyNode::Container(children) = node {
            for child in children {
                if let BodyNode::Reference(r) = child {
                    missing = Some(r.clone());
                }
            }
        }
    }
    let reference = missing.expect("reference node present");
    assert_eq!(reference.resolution, crate::model::Resolution::Missing);
    assert_eq!(reference.href.as_deref(), Some(NOT_FOUND_TARGET));

    let log = std::fs::read_to_string(dir.path().join("missing-links.log")).unwrap();
    assert_eq!(log, "no.such.note\n");
}

#[test]
fn test_resolve_fail_policy_through_engine() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::single_vault(dir.path());
    config.links.missing = MissingPolicyConfig::Fail;
    let engine = Engine::init(config).unwrap();

    let note = engine
        .write(draft("page", "see [[no.such.note]]"))
        .unwrap();

    let err = engine
        .resolve(&note.id, ResolveMode::RenderedMarkup)
        .unwrap_err();
    match err {
        EngineError::Unresolved { target } => assert_eq!(target, "no.such.note"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("missing-links.log").exists());
}

#[test]
fn test_init_fails_on_unreadable_vault_root() {
    let config = EngineConfig::single_vault("/no/such/vault/root");
    let err = Engine::init(config).unwrap_err();
    assert!(matches!(err, EngineError::Init { .. }));
}

#[test]
fn test_multi_vault_union_and_qualification() {
    let dir = TempDir::new().unwrap();
    let vault1 = dir.path().join("vault1");
    let vault2 = dir.path().join("vault2");
    std::fs::create_dir_all(&vault1).unwrap();
    std::fs::create_dir_all(&vault2).unwrap();
    std::fs::write(vault1.join("shared.md"), "---\nid: one\n---\nfrom v1").unwrap();
    std::fs::write(vault2.join("shared.md"), "---\nid: two\n---\nfrom v2").unwrap();

    let config = EngineConfig {
        workspace: crate::config::WorkspaceConfig {
            name: "multi".to_string(),
            vaults: vec![
                VaultConfig {
                    name: "vault1".to_string(),
                    path: vault1,
                },
                VaultConfig {
                    name: "vault2".to_string(),
                    path: vault2,
                },
            ],
        },
        links: Default::default(),
    };
    let engine = Engine::init(config).unwrap();

    let hits = engine.query("shared");
    assert_eq!(hits.len(), 2);
    // Vault declaration order breaks the tie deterministically.
    assert_eq!(hits[0].vault, "vault1");
    assert_eq!(hits[1].vault, "vault2");

    let summary = engine.summary();
    assert_eq!(summary.vaults, 2);
}

#[test]
fn test_reload_picks_up_external_edits() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    std::fs::write(dir.path().join("outside.md"), "---\nid: ext\n---\nedited outside").unwrap();
    // Stale until an explicit reload — accepted consistency window.
    assert!(engine.query("outside").is_empty());

    engine.reload().unwrap();
    let hits = engine.query("outside");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].body, "edited outside");
}

#[test]
fn test_concurrent_queries_share_snapshot() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine_in(&dir));
    engine.write(draft("alpha", "a")).unwrap();
    engine.write(draft("beta", "b")).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let hits = engine.query("");
                    assert!(hits.len() >= 3);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
