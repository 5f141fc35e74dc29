//! Engine facade: the single entry point external collaborators use.
//!
//! Owns the vault stores and the note graph, serializes structural
//! mutations, and runs render-time link resolution against the current
//! graph snapshot. Concurrent queries proceed without blocking each other;
//! writes are mutually exclusive, and the graph write lock is never held
//! across disk I/O.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::content::{self, BodyNode};
use crate::error::{EngineError, Result};
use crate::graph::{LookupOpts, NoteGraph};
use crate::model::{Note, NoteDraft, NoteId};
use crate::name::ROOT_NAME;
use crate::resolver::{LinkResolver, ResolveMode, ResolveOptions};
use crate::store::VaultStore;
use crate::vfs::{FileSystem, PhysicalFileSystem};

#[cfg(test)]
mod tests;

/// Result of a graph build, reported by `init`/`reload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub vaults: usize,
    pub notes: usize,
    pub stubs: usize,
}

pub struct Engine {
    config: EngineConfig,
    fs: Arc<dyn FileSystem>,
    stores: Vec<VaultStore>,
    graph: RwLock<NoteGraph>,
    /// Serializes structural mutations (write/delete/reload) with respect
    /// to each other without blocking readers.
    write_gate: Mutex<()>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Scan every configured vault and build the graph. Fails with an
    /// initialization error if any vault root is unreadable; nothing is
    /// installed on failure.
    pub fn init(config: EngineConfig) -> Result<Self> {
        Engine::with_fs(config, Arc::new(PhysicalFileSystem))
    }

    pub fn with_fs(config: EngineConfig, fs: Arc<dyn FileSystem>) -> Result<Self> {
        if config.workspace.vaults.is_empty() {
            return Err(EngineError::init("no vaults configured"));
        }

        let stores: Vec<VaultStore> = config
            .workspace
            .vaults
            .iter()
            .map(|vault| VaultStore::new(vault.name.clone(), vault.path.clone(), fs.clone()))
            .collect();

        let graph = scan_and_build(&stores, &fs)?;
        log::info!(
            "initialized workspace '{}': {} notes across {} vaults",
            config.workspace.name,
            graph.note_count(),
            stores.len()
        );

        Ok(Engine {
            config,
            fs,
            stores,
            graph: RwLock::new(graph),
            write_gate: Mutex::new(()),
        })
    }

    pub fn summary(&self) -> GraphSummary {
        let graph = self.graph.read().unwrap();
        GraphSummary {
            vaults: self.stores.len(),
            notes: graph.note_count(),
            stubs: graph.stub_count(),
        }
    }

    // ------------------------------------------------------------------
    // Queries (concurrent; read lock only)
    // ------------------------------------------------------------------

    /// Ranked fuzzy lookup over the full query string. The empty string
    /// matches everything and is used for full-graph listing.
    pub fn query(&self, query_string: &str) -> Vec<Note> {
        let graph = self.graph.read().unwrap();
        graph
            .lookup_by_name(
                query_string,
                LookupOpts {
                    fuzzy: true,
                    vault: None,
                },
            )
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &NoteId) -> Option<Note> {
        self.graph.read().unwrap().lookup_by_id(id).cloned()
    }

    /// Parse a note's body and rewrite its references against the current
    /// graph snapshot. Missing-target handling follows the configured
    /// policy; the only side effect is the diagnostics-log append.
    pub fn resolve(&self, id: &NoteId, mode: ResolveMode) -> Result<Vec<BodyNode>> {
        let graph = self.graph.read().unwrap();
        let note = graph
            .lookup_by_id(id)
            .ok_or_else(|| EngineError::Unresolved {
                target: id.to_string(),
            })?;

        let opts = ResolveOptions {
            mode,
            missing: self.config.links.missing.into(),
            asset_prefix: self.config.links.asset_prefix.clone(),
            link_prefix: self.config.links.link_prefix.clone(),
            diagnostics: self.diagnostics_path(),
        };

        let mut nodes = content::parse(&note.body).nodes;
        LinkResolver::new(&graph, &*self.fs, &opts).resolve(&mut nodes)?;
        Ok(nodes)
    }

    // ------------------------------------------------------------------
    // Mutations (serialized by the write gate)
    // ------------------------------------------------------------------

    /// Create or update a note. New notes get a minted id (or adopt the id
    /// of a stub already occupying the name, keeping earlier id links
    /// valid). A name change is sequenced write-ahead: persist at the new
    /// path, remove the old path, then update the index — a crash in
    /// between leaves a recoverable duplicate, not data loss.
    pub fn write(&self, draft: NoteDraft) -> Result<Note> {
        let _gate = self.write_gate.lock().unwrap();

        let mut vault = draft
            .vault
            .clone()
            .unwrap_or_else(|| self.stores[0].name.clone());

        // Probe current state under a short read lock; no disk I/O yet.
        // Collisions are rejected here, before anything touches the disk.
        let (id, prior) = {
            let graph = self.graph.read().unwrap();

            let known = draft
                .id
                .as_ref()
                .and_then(|id| graph.lookup_by_id(id))
                .cloned();

            let occupant_of = |vault: &str| {
                graph
                    .lookup_by_name(
                        &draft.name,
                        LookupOpts {
                            fuzzy: false,
                            vault: Some(vault),
                        },
                    )
                    .first()
                    .cloned()
                    .cloned()
            };

            match known {
                Some(existing) => {
                    // Updates stay in the note's vault; ids never move
                    // across vault boundaries.
                    vault = existing.vault.clone();
                    if existing.name != draft.name {
                        if let Some(occupant) = occupant_of(&vault) {
                            if occupant.id != existing.id && !occupant.stub {
                                return Err(EngineError::NameCollision {
                                    vault,
                                    name: occupant.name,
                                });
                            }
                        }
                    }
                    (existing.id.clone(), Some(existing))
                }
                None => match occupant_of(&vault) {
                    Some(note) if note.stub => (note.id.clone(), Some(note)),
                    Some(note) => {
                        return Err(EngineError::NameCollision {
                            vault,
                            name: note.name,
                        });
                    }
                    None => (draft.id.clone().unwrap_or_else(NoteId::generate), None),
                },
            }
        };
        let store = self.store(&vault)?;

        let parsed = content::parse(&draft.body);
        let mut note = Note {
            id,
            name: draft.name,
            vault,
            path: None,
            title: draft.title.or(parsed.title),
            custom: draft.custom,
            body: draft.body,
            links: parsed.links,
            stub: false,
        };

        // Write-ahead: the new location is durable before anything else
        // changes.
        let path = store.persist(&note)?;
        note.path = Some(path);

        match prior {
            None => {
                self.graph.write().unwrap().insert(note.clone())?;
            }
            Some(prior) if prior.name == note.name => {
                self.graph.write().unwrap().update(note.clone());
            }
            Some(prior) => {
                // Rename: old path goes away only after the new one exists;
                // the index is updated last. A rescan reconciles any
                // partial state.
                if !prior.stub {
                    store.remove(&prior, false)?;
                }
                let mut graph = self.graph.write().unwrap();
                graph.rename(&note.id, &note.name)?;
                graph.update(note.clone());
            }
        }

        log::debug!("wrote '{}' ({})", note.name, note.id);
        Ok(note)
    }

    /// Delete a note. Missing on disk is already-satisfied; a note with
    /// children survives in the graph as a stub.
    pub fn delete(&self, id: &NoteId) -> Result<()> {
        let _gate = self.write_gate.lock().unwrap();

        let Some(note) = self.graph.read().unwrap().lookup_by_id(id).cloned() else {
            return Ok(());
        };

        if !note.stub {
            let store = self.store(&note.vault)?;
            store.remove(&note, false)?;
        }
        self.graph.write().unwrap().remove(id);
        log::debug!("deleted '{}' ({})", note.name, id);
        Ok(())
    }

    /// Full rescan and rebuild. Install-or-discard: the previous graph
    /// stays active unless the whole rebuild succeeds.
    pub fn reload(&self) -> Result<GraphSummary> {
        let _gate = self.write_gate.lock().unwrap();

        let rebuilt = scan_and_build(&self.stores, &self.fs)?;
        let summary = GraphSummary {
            vaults: self.stores.len(),
            notes: rebuilt.note_count(),
            stubs: rebuilt.stub_count(),
        };
        *self.graph.write().unwrap() = rebuilt;
        log::info!("reloaded: {} notes, {} stubs", summary.notes, summary.stubs);
        Ok(summary)
    }

    // ------------------------------------------------------------------

    fn store(&self, vault: &str) -> Result<&VaultStore> {
        self.stores
            .iter()
            .find(|s| s.name == vault)
            .ok_or_else(|| EngineError::init(format!("unknown vault '{}'", vault)))
    }

    fn diagnostics_path(&self) -> PathBuf {
        let configured = &self.config.links.diagnostics_log;
        if configured.is_absolute() {
            configured.clone()
        } else {
            self.stores[0].root.join(configured)
        }
    }
}

/// Scan every store into a staging set, bootstrap missing vault roots, and
/// build a fresh graph. Same-id duplicates (the artifact of a crash between
/// persist-new and remove-old) are reconciled here: the copy with the newer
/// mtime wins, the stale one is logged and skipped.
fn scan_and_build(stores: &[VaultStore], fs: &Arc<dyn FileSystem>) -> Result<NoteGraph> {
    let mut staged: Vec<Note> = Vec::new();
    let mut by_id: HashMap<NoteId, usize> = HashMap::new();

    for store in stores {
        let scan = store.scan().map_err(|e| {
            EngineError::init(format!("vault '{}' unreadable: {}", store.name, e))
        })?;

        let mut saw_root = false;
        for note in scan {
            let note = note?;
            saw_root |= note.name == ROOT_NAME;

            match by_id.get(&note.id) {
                None => {
                    by_id.insert(note.id.clone(), staged.len());
                    staged.push(note);
                }
                Some(&slot) => {
                    let winner = newer_of(fs, &staged[slot], &note);
                    log::warn!(
                        "duplicate id {}: keeping '{}', skipping stale '{}'",
                        note.id,
                        winner.name,
                        if winner.name == note.name {
                            &staged[slot].name
                        } else {
                            &note.name
                        }
                    );
                    if winner.name == note.name {
                        staged[slot] = note;
                    }
                }
            }
        }

        if !saw_root {
            let mut root = Note::new_stub(ROOT_NAME, &store.name);
            root.stub = false;
            root.title = Some(ROOT_NAME.to_string());
            let path = store.persist(&root)?;
            root.path = Some(path);
            by_id.insert(root.id.clone(), staged.len());
            staged.push(root);
        }
    }

    NoteGraph::build(staged)
}

fn newer_of<'a>(fs: &Arc<dyn FileSystem>, a: &'a Note, b: &'a Note) -> &'a Note {
    let stamp = |note: &Note| {
        note.path
            .as_ref()
            .and_then(|p| fs.mtime(p).ok())
            .unwrap_or(std::time::UNIX_EPOCH)
    };
    let (ta, tb) = (stamp(a), stamp(b));
    if tb > ta {
        b
    } else if ta > tb {
        a
    } else if b.name > a.name {
        // Equal stamps: deterministic tie-break.
        b
    } else {
        a
    }
}
