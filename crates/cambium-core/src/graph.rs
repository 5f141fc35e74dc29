//! In-memory note graph: id and name indices plus the parent/child
//! hierarchy derived from dotted names.
//!
//! Invariants maintained by every mutation:
//! - id index and name index always agree on the current id/name pairing;
//! - every note's parent exists (stubs are synthesized for hierarchy gaps,
//!   never silently dropped);
//! - each vault's root is the terminal ancestor of its notes.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::model::{Note, NoteId};
use crate::name::{self, ROOT_NAME};

#[derive(Debug, Clone, Copy, Default)]
pub struct LookupOpts<'a> {
    pub fuzzy: bool,
    pub vault: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct NoteGraph {
    notes: HashMap<NoteId, Note>,
    /// name -> candidate ids, in vault insertion order. Cross-vault
    /// duplicates are legal (vault-qualified); same-vault duplicates are
    /// rejected.
    names: HashMap<String, Vec<NoteId>>,
    children: HashMap<NoteId, Vec<NoteId>>,
    parents: HashMap<NoteId, NoteId>,
    roots: HashMap<String, NoteId>,
}

impl NoteGraph {
    pub fn new() -> Self {
        NoteGraph::default()
    }

    /// Build a graph from scanned notes. Fails on the first duplicate id or
    /// same-vault name collision; stub ancestors are synthesized for every
    /// hierarchy gap, and every vault seen gets a root.
    pub fn build(notes: impl IntoIterator<Item = Note>) -> Result<Self> {
        let mut graph = NoteGraph::new();
        for note in notes {
            graph.insert(note)?;
        }
        Ok(graph)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn lookup_by_id(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    /// Ranked candidates for a name query. Exact matches first, then prefix
    /// matches, then substring matches; ties broken by hierarchical
    /// distance to the query, then lexically. Deterministic — clients
    /// render the first candidate. An empty fuzzy query matches everything.
    pub fn lookup_by_name(&self, query: &str, opts: LookupOpts) -> Vec<&Note> {
        let query_depth = name::depth(query);
        let mut ranked: Vec<(u8, usize, &Note)> = Vec::new();

        if let Some(ids) = self.names.get(query) {
            for id in ids {
                if let Some(note) = self.notes.get(id) {
                    if opts.vault.map_or(true, |v| note.vault == v) {
                        ranked.push((0, 0, note));
                    }
                }
            }
        }

        if opts.fuzzy {
            for note in self.notes.values() {
                if note.name == query {
                    continue;
                }
                if let Some(v) = opts.vault {
                    if note.vault != v {
                        continue;
                    }
                }
                let class = if query.is_empty() || note.name.starts_with(query) {
                    1
                } else if note.name.contains(query) {
                    2
                } else {
                    continue;
                };
                let distance = name::depth(&note.name).abs_diff(query_depth);
                ranked.push((class, distance, note));
            }
        }

        ranked.sort_by(|a, b| {
            (a.0, a.1, &a.2.name, &a.2.vault).cmp(&(b.0, b.1, &b.2.name, &b.2.vault))
        });
        ranked.into_iter().map(|(_, _, note)| note).collect()
    }

    /// Parent of a note. The root is its own terminal ancestor.
    pub fn parent(&self, id: &NoteId) -> Option<&Note> {
        match self.parents.get(id) {
            Some(parent_id) => self.notes.get(parent_id),
            None => self.notes.get(id), // root (or unknown id -> None)
        }
    }

    /// Children, ordered by name for deterministic listings.
    pub fn children(&self, id: &NoteId) -> Vec<&Note> {
        let mut out: Vec<&Note> = self
            .children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.notes.get(child))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn root_of(&self, vault: &str) -> Option<&Note> {
        self.roots.get(vault).and_then(|id| self.notes.get(id))
    }

    pub fn all_notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn stub_count(&self) -> usize {
        self.all_notes().filter(|n| n.stub).count()
    }

    fn find(&self, vault: &str, name: &str) -> Option<NoteId> {
        self.names
            .get(name)?
            .iter()
            .find(|id| self.notes.get(id).map_or(false, |n| n.vault == vault))
            .cloned()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Insert a note, synthesizing stub ancestors. A real note landing on a
    /// stub absorbs it: the stub's children reattach and the stub id is
    /// dropped in favor of the durable one.
    pub fn insert(&mut self, note: Note) -> Result<()> {
        if let Some(existing) = self.notes.get(&note.id) {
            return Err(EngineError::DuplicateId {
                id: note.id.clone(),
                first: existing.name.clone(),
                second: note.name.clone(),
            });
        }

        if let Some(occupant) = self.find(&note.vault, &note.name) {
            let is_stub = self.notes.get(&occupant).map_or(false, |n| n.stub);
            if !is_stub {
                return Err(EngineError::NameCollision {
                    vault: note.vault.clone(),
                    name: note.name.clone(),
                });
            }
            self.absorb_stub(&occupant, &note.id);
        }

        let id = note.id.clone();
        let note_name = note.name.clone();
        let vault = note.vault.clone();

        self.names.entry(note_name.clone()).or_default().push(id.clone());
        self.notes.insert(id.clone(), note);

        if note_name == ROOT_NAME {
            self.roots.insert(vault, id);
        } else {
            let parent_id = self.ensure_ancestors(&vault, &note_name);
            self.attach(&id, &parent_id);
        }
        Ok(())
    }

    /// Replace a note's content in place. Id and name must already be
    /// current (use [`NoteGraph::rename`] first when the name changes);
    /// hierarchy edges are untouched.
    pub fn update(&mut self, note: Note) {
        debug_assert!(self
            .notes
            .get(&note.id)
            .map_or(false, |n| n.name == note.name));
        self.notes.insert(note.id.clone(), note);
    }

    /// Move a note to a new name. Children remaining at the old name are
    /// reattached to a fresh stub there; a stub at the destination is
    /// absorbed. Both indices are updated before returning, so a reader
    /// never observes them disagreeing.
    pub fn rename(&mut self, id: &NoteId, new_name: &str) -> Result<()> {
        let (old_name, vault) = match self.notes.get(id) {
            Some(n) => (n.name.clone(), n.vault.clone()),
            None => return Ok(()),
        };
        if old_name == new_name {
            return Ok(());
        }

        let dest_stub = match self.find(&vault, new_name) {
            Some(occupant) if occupant != *id => {
                let is_stub = self.notes.get(&occupant).map_or(false, |n| n.stub);
                if !is_stub {
                    return Err(EngineError::NameCollision {
                        vault: vault.clone(),
                        name: new_name.to_string(),
                    });
                }
                Some(occupant)
            }
            _ => None,
        };

        // Old-name children are collected before the destination stub is
        // absorbed, so its children stay with the renamed note.
        let orphans = self.children.remove(id).unwrap_or_default();
        let old_parent = self.detach(id);
        self.unindex_name(&old_name, id);

        if let Some(occupant) = dest_stub {
            self.absorb_stub(&occupant, id);
        }

        if let Some(note) = self.notes.get_mut(id) {
            note.name = new_name.to_string();
        }
        self.names
            .entry(new_name.to_string())
            .or_default()
            .push(id.clone());

        if new_name == ROOT_NAME {
            self.roots.insert(vault.clone(), id.clone());
        } else {
            let parent_id = self.ensure_ancestors(&vault, new_name);
            self.attach(id, &parent_id);
        }

        if !orphans.is_empty() {
            // Children stay at their old names; fill the gap with a stub.
            let stub = Note::new_stub(&old_name, &vault);
            let stub_id = stub.id.clone();
            self.names
                .entry(old_name.clone())
                .or_default()
                .push(stub_id.clone());
            self.notes.insert(stub_id.clone(), stub);
            if let Some(parent_id) = old_parent {
                self.attach(&stub_id, &parent_id);
            }
            for orphan in &orphans {
                self.parents.insert(orphan.clone(), stub_id.clone());
            }
            self.children.insert(stub_id, orphans);
        } else if let Some(parent_id) = old_parent {
            self.prune_stub_chain(&parent_id);
        }
        Ok(())
    }

    /// Remove a note. A note with children is converted to a stub in place
    /// (same id, same name) so its children's parent link never dangles; a
    /// leaf is dropped and any ancestor stubs left childless are pruned.
    pub fn remove(&mut self, id: &NoteId) {
        let Some(note) = self.notes.get(id) else {
            return;
        };
        let has_children = self.children.get(id).map_or(false, |c| !c.is_empty());

        if has_children {
            let mut stub = Note::new_stub(&note.name, &note.vault);
            stub.id = id.clone();
            self.notes.insert(id.clone(), stub);
            return;
        }

        let note_name = note.name.clone();
        let vault = note.vault.clone();
        let parent = self.detach(id);
        self.unindex_name(&note_name, id);
        self.notes.remove(id);
        self.children.remove(id);
        if note_name == ROOT_NAME {
            self.roots.remove(&vault);
        }
        if let Some(parent_id) = parent {
            self.prune_stub_chain(&parent_id);
        }
    }

    // ------------------------------------------------------------------
    // Edge bookkeeping
    // ------------------------------------------------------------------

    fn attach(&mut self, child: &NoteId, parent: &NoteId) {
        self.parents.insert(child.clone(), parent.clone());
        let siblings = self.children.entry(parent.clone()).or_default();
        if !siblings.contains(child) {
            siblings.push(child.clone());
        }
    }

    fn detach(&mut self, child: &NoteId) -> Option<NoteId> {
        let parent = self.parents.remove(child)?;
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|c| c != child);
        }
        Some(parent)
    }

    fn unindex_name(&mut self, name: &str, id: &NoteId) {
        if let Some(ids) = self.names.get_mut(name) {
            ids.retain(|i| i != id);
            if ids.is_empty() {
                self.names.remove(name);
            }
        }
    }

    /// Get-or-create the parent chain for `child_name` in `vault`, filling
    /// gaps with stubs up to the vault root. Returns the direct parent id.
    fn ensure_ancestors(&mut self, vault: &str, child_name: &str) -> NoteId {
        let parent_name = name::parent_of(child_name).unwrap_or_else(|| ROOT_NAME.to_string());

        if let Some(existing) = self.find(vault, &parent_name) {
            return existing;
        }

        let stub = Note::new_stub(&parent_name, vault);
        let stub_id = stub.id.clone();
        self.names
            .entry(parent_name.clone())
            .or_default()
            .push(stub_id.clone());
        self.notes.insert(stub_id.clone(), stub);

        if parent_name == ROOT_NAME {
            self.roots.insert(vault.to_string(), stub_id.clone());
        } else {
            let grandparent = self.ensure_ancestors(vault, &parent_name);
            self.attach(&stub_id, &grandparent);
        }
        stub_id
    }

    /// Replace a stub with the note taking its place: the stub's children
    /// reattach to `heir`, the stub vanishes from both indices.
    fn absorb_stub(&mut self, stub_id: &NoteId, heir: &NoteId) {
        let Some(stub) = self.notes.remove(stub_id) else {
            return;
        };
        self.unindex_name(&stub.name, stub_id);
        self.detach(stub_id);
        if stub.name == ROOT_NAME {
            self.roots.remove(&stub.vault);
        }
        if let Some(orphans) = self.children.remove(stub_id) {
            for orphan in &orphans {
                self.parents.insert(orphan.clone(), heir.clone());
            }
            let merged = self.children.entry(heir.clone()).or_default();
            for orphan in orphans {
                if !merged.contains(&orphan) {
                    merged.push(orphan);
                }
            }
        }
    }

    /// Walk up from `from`, dropping stubs that no longer anchor anything.
    /// Roots are kept — the root always exists once the graph is built.
    fn prune_stub_chain(&mut self, from: &NoteId) {
        let mut current = Some(from.clone());
        while let Some(id) = current.take() {
            let Some(note) = self.notes.get(&id) else {
                break;
            };
            if !note.stub || note.name == ROOT_NAME {
                break;
            }
            if self.children.get(&id).map_or(false, |c| !c.is_empty()) {
                break;
            }
            let note_name = note.name.clone();
            let parent = self.detach(&id);
            self.unindex_name(&note_name, &id);
            self.notes.remove(&id);
            self.children.remove(&id);
            current = parent;
        }
    }
}
