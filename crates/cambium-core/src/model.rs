use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::name;

/// Stable note identity. Minted at creation (23-char nanoid, matching
/// Dendron's id alphabet and length) or adopted from front matter; immutable
/// for the note's lifetime, independent of naming or location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(pub String);

impl NoteId {
    pub fn generate() -> Self {
        NoteId(nanoid::nanoid!(23))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One addressable unit of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Hierarchical dotted name, mutable via rename.
    pub name: String,
    /// Owning vault.
    pub vault: String,
    /// On-disk location, derived from `name`. Stubs have none.
    pub path: Option<PathBuf>,
    pub title: Option<String>,
    /// Open metadata bag. The graph and resolver never depend on specific
    /// keys existing.
    pub custom: serde_json::Map<String, serde_json::Value>,
    /// Raw body text, after the front-matter block.
    pub body: String,
    /// Outbound references extracted from `body`.
    pub links: Vec<Link>,
    /// Synthesized placeholder filling a hierarchy gap; never authored,
    /// never persisted.
    pub stub: bool,
}

impl Note {
    /// A stub materialized to fill a hierarchy gap.
    pub(crate) fn new_stub(name: &str, vault: &str) -> Self {
        Note {
            id: NoteId::generate(),
            name: name.to_string(),
            vault: vault.to_string(),
            path: None,
            title: None,
            custom: serde_json::Map::new(),
            body: String::new(),
            links: Vec::new(),
            stub: true,
        }
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| name::basename(&self.name))
    }
}

/// Client-supplied note for `write`. An absent id means "new note"; a known
/// id means update (and rename, when the name differs from the graph's).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteDraft {
    #[serde(default)]
    pub id: Option<NoteId>,
    pub name: String,
    /// Target vault; defaults to the first configured vault.
    #[serde(default)]
    pub vault: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub custom: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub body: String,
}

/// Outbound reference extracted from a note body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// Raw target token as authored (name, optionally with anchor split off).
    pub target: String,
    pub alias: Option<String>,
    pub anchor: Option<String>,
    pub kind: LinkKind,
    /// Set during resolution, not persisted.
    #[serde(default)]
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    /// `[[alias|target#anchor]]`
    Wiki,
    /// `![[target]]`
    Embed,
}

/// Resolution status of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    Unresolved,
    ByName(NoteId),
    ById(NoteId),
    Missing,
}

/// YAML front-matter block of a persisted note file. Unknown keys land in
/// `custom` and round-trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontMatter {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}
