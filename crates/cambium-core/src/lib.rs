//! Cambium Core Library
//!
//! Note graph engine: stable identities, hierarchical dotted names, and
//! link resolution over vaults of plain-text notes. IO stays behind the
//! vault store and the `FileSystem` seam; the graph itself is pure
//! in-memory state, rebuilt at init and mutated in place afterwards.

pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod name;
pub mod resolver;
pub mod store;
pub mod vfs;

pub use config::{EngineConfig, ResolveModeConfig};
pub use content::BodyNode;
pub use engine::{Engine, GraphSummary};
pub use error::{EngineError, Result};
pub use graph::{LookupOpts, NoteGraph};
pub use model::{Note, NoteDraft, NoteId};
pub use resolver::{LinkResolver, MissingPolicy, ResolveMode};
pub use store::VaultStore;
