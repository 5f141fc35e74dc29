use std::path::PathBuf;

use thiserror::Error;

use crate::model::NoteId;

/// Errors surfaced by the engine. Each variant names the failing target so
/// callers never see an opaque generic failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Disk or permission error during scan/persist/relocate. Not retried:
    /// a silent retry against a corrupt mount could mask data loss.
    #[error("io failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured vault root is missing or unreadable. Fatal to
    /// init/reload; any prior graph is left untouched.
    #[error("initialization failed: {reason}")]
    Init { reason: String },

    /// Two notes claim the same id. Fatal to build; surfaced for manual
    /// resolution, never auto-merged.
    #[error("duplicate identity {id}: claimed by '{first}' and '{second}'")]
    DuplicateId {
        id: NoteId,
        first: String,
        second: String,
    },

    /// Two notes in the same vault claim the same hierarchical name.
    #[error("name collision in vault '{vault}': '{name}'")]
    NameCollision { vault: String, name: String },

    /// A reference could not be resolved under the `fail` missing-target
    /// policy. Aborts the resolve call only; the graph is untouched.
    #[error("unresolved reference '{target}'")]
    Unresolved { target: String },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn init(reason: impl Into<String>) -> Self {
        EngineError::Init {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
