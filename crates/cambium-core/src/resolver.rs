//! Link resolution: rewrites reference and image nodes of a parsed content
//! tree against a graph snapshot.
//!
//! The transform is read-only with respect to the graph and has exactly one
//! side effect: missing targets are appended to the diagnostics log (one raw
//! target per line, append-only, never deduplicated) so authors can
//! batch-fix broken links. Resolution decisions are deterministic for a
//! given graph snapshot.

use std::path::PathBuf;

use crate::content::BodyNode;
use crate::error::{EngineError, Result};
use crate::graph::{LookupOpts, NoteGraph};
use crate::model::Resolution;
use crate::vfs::FileSystem;

/// Sentinel target for references that resolve to nothing under the
/// stub-page policy.
pub const NOT_FOUND_TARGET: &str = "/404.html";

/// Output form requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Address by name, markdown target (`name.md`).
    SourceMarkup,
    /// Address by name, rendered target (`name.html`).
    RenderedMarkup,
    /// Resolve via name, then switch the address space to the id
    /// (`id.html`).
    IdPermalink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Abort the whole transform on the first unresolved reference.
    Fail,
    /// Rewrite unresolved references to the not-found sentinel and log them.
    StubPage,
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub mode: ResolveMode,
    pub missing: MissingPolicy,
    /// Prepended to every image target; images never consult the graph.
    pub asset_prefix: Option<String>,
    /// Display prefix annotated onto resolved references. Stripped from
    /// missing ones so a broken link never renders like a resolved one.
    pub link_prefix: Option<String>,
    /// Append-only broken-link log.
    pub diagnostics: PathBuf,
}

pub struct LinkResolver<'a> {
    graph: &'a NoteGraph,
    fs: &'a dyn FileSystem,
    opts: &'a ResolveOptions,
}

impl<'a> LinkResolver<'a> {
    pub fn new(graph: &'a NoteGraph, fs: &'a dyn FileSystem, opts: &'a ResolveOptions) -> Self {
        LinkResolver { graph, fs, opts }
    }

    /// Depth-first rewrite of every image and reference node in the tree.
    pub fn resolve(&self, nodes: &mut [BodyNode]) -> Result<()> {
        for node in nodes {
            match node {
                BodyNode::Container(children) => self.resolve(children)?,
                BodyNode::Image(image) => {
                    if let Some(prefix) = &self.opts.asset_prefix {
                        image.target = format!("{}{}", prefix, image.target);
                    }
                }
                BodyNode::Reference(reference) => {
                    let candidates = self
                        .graph
                        .lookup_by_name(&reference.target, LookupOpts::default());

                    match candidates.first() {
                        Some(note) => {
                            reference.prefix = self.opts.link_prefix.clone();
                            if reference.alias.is_none() {
                                // Display text falls back to the target's
                                // title (or last name segment).
                                reference.alias = Some(note.display_name().to_string());
                            }
                            match self.opts.mode {
                                ResolveMode::SourceMarkup => {
                                    reference.href = Some(format!("{}.md", note.name));
                                    reference.resolution = Resolution::ByName(note.id.clone());
                                }
                                ResolveMode::RenderedMarkup => {
                                    reference.href = Some(format!("{}.html", note.name));
                                    reference.resolution = Resolution::ByName(note.id.clone());
                                }
                                ResolveMode::IdPermalink => {
                                    reference.href = Some(format!("{}.html", note.id));
                                    reference.resolution = Resolution::ById(note.id.clone());
                                }
                            }
                        }
                        None => match self.opts.missing {
                            MissingPolicy::Fail => {
                                return Err(EngineError::Unresolved {
                                    target: reference.target.clone(),
                                });
                            }
                            MissingPolicy::StubPage => {
                                reference.resolution = Resolution::Missing;
                                reference.href = Some(NOT_FOUND_TARGET.to_string());
                                reference.prefix = None;
                                if let Err(e) = self
                                    .fs
                                    .append_line(&self.opts.diagnostics, &reference.target)
                                {
                                    log::warn!(
                                        "diagnostics append failed for '{}': {}",
                                        reference.target,
                                        e
                                    );
                                }
                            }
                        },
                    }
                }
                BodyNode::Text(_) => {}
            }
        }
        Ok(())
    }
}
