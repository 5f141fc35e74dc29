//! Note body parsing.
//!
//! Turns raw markdown into a tagged content tree the link resolver can walk,
//! plus the flat link list kept on the note. Front matter is split off here
//! as well, so the store and the parser agree on where the body starts.

use pulldown_cmark::{Event, LinkType, MetadataBlockKind, Options, Parser, Tag, TagEnd};
use serde::Serialize;

use crate::model::{Link, LinkKind, Resolution};

/// Content-tree node. References and images are the nodes the link resolver
/// rewrites; containers mirror block structure (paragraphs, list items).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyNode {
    Text(String),
    Image(ImageNode),
    Reference(ReferenceNode),
    Container(Vec<BodyNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageNode {
    pub target: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceNode {
    /// Raw target token as authored, anchor split off.
    pub target: String,
    pub alias: Option<String>,
    pub anchor: Option<String>,
    pub embed: bool,
    /// Set by the resolver, never by the parser.
    pub resolution: Resolution,
    /// Output address computed by the resolver for the requested mode.
    pub href: Option<String>,
    /// Display prefix annotation; stripped when the target is missing so a
    /// broken link never looks identical to a resolved one.
    pub prefix: Option<String>,
}

impl ReferenceNode {
    fn new(target: String, alias: Option<String>, anchor: Option<String>, embed: bool) -> Self {
        ReferenceNode {
            target,
            alias,
            anchor,
            embed,
            resolution: Resolution::Unresolved,
            href: None,
            prefix: None,
        }
    }
}

pub struct ParsedNote {
    /// Raw front-matter mapping, if the file opened with a YAML block.
    pub front: Option<serde_json::Value>,
    /// Title from front matter, else the first H1.
    pub title: Option<String>,
    pub nodes: Vec<BodyNode>,
    pub links: Vec<Link>,
    /// Byte offset where the body starts (end of the front-matter block).
    pub body_offset: usize,
}

/// Parse a whole note file: front matter, content tree, outbound links.
///
/// Wikilink order is Dendron's alias-first form `[[alias|target#anchor]]`;
/// `![[target]]` is an embed. Plain markdown images become image nodes.
pub fn parse(text: &str) -> ParsedNote {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_WIKILINKS);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);

    let parser = Parser::new_ext(text, options);

    let mut front = None;
    let mut title: Option<String> = None;
    let mut links = Vec::new();
    let mut body_offset = 0;

    // Container stack; index 0 is the top level of the tree.
    let mut stack: Vec<Vec<BodyNode>> = vec![Vec::new()];

    let mut in_frontmatter = false;
    let mut frontmatter_text = String::new();

    let mut in_heading = false;
    let mut heading_level = 0u8;
    let mut heading_text = String::new();

    // (left side of the pipe, collected right side, embed)
    let mut pending_wiki: Option<(String, String, bool)> = None;
    // (dest url, collected alt text)
    let mut pending_image: Option<(String, String)> = None;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::MetadataBlock(MetadataBlockKind::YamlStyle)) => {
                in_frontmatter = true;
            }
            Event::End(TagEnd::MetadataBlock(MetadataBlockKind::YamlStyle)) => {
                in_frontmatter = false;
                if let Ok(value) = serde_yaml::from_str::<serde_json::Value>(&frontmatter_text) {
                    if let Some(t) = value.get("title").and_then(|v| v.as_str()) {
                        title = Some(t.to_string());
                    }
                    front = Some(value);
                }
                body_offset = range.end;
            }

            Event::Start(Tag::Paragraph) | Event::Start(Tag::Item) => {
                stack.push(Vec::new());
            }
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Item) => {
                if stack.len() > 1 {
                    let children = stack.pop().unwrap_or_default();
                    if let Some(parent) = stack.last_mut() {
                        parent.push(BodyNode::Container(children));
                    }
                }
            }

            Event::Start(Tag::Heading { level, .. }) => {
                in_heading = true;
                heading_level = level as u8;
                heading_text.clear();
            }
            Event::End(TagEnd::Heading(..)) => {
                in_heading = false;
                let text = heading_text.trim();
                if !text.is_empty() {
                    if heading_level == 1 && title.is_none() {
                        title = Some(text.to_string());
                    }
                    if let Some(top) = stack.last_mut() {
                        top.push(BodyNode::Container(vec![BodyNode::Text(text.to_string())]));
                    }
                }
            }

            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => {
                if matches!(link_type, LinkType::WikiLink { .. }) {
                    pending_wiki = Some((dest_url.to_string(), String::new(), false));
                }
            }
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                ..
            }) => {
                if matches!(link_type, LinkType::WikiLink { .. }) {
                    pending_wiki = Some((dest_url.to_string(), String::new(), true));
                } else {
                    pending_image = Some((dest_url.to_string(), String::new()));
                }
            }
            Event::End(TagEnd::Link { .. }) | Event::End(TagEnd::Image) => {
                if let Some((left, right, embed)) = pending_wiki.take() {
                    let node = finish_wikilink(&left, &right, embed);
                    links.push(Link {
                        target: node.target.clone(),
                        alias: node.alias.clone(),
                        anchor: node.anchor.clone(),
                        kind: if embed { LinkKind::Embed } else { LinkKind::Wiki },
                        resolution: Resolution::Unresolved,
                    });
                    if let Some(top) = stack.last_mut() {
                        top.push(BodyNode::Reference(node));
                    }
                } else if let Some((target, alt)) = pending_image.take() {
                    if let Some(top) = stack.last_mut() {
                        top.push(BodyNode::Image(ImageNode { target, alt }));
                    }
                }
            }

            Event::Text(cow) => {
                let text = cow.as_ref();
                if in_frontmatter {
                    frontmatter_text.push_str(text);
                } else if let Some((_, ref mut right, _)) = pending_wiki.as_mut() {
                    right.push_str(text);
                } else if let Some((_, ref mut alt)) = pending_image.as_mut() {
                    alt.push_str(text);
                } else if in_heading {
                    if !heading_text.is_empty() {
                        heading_text.push(' ');
                    }
                    heading_text.push_str(text);
                } else if let Some(top) = stack.last_mut() {
                    top.push(BodyNode::Text(text.to_string()));
                }
            }
            Event::Code(cow) => {
                if let Some(top) = stack.last_mut() {
                    top.push(BodyNode::Text(cow.to_string()));
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if in_heading {
                    heading_text.push(' ');
                } else if let Some(top) = stack.last_mut() {
                    top.push(BodyNode::Text("\n".to_string()));
                }
            }
            _ => {}
        }
    }

    // Unbalanced containers (malformed markup) collapse into the top level.
    while stack.len() > 1 {
        let children = stack.pop().unwrap_or_default();
        if let Some(parent) = stack.last_mut() {
            parent.push(BodyNode::Container(children));
        }
    }

    ParsedNote {
        front,
        title,
        nodes: stack.pop().unwrap_or_default(),
        links,
        body_offset,
    }
}

/// Dendron alias-first: `[[alias|target]]`. The parser hands us the left
/// side as the destination and the rendered text as the right side; when
/// both agree there is no alias.
fn finish_wikilink(left: &str, right: &str, embed: bool) -> ReferenceNode {
    let left = left.trim();
    let right = right.trim();

    let (mut target, alias) = if left == right || right.is_empty() {
        (left.to_string(), None)
    } else {
        (right.to_string(), Some(left.to_string()))
    };

    let mut anchor = None;
    if let Some(pos) = target.find('#') {
        anchor = Some(target[pos + 1..].to_string());
        target.truncate(pos);
    }

    ReferenceNode::new(target, alias, anchor, embed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references(nodes: &[BodyNode]) -> Vec<&ReferenceNode> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                BodyNode::Reference(r) => out.push(r),
                BodyNode::Container(children) => out.extend(references(children)),
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_parse_frontmatter() {
        let content = "---\nid: abc123\ntitle: My Note\n---\n# Content";
        let parsed = parse(content);

        assert_eq!(parsed.title, Some("My Note".to_string()));
        let front = parsed.front.unwrap();
        assert_eq!(front["id"], "abc123");
        // "---\nid: abc123\ntitle: My Note\n---" is 33 bytes
        assert_eq!(parsed.body_offset, 33);
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let parsed = parse("# First Heading\n\nbody");
        assert_eq!(parsed.title, Some("First Heading".to_string()));
    }

    #[test]
    fn test_parse_wiki_link() {
        let parsed = parse("# Note 1\n\n[[note2]]");
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].target, "note2");
        assert_eq!(parsed.links[0].kind, LinkKind::Wiki);
    }

    #[test]
    fn test_parse_wiki_link_with_alias() {
        let parsed = parse("[[My Alias | note2]]");
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].target, "note2");
        assert_eq!(parsed.links[0].alias, Some("My Alias".to_string()));
    }

    #[test]
    fn test_parse_wiki_link_with_anchor() {
        let parsed = parse("[[note2#section-1]]");
        assert_eq!(parsed.links[0].target, "note2");
        assert_eq!(parsed.links[0].anchor, Some("section-1".to_string()));
        assert_eq!(parsed.links[0].alias, None);
    }

    #[test]
    fn test_parse_embed() {
        let parsed = parse("![[diagram.assets]]");
        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].target, "diagram.assets");
        assert_eq!(parsed.links[0].kind, LinkKind::Embed);
    }

    #[test]
    fn test_parse_alias_and_anchor_combined() {
        let parsed = parse("[[My Alias|a.b.c#with-anchor]]");
        let link = &parsed.links[0];
        assert_eq!(link.target, "a.b.c");
        assert_eq!(link.anchor, Some("with-anchor".to_string()));
        assert_eq!(link.alias, Some("My Alias".to_string()));
    }

    #[test]
    fn test_tree_shape_references_inside_containers() {
        let parsed = parse("intro [[a.b]] outro\n\nsecond [[c]]");
        let refs = references(&parsed.nodes);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].target, "a.b");
        assert_eq!(refs[1].target, "c");
        // Two paragraphs, two containers.
        let containers = parsed
            .nodes
            .iter()
            .filter(|n| matches!(n, BodyNode::Container(_)))
            .count();
        assert_eq!(containers, 2);
    }

    #[test]
    fn test_markdown_image_node() {
        let parsed = parse("![alt text](assets/pic.png)");
        let refs = references(&parsed.nodes);
        assert!(refs.is_empty());
        let mut found = false;
        for node in &parsed.nodes {
            if let BodyNode::Container(children) = node {
                for child in children {
                    if let BodyNode::Image(img) = child {
                        assert_eq!(img.target, "assets/pic.png");
                        assert_eq!(img.alt, "alt text");
                        found = true;
                    }
                }
            }
        }
        assert!(found, "image node should be in the tree");
    }

    #[test]
    fn test_no_frontmatter_offset_zero() {
        let parsed = parse("plain body");
        assert_eq!(parsed.body_offset, 0);
        assert!(parsed.front.is_none());
    }
}
