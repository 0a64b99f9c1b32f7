//! Link annotation: seed an edit form from the selection, then commit a
//! validated label/href either into an existing link or as a new one.

use std::sync::LazyLock;

use regex::Regex;
use smol_str::SmolStr;

use crate::error::LinkError;
use crate::surface::EditingSurface;
use crate::tree::{DomRange, NodeId, NodeKind, Position};

/// What a committed link edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    /// A link node found among the selection's ancestors.
    Existing(NodeId),
    /// Replace this range with a new link.
    Insert(DomRange),
}

/// Initial form values plus where the edit lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSeed {
    pub label: String,
    pub href: String,
    pub target: LinkTarget,
}

impl LinkSeed {
    pub fn is_existing(&self) -> bool {
        matches!(self.target, LinkTarget::Existing(_))
    }
}

/// Attributes written on every committed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAttrs {
    pub target: SmolStr,
    pub rel: SmolStr,
}

impl Default for LinkAttrs {
    fn default() -> Self {
        Self {
            target: SmolStr::new_static("_blank"),
            rel: SmolStr::new_static("noopener noreferrer"),
        }
    }
}

/// An href that survives a trip through `[label](href)`.
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https://[^\s()]+$").unwrap());

/// Check a label/href pair before commit.
///
/// Anything accepted here serializes to a link the compiler reads back.
pub fn validate(label: &str, href: &str) -> Result<(), LinkError> {
    let href = href.trim();
    if !href.starts_with("https://") {
        return Err(LinkError::InsecureHref(href.to_string()));
    }
    if !HREF_RE.is_match(href) {
        return Err(LinkError::MalformedHref(href.to_string()));
    }
    if label.trim().is_empty() {
        return Err(LinkError::EmptyLabel);
    }
    if label.contains([']', '\n']) {
        return Err(LinkError::InvalidLabel);
    }
    Ok(())
}

/// Whether the commit action should be enabled.
pub fn can_commit(label: &str, href: &str) -> bool {
    validate(label, href).is_ok()
}

/// Seed the link form for `range`.
///
/// Walks up from the range start to the editable root looking for a link;
/// otherwise seeds from the selected plain text. `None` if the range is
/// outside the root.
pub fn open<S: EditingSurface + ?Sized>(surface: &S, range: DomRange) -> Option<LinkSeed> {
    if !surface.contains_range(&range) {
        return None;
    }
    let tree = surface.tree();
    let root = tree.root();
    let existing = tree
        .self_and_ancestors(range.start.node)
        .take_while(|&id| id != root)
        .find(|&id| tree.kind(id).is_link());

    let seed = match existing {
        Some(link) => {
            let href = match tree.kind(link) {
                NodeKind::Link { href, .. } => href.clone().unwrap_or_default(),
                _ => String::new(),
            };
            LinkSeed {
                label: tree.text_content(link),
                href,
                target: LinkTarget::Existing(link),
            }
        }
        None => LinkSeed {
            label: tree.text_in_range(&range),
            href: String::new(),
            target: LinkTarget::Insert(range),
        },
    };
    tracing::debug!(
        target: "varmark::link",
        existing = seed.is_existing(),
        label_len = seed.label.len(),
        "link form opened"
    );
    Some(seed)
}

/// Commit a link edit. On success the caret sits just after the link and
/// its position is returned. Nothing is written when validation fails.
pub fn apply<S: EditingSurface + ?Sized>(
    surface: &mut S,
    seed: &LinkSeed,
    label: &str,
    href: &str,
    attrs: &LinkAttrs,
) -> Result<Position, LinkError> {
    validate(label, href)?;
    let href = href.trim().to_string();
    let kind = NodeKind::Link {
        href: Some(href),
        target: Some(attrs.target.clone()),
        rel: Some(attrs.rel.clone()),
    };

    let link = match seed.target {
        LinkTarget::Existing(id) => {
            let tree = surface.tree_mut();
            if !tree.is_attached(id) || !tree.kind(id).is_link() {
                return Err(LinkError::NoSelection);
            }
            *tree.kind_mut(id) = kind;
            if tree.text_content(id) != label {
                tree.set_text_content(id, label);
            }
            id
        }
        LinkTarget::Insert(range) => {
            if !surface.contains_range(&range) {
                return Err(LinkError::NoSelection);
            }
            let tree = surface.tree_mut();
            let caret = tree.delete_range(&range);
            let link = tree.insert_at(caret, kind);
            tree.append(link, NodeKind::text(label));
            link
        }
    };

    let after = surface.tree().position_after(link);
    surface.set_selection(Some(DomRange::caret(after)));
    tracing::debug!(target: "varmark::link", existing = seed.is_existing(), "link applied");
    Ok(after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::memory::MemorySurface;
    use crate::serialize::serialize;
    use crate::types::Selection;

    fn range(surface: &MemorySurface, anchor: usize, head: usize) -> DomRange {
        surface
            .tree()
            .selection_to_range(Selection::new(anchor, head))
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate("docs", " https://ok "), Ok(()));
        assert_eq!(
            validate("docs", "http://insecure"),
            Err(LinkError::InsecureHref("http://insecure".into()))
        );
        assert_eq!(validate("  ", "https://ok"), Err(LinkError::EmptyLabel));
        assert!(!can_commit("x", "javascript:alert(1)"));
        assert_eq!(
            validate("docs", "https://ok.com/a b"),
            Err(LinkError::MalformedHref("https://ok.com/a b".into()))
        );
        assert!(!can_commit("docs", "https://ok.com/(x)"));
        assert!(!can_commit("docs", "https://"));
        assert_eq!(validate("a]b", "https://ok.com"), Err(LinkError::InvalidLabel));
        assert_eq!(validate("a\nb", "https://ok.com"), Err(LinkError::InvalidLabel));
    }

    #[test]
    fn test_applied_link_compiles_back() {
        for label in ["docs", "a [b", "the {page} guide"] {
            let mut surface = MemorySurface::from_markdown("see here");
            let seed = open(&surface, range(&surface, 4, 8)).unwrap();
            apply(
                &mut surface,
                &seed,
                label,
                " https://ok.com/path?q=1 ",
                &LinkAttrs::default(),
            )
            .unwrap();
            let markdown = serialize(surface.tree());
            let reread = compile(&markdown);
            let links: Vec<_> = reread
                .descendants(reread.root())
                .into_iter()
                .filter(|&id| reread.kind(id).is_link())
                .collect();
            assert_eq!(links.len(), 1, "link lost in {markdown:?}");
            assert_eq!(reread.text_content(links[0]), label);
            assert_eq!(serialize(&reread), markdown);
        }
    }

    #[test]
    fn test_open_seeds_from_existing_link() {
        let surface = MemorySurface::from_markdown("see [docs](https://example.com) here");
        let seed = open(&surface, range(&surface, 6, 6)).unwrap();
        assert_eq!(seed.label, "docs");
        assert_eq!(seed.href, "https://example.com");
        assert!(seed.is_existing());
    }

    #[test]
    fn test_open_seeds_from_selection() {
        let surface = MemorySurface::from_markdown("read **the** manual");
        let seed = open(&surface, range(&surface, 5, 15)).unwrap();
        assert_eq!(seed.label, "the manual");
        assert_eq!(seed.href, "");
        assert!(!seed.is_existing());
    }

    #[test]
    fn test_apply_new_link() {
        let mut surface = MemorySurface::from_markdown("read the manual now");
        let seed = open(&surface, range(&surface, 5, 15)).unwrap();
        let caret = apply(
            &mut surface,
            &seed,
            "the guide",
            "https://example.com/guide",
            &LinkAttrs::default(),
        )
        .unwrap();
        assert_eq!(
            serialize(surface.tree()),
            "read [the guide](https://example.com/guide) now"
        );
        assert_eq!(surface.tree().position_to_offset(caret), Some(14));
        assert!(surface.tree().to_html().contains(r#"rel="noopener noreferrer""#));
    }

    #[test]
    fn test_apply_existing_in_place() {
        let mut surface = MemorySurface::from_markdown("see [docs](https://a.com) here");
        let seed = open(&surface, range(&surface, 5, 5)).unwrap();
        apply(
            &mut surface,
            &seed,
            "documentation",
            "https://b.com",
            &LinkAttrs::default(),
        )
        .unwrap();
        assert_eq!(
            serialize(surface.tree()),
            "see [documentation](https://b.com) here"
        );
    }

    #[test]
    fn test_insecure_apply_writes_nothing() {
        let mut surface = MemorySurface::from_markdown("plain text");
        let seed = open(&surface, range(&surface, 0, 5)).unwrap();
        let before = surface.tree().clone();
        let err = apply(
            &mut surface,
            &seed,
            "plain",
            "http://insecure",
            &LinkAttrs::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::InsecureHref(_)));
        assert_eq!(surface.tree(), &before);
    }
}
