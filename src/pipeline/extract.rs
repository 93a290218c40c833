//! Reference extraction: find image references in Markdown text.
//!
//! Two syntaxes are recognised:
//!
//! * **Link**: `![alt](target)`; `target` is captured verbatim.
//! * **Embed**: `![[target]]` or `![[target|alias]]`; the alias is dropped.
//!
//! Matches inside code fences and inline code spans are *not* excluded.
//! Both regexes are line-bound (`.` does not cross `\n`).

use crate::config::ExtractionPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// File extensions accepted by [`ExtractionPolicy::ImageEmbedsOnly`].
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Which syntax a reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSyntax {
    /// `![alt](target)`
    Link,
    /// `![[target|alias]]`
    Embed,
}

/// One image reference found in a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// The reference string, used as the rewrite key.
    pub target: String,
    pub syntax: ReferenceSyntax,
}

impl ImageReference {
    pub fn link(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            syntax: ReferenceSyntax::Link,
        }
    }

    pub fn embed(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            syntax: ReferenceSyntax::Embed,
        }
    }
}

static RE_MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").unwrap());

static RE_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[\[(.*?)\]\]").unwrap());

/// Extract image references from `text`.
///
/// With [`ExtractionPolicy::LinksAndEmbeds`] the result holds every link in
/// document order, followed by every embed in document order. Duplicates are
/// kept. No matches yields an empty vector.
pub fn extract_references(text: &str, policy: ExtractionPolicy) -> Vec<ImageReference> {
    let mut refs = Vec::new();

    if policy == ExtractionPolicy::LinksAndEmbeds {
        refs.extend(
            RE_MARKDOWN_IMAGE
                .captures_iter(text)
                .map(|caps| ImageReference::link(&caps[1])),
        );
    }

    let embeds = RE_EMBED.captures_iter(text).map(|caps| {
        let inner = caps.get(1).map_or("", |m| m.as_str());
        strip_alias(inner).to_string()
    });

    match policy {
        ExtractionPolicy::LinksAndEmbeds => refs.extend(embeds.map(ImageReference::embed)),
        ExtractionPolicy::ImageEmbedsOnly => refs.extend(
            embeds
                .filter(|t| has_image_extension(t))
                .map(ImageReference::embed),
        ),
    }

    refs
}

/// Everything before the first `|`.
fn strip_alias(inner: &str) -> &str {
    inner.split('|').next().unwrap_or(inner)
}

/// `true` when `target` ends in one of [`IMAGE_EXTENSIONS`], ignoring case.
pub fn has_image_extension(target: &str) -> bool {
    target
        .rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(text: &str, policy: ExtractionPolicy) -> Vec<String> {
        extract_references(text, policy)
            .into_iter()
            .map(|r| r.target)
            .collect()
    }

    #[test]
    fn empty_when_no_references() {
        let text = "# Title\n\nJust [a link](page.md) and [[a note]].\n";
        assert!(extract_references(text, ExtractionPolicy::LinksAndEmbeds).is_empty());
        assert!(extract_references(text, ExtractionPolicy::ImageEmbedsOnly).is_empty());
    }

    #[test]
    fn links_then_embeds() {
        let text = "![[bar.jpg]]\n![a](foo.png)\n";
        let refs = extract_references(text, ExtractionPolicy::LinksAndEmbeds);
        assert_eq!(
            refs,
            vec![ImageReference::link("foo.png"), ImageReference::embed("bar.jpg")]
        );
    }

    #[test]
    fn embed_alias_is_stripped() {
        assert_eq!(
            targets("![[bar.jpg|200]]", ExtractionPolicy::LinksAndEmbeds),
            vec!["bar.jpg"]
        );
        assert_eq!(
            targets("![[bar.jpg|wide|200]]", ExtractionPolicy::LinksAndEmbeds),
            vec!["bar.jpg"]
        );
    }

    #[test]
    fn link_target_is_verbatim() {
        let text = "![alt text](../assets/my image.png) and ![](https://x.y/z.png)";
        assert_eq!(
            targets(text, ExtractionPolicy::LinksAndEmbeds),
            vec!["../assets/my image.png", "https://x.y/z.png"]
        );
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let text = "![a](x.png) ![b](y.png) ![c](x.png)";
        assert_eq!(
            targets(text, ExtractionPolicy::LinksAndEmbeds),
            vec!["x.png", "y.png", "x.png"]
        );
    }

    #[test]
    fn image_embeds_only_filters_extensions_and_links() {
        let text = "![a](foo.png)\n![[diagram.PNG]]\n![[doc.pdf]]\n![[Other note]]\n![[pic.webp|50]]";
        assert_eq!(
            targets(text, ExtractionPolicy::ImageEmbedsOnly),
            vec!["diagram.PNG", "pic.webp"]
        );
    }

    #[test]
    fn matches_inside_code_are_not_excluded() {
        let text = "```\n![a](in-fence.png)\n```\n`![[inline.png]]`";
        assert_eq!(
            targets(text, ExtractionPolicy::LinksAndEmbeds),
            vec!["in-fence.png", "inline.png"]
        );
    }

    #[test]
    fn link_does_not_span_lines() {
        let text = "![a\n](foo.png)";
        assert!(extract_references(text, ExtractionPolicy::LinksAndEmbeds).is_empty());
    }

    #[test]
    fn extension_check() {
        assert!(has_image_extension("a/b/c.JPEG"));
        assert!(has_image_extension("x.gif"));
        assert!(!has_image_extension("x.svg"));
        assert!(!has_image_extension("png"));
    }
}
