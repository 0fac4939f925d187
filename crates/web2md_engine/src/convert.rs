use std::sync::OnceLock;

use ego_tree::NodeId;
use htmd::options::{BulletListMarker, CodeBlockFence, CodeBlockStyle, HeadingStyle, Options};
use htmd::HtmlToMarkdown;
use scraper::node::Node;
use scraper::Html;
use web2md_logging::engine_warn;

pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// Elements whose whole subtree is left out of the Markdown.
const SKIPPED_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "iframe", "form", "button", "input",
    "select", "textarea", "svg", "canvas", "object", "embed", "nav",
];

/// Text under these is emitted verbatim by the converter.
const LITERAL_TAGS: &[&str] = &["pre", "code", "kbd", "samp"];

/// Elements whose first text starts a Markdown line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "td", "th", "dd", "dt",
    "section", "article", "figcaption", "body", "html",
];

fn converter() -> &'static HtmlToMarkdown {
    static CONVERTER: OnceLock<HtmlToMarkdown> = OnceLock::new();
    CONVERTER.get_or_init(|| {
        HtmlToMarkdown::builder()
            .skip_tags(SKIPPED_TAGS.to_vec())
            .options(Options {
                heading_style: HeadingStyle::Atx,
                bullet_list_marker: BulletListMarker::Dash,
                code_block_style: CodeBlockStyle::Fenced,
                code_block_fence: CodeBlockFence::Backticks,
                ..Default::default()
            })
            .build()
    })
}

/// Converts an HTML fragment to Markdown with `htmd`.
///
/// Scripting, styling and form controls produce no output. Angle brackets
/// and entity-like ampersands in text stay literal instead of becoming markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownConverter;

impl Converter for MarkdownConverter {
    fn to_markdown(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }
        match converter().convert(&protect_text(html)) {
            Ok(markdown) => markdown.trim().to_string(),
            Err(err) => {
                engine_warn!("Markdown conversion failed: {}", err);
                String::new()
            }
        }
    }
}

/// Re-serializes `html` with text nodes escaped for Markdown output.
fn protect_text(html: &str) -> String {
    let mut fragment = Html::parse_fragment(html);
    let rewrites: Vec<(NodeId, String)> = fragment
        .tree
        .nodes()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let literal = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| LITERAL_TAGS.contains(&el.name()))
            });
            if literal {
                return None;
            }
            let mut escaped = escape_markup(text);
            let starts_line = node.prev_sibling().is_none()
                && node.parent().is_some_and(|parent| {
                    parent
                        .value()
                        .as_element()
                        .is_none_or(|el| BLOCK_TAGS.contains(&el.name()))
                });
            if starts_line {
                escaped = escape_line_start(&escaped);
            }
            (escaped.as_str() != &**text).then(|| (node.id(), escaped))
        })
        .collect();

    for (id, escaped) in rewrites {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            if let Node::Text(text) = node.value() {
                text.text = escaped.as_str().into();
            }
        }
    }
    fragment.root_element().inner_html()
}

/// `<`, `>` and the `&` of entity-shaped text written as entities, which
/// Markdown renders literally.
fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (at, ch) in text.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if looks_like_entity(&text[at + 1..]) => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `rest` follows an `&`: true for `copy;`, `#38;` and `#x26;`.
fn looks_like_entity(rest: &str) -> bool {
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
        .unwrap_or(rest.len());
    name_len > 0 && rest[name_len..].starts_with(';')
}

/// Rewrites a leading block marker (`#`, `=`, `-`, `+`, `*`, `1.`, `1)`) as a
/// numeric character reference so the line stays a paragraph.
fn escape_line_start(text: &str) -> String {
    let body = text.trim_start();
    let indent = &text[..text.len() - body.len()];
    let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let bullet = |rest: &str| rest.is_empty() || rest.starts_with([' ', '\t']);
    let marker_at = match body.chars().next() {
        Some('#' | '=') => Some(0),
        Some('-' | '+' | '*') if bullet(&body[1..]) => Some(0),
        Some('0'..='9') if body[digits..].starts_with(['.', ')']) => Some(digits),
        _ => None,
    };
    let Some(at) = marker_at else {
        return text.to_string();
    };
    // Every marker is ASCII.
    let marker = body.as_bytes()[at];
    format!("{indent}{}&#{marker};{}", &body[..at], &body[at + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn markup_characters_in_text_become_entities() {
        assert_eq!(escape_markup("a <b> & c"), "a &lt;b&gt; & c");
        assert_eq!(escape_markup("&amp; &#38;"), "&amp;amp; &amp;#38;");
        assert_eq!(escape_markup("AT&T; R&D"), "AT&amp;T; R&D");
    }

    #[test]
    fn leading_block_markers_become_references() {
        assert_eq!(escape_line_start("# not a heading"), "&#35; not a heading");
        assert_eq!(escape_line_start("  - item"), "  &#45; item");
        assert_eq!(escape_line_start("12. twelve"), "12&#46; twelve");
        assert_eq!(escape_line_start("3) three"), "3&#41; three");
        assert_eq!(escape_line_start("-5 degrees"), "-5 degrees");
        assert_eq!(escape_line_start("2024 was long"), "2024 was long");
    }

    #[test]
    fn only_text_at_a_block_start_is_marked() {
        let html = protect_text("<p># title</p><p>see <b>this</b> # not</p>");
        assert!(html.contains("<p>&amp;#35; title</p>"));
        assert!(html.contains("</b> # not</p>"));
    }

    #[test]
    fn code_text_is_left_alone() {
        let html = protect_text("<p>x &lt; y</p><pre><code>if a &lt; b {}</code></pre>");
        assert!(html.contains("x &amp;lt; y"));
        assert!(html.contains("if a &lt; b {}"));
    }

    #[test]
    fn unchanged_text_round_trips() {
        assert_eq!(protect_text("<p>plain <b>bold</b></p>"), "<p>plain <b>bold</b></p>");
    }
}
