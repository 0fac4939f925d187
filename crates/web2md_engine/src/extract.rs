use std::sync::LazyLock;

use dom_smoothie::{Config, Readability};
use regex::Regex;
use scraper::{Html, Selector};
use web2md_logging::engine_debug;

use crate::document::ParsedDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub title: Option<String>,
    pub content_html: Option<String>,
    /// Characters of visible text in `content_html`.
    pub text_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to extract article content: no readable content found")]
    NoCandidates,
    #[error("failed to extract article content: main content has {chars} characters, need {required}")]
    TooShort { chars: usize, required: usize },
}

pub trait Extractor: Send + Sync {
    fn extract(&self, doc: &ParsedDocument) -> Result<ArticleRecord, ExtractionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Extraction fails when the selected content has less text than this.
    pub min_content_chars: usize,
    /// Element budget for the readability pass; `0` means no limit.
    pub max_elements: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            min_content_chars: 80,
            max_elements: 0,
        }
    }
}

static TITLE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*)\s(?:\||-|–|—|»|::)\s").expect("valid title separator pattern")
});

/// Readability extraction backed by `dom_smoothie`.
///
/// Relative links and image sources in the returned fragment are absolute,
/// resolved against the document base.
#[derive(Debug, Default, Clone)]
pub struct ReadabilityExtractor {
    settings: ExtractSettings,
}

impl ReadabilityExtractor {
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }

    fn config(&self) -> Config {
        Config {
            max_elements_to_parse: self.settings.max_elements,
            char_threshold: self.settings.min_content_chars,
            ..Default::default()
        }
    }
}

impl Extractor for ReadabilityExtractor {
    fn extract(&self, doc: &ParsedDocument) -> Result<ArticleRecord, ExtractionError> {
        let mut readability = Readability::new(
            doc.markup(),
            Some(doc.base_url().as_str()),
            Some(self.config()),
        )
        .map_err(|err| {
            engine_debug!("Readability setup failed: {:?}", err);
            ExtractionError::NoCandidates
        })?;
        let article = readability.parse().map_err(|err| {
            engine_debug!("Readability found no article: {:?}", err);
            ExtractionError::NoCandidates
        })?;

        let title = extract_title(doc.html()).or_else(|| {
            let fallback = collapse_whitespace(&article.title);
            (!fallback.is_empty()).then_some(fallback)
        });

        let text_length = normalized_len(&article.text_content);
        if text_length < self.settings.min_content_chars {
            return Err(ExtractionError::TooShort {
                chars: text_length,
                required: self.settings.min_content_chars,
            });
        }

        let content = article.content.to_string();
        let content = match title.as_deref() {
            Some(title) => drop_title_heading(&content, title),
            None => content,
        };

        Ok(ArticleRecord {
            title,
            content_html: Some(content),
            text_length,
        })
    }
}

/// Removes the first `h1`/`h2` that repeats the title; the document heading already carries it.
fn drop_title_heading(content: &str, title: &str) -> String {
    let key = collapse_whitespace(title).to_lowercase();
    let fragment = Html::parse_fragment(content);
    let Ok(headings) = Selector::parse("h1, h2") else {
        return content.to_string();
    };
    let duplicate = fragment.select(&headings).find(|heading| {
        collapse_whitespace(&heading.text().collect::<String>()).to_lowercase() == key
    });
    match duplicate {
        Some(heading) => content.replacen(&heading.html(), "", 1),
        None => content.to_string(),
    }
}

/// Title from `<title>`, then `og:title`/`twitter:title`, then the first `<h1>`.
pub fn extract_title(html: &Html) -> Option<String> {
    first_text(html, "head title")
        .map(|title| strip_site_suffix(&title))
        .or_else(|| {
            meta_content(
                html,
                r#"meta[property="og:title"], meta[name="twitter:title"]"#,
            )
        })
        .or_else(|| first_text(html, "h1"))
}

fn first_text(html: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    html.select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn meta_content(html: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    html.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|text| !text.is_empty())
}

/// `"Article Name | Site"` becomes `"Article Name"` unless that leaves fewer than three words.
fn strip_site_suffix(title: &str) -> String {
    let Some(captures) = TITLE_SEPARATOR.captures(title) else {
        return title.to_string();
    };
    let head = captures[1].trim();
    if head.split_whitespace().count() >= 3 {
        head.to_string()
    } else {
        title.to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length of `text` once whitespace runs count as a single space.
fn normalized_len(text: &str) -> usize {
    let mut words: usize = 0;
    let mut chars: usize = 0;
    for word in text.split_whitespace() {
        words += 1;
        chars += word.chars().count();
    }
    chars + words.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn site_suffix_is_removed_from_long_titles() {
        assert_eq!(
            strip_site_suffix("How Rust Handles Errors | The Blog"),
            "How Rust Handles Errors"
        );
        assert_eq!(
            strip_site_suffix("Why ownership matters - Part one - Example Weekly"),
            "Why ownership matters - Part one"
        );
    }

    #[test]
    fn short_heads_keep_the_full_title() {
        assert_eq!(strip_site_suffix("Home - Example"), "Home - Example");
        assert_eq!(strip_site_suffix("Example Title"), "Example Title");
    }

    #[test]
    fn normalized_length_collapses_whitespace() {
        assert_eq!(normalized_len("  a \n\t bc  "), 4);
        assert_eq!(normalized_len(""), 0);
    }

    #[test]
    fn title_falls_back_to_og_title_then_h1() {
        let og = Html::parse_document(
            r#"<html><head><meta property="og:title" content="From OG"></head><body><h1>From H1</h1></body></html>"#,
        );
        assert_eq!(extract_title(&og).as_deref(), Some("From OG"));

        let h1 = Html::parse_document("<body><h1> From\n H1 </h1></body>");
        assert_eq!(extract_title(&h1).as_deref(), Some("From H1"));

        let none = Html::parse_document("<body><p>text</p></body>");
        assert_eq!(extract_title(&none), None);
    }

    #[test]
    fn only_the_first_matching_heading_is_dropped() {
        let content = "<div><h1>Example  Title</h1><p>Body</p><h2>Example Title</h2></div>";
        assert_eq!(
            drop_title_heading(content, "example title"),
            "<div><p>Body</p><h2>Example Title</h2></div>"
        );
    }

    #[test]
    fn unrelated_headings_are_kept() {
        let content = "<div><h2>Background</h2><p>Body</p></div>";
        assert_eq!(drop_title_heading(content, "Example Title"), content);
    }

    #[test]
    fn extraction_thresholds_reach_the_readability_config() {
        let extractor = ReadabilityExtractor::new(ExtractSettings {
            min_content_chars: 42,
            max_elements: 9000,
        });
        let config = extractor.config();
        assert_eq!(config.char_threshold, 42);
        assert_eq!(config.max_elements_to_parse, 9000);
    }
}
