use scraper::Html;
use url::Url;

use crate::decode::DecodeError;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("invalid base address {address:?}: {message}")]
    InvalidBase { address: String, message: String },
}

/// A parsed page together with the address its relative references resolve against.
///
/// Parsing follows the HTML5 tree construction rules, so malformed markup is
/// repaired instead of rejected.
pub struct ParsedDocument {
    markup: String,
    html: Html,
    base_url: Url,
}

impl ParsedDocument {
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// The decoded source the tree was built from.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// The effective base: a `<base href>` in the document wins over the fetch address.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a reference found in the document to an absolute URL.
    ///
    /// Returns `None` for references that must not be followed (`javascript:`)
    /// or that cannot be resolved at all.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        resolve_reference(reference, &self.base_url)
    }
}

pub fn parse_document(markup: &str, base_address: &str) -> Result<ParsedDocument, ParseError> {
    let address = Url::parse(base_address).map_err(|err| ParseError::InvalidBase {
        address: base_address.to_string(),
        message: err.to_string(),
    })?;
    let html = Html::parse_document(markup);
    let base_url = document_base(&html, &address).unwrap_or(address);
    Ok(ParsedDocument {
        markup: markup.to_string(),
        html,
        base_url,
    })
}

fn document_base(html: &Html, address: &Url) -> Option<Url> {
    let selector = scraper::Selector::parse("base[href]").ok()?;
    let href = html.select(&selector).next()?.value().attr("href")?;
    address.join(href.trim()).ok()
}

pub(crate) fn resolve_reference(reference: &str, base: &Url) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed
        .get(..11)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
    {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url.into());
    }
    base.join(trimmed).ok().map(Into::into)
}
