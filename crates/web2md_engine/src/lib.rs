//! web2md engine: fetch a page, extract the article, convert it to Markdown and save it.
mod convert;
mod decode;
pub mod diagnostic;
mod document;
mod extract;
mod fetch;
mod filename;
mod persist;
mod pipeline;
mod types;

pub use convert::{Converter, MarkdownConverter};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use document::{parse_document, ParseError, ParsedDocument};
pub use extract::{
    extract_title, ArticleRecord, ExtractSettings, ExtractionError, Extractor,
    ReadabilityExtractor,
};
pub use fetch::{
    body_preview, FetchSettings, Fetcher, ReqwestFetcher, BODY_PREVIEW_CHARS, DEFAULT_USER_AGENT,
};
pub use filename::{sanitize_filename, DEFAULT_FALLBACK};
pub use persist::{ensure_output_dir, write_document, OutputTarget, PersistError, MARKDOWN_EXTENSION};
pub use pipeline::{render_document, Pipeline, PipelineConfig};
pub use types::{
    ErrorKind, FailureKind, FetchError, FetchMetadata, FetchOutput, PipelineError, RunReport,
    Stage,
};
