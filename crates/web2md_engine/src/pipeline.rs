use std::path::PathBuf;

use web2md_logging::{engine_debug, engine_info, engine_warn};

use crate::convert::{Converter, MarkdownConverter};
use crate::decode::decode_html;
use crate::document::{parse_document, ParsedDocument};
use crate::extract::{ArticleRecord, ExtractSettings, Extractor, ReadabilityExtractor};
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::filename::{sanitize_filename, DEFAULT_FALLBACK};
use crate::persist::{ensure_output_dir, write_document, OutputTarget};
use crate::{FetchOutput, PipelineError, RunReport, Stage};

/// Process-lifetime settings for one invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub fallback_title: String,
    pub fetch: FetchSettings,
    pub extract: ExtractSettings,
}

impl PipelineConfig {
    pub fn default_with_output(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fallback_title: DEFAULT_FALLBACK.to_string(),
            fetch: FetchSettings::default(),
            extract: ExtractSettings::default(),
        }
    }
}

/// Fetch -> parse -> extract -> convert -> write, stopping at the first failure.
///
/// Every step returns `Result<_, PipelineError>` tagged with its stage; the
/// output file is only touched once all earlier steps succeeded.
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn Extractor>,
    converter: Box<dyn Converter>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let fetcher = ReqwestFetcher::new(config.fetch.clone());
        let extractor = ReadabilityExtractor::new(config.extract.clone());
        Self {
            config,
            fetcher: Box::new(fetcher),
            extractor: Box::new(extractor),
            converter: Box::new(MarkdownConverter),
        }
    }

    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn with_extractor(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, url: &str) -> Result<RunReport, PipelineError> {
        let fetched = self.fetch(url).await?;
        let document = self.parse(&fetched)?;
        let article = self.extract(&document)?;
        drop(document);
        let markdown = self.convert(&article);
        let report = self.write(&article, &markdown)?;
        engine_debug!("Pipeline state: {}", Stage::Done);
        engine_info!("Successfully converted and saved.");
        Ok(report)
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutput, PipelineError> {
        engine_info!("Fetching content from: {}", url);
        let fetched = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|err| PipelineError::new(Stage::Fetching, err))?;
        engine_debug!(
            "Fetched {} bytes (final url {}, {} redirects, content type {:?})",
            fetched.metadata.byte_len,
            fetched.metadata.final_url,
            fetched.metadata.redirect_count,
            fetched.metadata.content_type
        );
        Ok(fetched)
    }

    fn parse(&self, fetched: &FetchOutput) -> Result<ParsedDocument, PipelineError> {
        engine_info!("Parsing HTML content...");
        let decoded = decode_html(&fetched.bytes, fetched.metadata.content_type.as_deref())
            .map_err(|err| PipelineError::new(Stage::Parsing, err))?;
        engine_debug!("Decoded payload as {}", decoded.encoding_label);
        // Relative references resolve against where the page actually came from.
        parse_document(&decoded.html, &fetched.metadata.final_url)
            .map_err(|err| PipelineError::new(Stage::Parsing, err))
    }

    fn extract(&self, document: &ParsedDocument) -> Result<ArticleRecord, PipelineError> {
        let article = self
            .extractor
            .extract(document)
            .map_err(|err| PipelineError::new(Stage::Extracting, err))?;
        engine_info!(
            "Article title: {}",
            article.title.as_deref().unwrap_or("(none)")
        );
        engine_debug!("Extracted {} characters of text", article.text_length);
        Ok(article)
    }

    fn convert(&self, article: &ArticleRecord) -> String {
        engine_info!("Converting content to Markdown...");
        let markdown = self
            .converter
            .to_markdown(article.content_html.as_deref().unwrap_or_default());
        if markdown.trim().is_empty() {
            engine_warn!("Converted Markdown body is empty; writing the title only");
        }
        markdown
    }

    fn write(&self, article: &ArticleRecord, markdown: &str) -> Result<RunReport, PipelineError> {
        let filename = sanitize_filename(article.title.as_deref(), &self.config.fallback_title);
        let target = OutputTarget::new(&self.config.output_dir, filename);
        engine_info!(
            "Ensuring output directory exists: {}",
            self.config.output_dir.display()
        );
        ensure_output_dir(&self.config.output_dir)
            .map_err(|err| PipelineError::new(Stage::Writing, err))?;
        engine_info!("Saving Markdown to: {}", target.path().display());

        let content = render_document(article.title.as_deref(), markdown);
        let output_path = write_document(&target, &content)
            .map_err(|err| PipelineError::new(Stage::Writing, err))?;

        Ok(RunReport {
            title: article.title.clone(),
            output_path,
            bytes_written: content.len() as u64,
            markdown_chars: markdown.chars().count(),
        })
    }
}

/// `# {title}`, a blank line, then the body.
pub fn render_document(title: Option<&str>, body_markdown: &str) -> String {
    format!("# {}\n\n{body_markdown}", title.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn document_starts_with_title_heading() {
        assert_eq!(
            render_document(Some("Example Title"), "Body"),
            "# Example Title\n\nBody"
        );
    }

    #[test]
    fn missing_title_leaves_an_empty_heading() {
        assert_eq!(render_document(None, "Body"), "# \n\nBody");
    }

    #[test]
    fn default_config_uses_output_fallback() {
        let config = PipelineConfig::default_with_output("out");
        assert_eq!(config.fallback_title, "output");
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }
}
