use std::backtrace::BacktraceStatus;
use std::fmt::Write;

use crate::{ErrorKind, PipelineError};

/// Human-readable report of a failed run, one fact per line.
pub fn render(err: &PipelineError) -> String {
    let mut out = String::from("An error occurred:\n");
    match &err.kind {
        ErrorKind::Network(fetch) => {
            let status = fetch
                .status()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(out, "HTTP Error: {status} - {}", fetch);
            if let Some(preview) = &fetch.body_preview {
                let _ = writeln!(out, "Response data preview (limited): {preview}");
            }
        }
        ErrorKind::Parse(parse) => {
            let _ = writeln!(out, "Parse Error: {parse}");
        }
        ErrorKind::Extraction(extraction) => {
            let _ = writeln!(out, "Extraction Error: {extraction}");
        }
        ErrorKind::FileSystem(persist) => {
            let _ = writeln!(out, "File System Error: {persist}");
        }
        ErrorKind::Unknown(unknown) => {
            let _ = writeln!(out, "Error: {unknown:#}");
            let backtrace = unknown.backtrace();
            if backtrace.status() == BacktraceStatus::Captured {
                let _ = writeln!(out, "{backtrace}");
            }
        }
    }
    let _ = write!(out, "(failed while {})", err.stage);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionError;
    use crate::{FailureKind, FetchError, Stage};

    #[test]
    fn http_errors_show_status_and_preview() {
        let fetch = FetchError::new(FailureKind::HttpStatus(404), "404 Not Found")
            .with_body_preview(Some("<html>gone</html>".to_string()));
        let text = render(&PipelineError::new(Stage::Fetching, fetch));

        assert!(text.contains("HTTP Error: 404"));
        assert!(text.contains("Response data preview (limited): <html>gone</html>"));
        assert!(text.ends_with("(failed while fetching)"));
    }

    #[test]
    fn connection_failures_have_no_status() {
        let fetch = FetchError::new(FailureKind::Network, "connection refused");
        let text = render(&PipelineError::new(Stage::Fetching, fetch));
        assert!(text.contains("HTTP Error: n/a - network error: connection refused"));
        assert!(!text.contains("preview"));
    }

    #[test]
    fn extraction_failures_are_labelled() {
        let err = PipelineError::new(Stage::Extracting, ExtractionError::NoCandidates);
        assert_eq!(err.kind.label(), "extraction");
        assert!(render(&err).contains("Extraction Error: failed to extract article content"));
    }

    #[test]
    fn unknown_errors_keep_their_context_chain() {
        let source = anyhow::anyhow!("root cause").context("while doing something");
        let text = render(&PipelineError::new(Stage::Converting, source));
        assert!(text.contains("Error: while doing something: root cause"));
    }
}
