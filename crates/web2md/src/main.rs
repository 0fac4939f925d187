mod args;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use web2md_engine::{diagnostic, Pipeline, PipelineConfig, PipelineError, RunReport, Stage};
use web2md_logging::{engine_debug, level_from_verbosity};

use crate::args::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    web2md_logging::initialize(
        args.log_destination(),
        level_from_verbosity(args.verbose, args.quiet),
    );

    match run(&args.url, args.pipeline_config()) {
        Ok(report) => {
            engine_debug!(
                "Wrote {} bytes ({} Markdown characters) to {}",
                report.bytes_written,
                report.markdown_chars,
                report.output_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", diagnostic::render(&err));
            ExitCode::FAILURE
        }
    }
}

/// One invocation runs on a single-threaded runtime; nothing else shares it.
fn run(url: &str, config: PipelineConfig) -> Result<RunReport, PipelineError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
        .map_err(startup_failure)?;
    runtime.block_on(Pipeline::new(config).run(url))
}

fn startup_failure(err: anyhow::Error) -> PipelineError {
    PipelineError::new(Stage::Startup, err)
}
