use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use web2md_engine::{PipelineConfig, DEFAULT_FALLBACK};
use web2md_logging::LogDestination;

#[derive(Parser, Debug)]
#[command(name = "web2md")]
#[command(version, about = "Fetch web content, extract article, convert to Markdown, and save.")]
pub struct Args {
    /// URL of the website to fetch
    #[arg(short, long)]
    pub url: String,

    /// Directory to save the Markdown file
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// User-Agent header sent with the request (defaults to a desktop browser)
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Total request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Largest accepted response body in bytes
    #[arg(long, default_value_t = 5 * 1024 * 1024)]
    pub max_bytes: u64,

    /// File name used when the page has no title
    #[arg(long, default_value = DEFAULT_FALLBACK)]
    pub fallback_title: String,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default_with_output(&self.output_dir);
        config.fallback_title = self.fallback_title.clone();
        config.fetch.request_timeout = Duration::from_secs(self.timeout);
        config.fetch.max_bytes = self.max_bytes;
        if let Some(agent) = &self.user_agent {
            config.fetch.user_agent = agent.clone();
        }
        config
    }

    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }
}
