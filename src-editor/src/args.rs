use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Settings file to use instead of ~/.tessera/settings.json
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask the AI to review a saved diagram
    Analyze(AnalyzeArgs),

    /// Parse a saved AI response against a diagram, without calling the AI
    Preview {
        /// Diagram JSON file
        diagram: PathBuf,
        /// File holding the raw AI response text
        response: PathBuf,
    },

    /// Show the stored settings, or change them when any flag is given
    Settings(SettingsArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Diagram JSON file
    pub diagram: PathBuf,

    /// Extra context for the reviewer, e.g. the problem domain
    #[arg(short, long, default_value = "")]
    pub context: String,

    /// Apply the proposed changes instead of only previewing them
    #[arg(long)]
    pub apply: bool,

    /// Where to write the updated diagram (defaults to the input file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the configured AI provider for this run
    #[arg(long)]
    pub provider: Option<String>,

    /// Override the configured AI model for this run
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    /// Empty keeps the stored key
    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Collaboration endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub session_token: Option<String>,

    #[arg(long)]
    pub user_id: Option<String>,

    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl SettingsArgs {
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.model.is_none()
            && self.api_key.is_none()
            && self.timeout_secs.is_none()
            && self.endpoint.is_none()
            && self.session_token.is_none()
            && self.user_id.is_none()
            && self.interval_ms.is_none()
    }
}
