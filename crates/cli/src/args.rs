use clap::Parser;
use std::path::PathBuf;

/// Aggregate catalog metadata into one consolidated document per media kind.
#[derive(Debug, Parser)]
#[command(name = "plexmeta", version)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, env = "PLEXMETA_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Compute everything, write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Only process this library (repeatable; overrides the config)
    #[arg(short, long = "library", value_name = "NAME")]
    pub libraries: Vec<String>,

    /// Log as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Print the per-library summaries as JSON on stdout when done
    #[arg(long)]
    pub summary_json: bool,
}

impl Args {
    /// Libraries to run: the command line wins over the config.
    pub fn selected_libraries(&self, configured: &[String]) -> Vec<String> {
        if self.libraries.is_empty() {
            configured.to_vec()
        } else {
            self.libraries.clone()
        }
    }
}
