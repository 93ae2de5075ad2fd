use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "crosslink")]
#[command(about = "Annotate a page fixture with resolved cross-platform links")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Page fixture (JSON) describing containers and items
	#[arg(long, value_name = "PATH")]
	pub page: PathBuf,

	/// Resolver answers (JSON object of id to target, `null` for known-absent)
	#[arg(long, value_name = "PATH")]
	pub responses: Option<PathBuf>,

	/// Settings file (TOML); defaults apply when omitted or missing
	#[arg(long, value_name = "PATH")]
	pub settings: Option<PathBuf>,

	/// Persistent cache file (JSON); an in-memory store is used when omitted
	#[arg(long, value_name = "PATH")]
	pub store: Option<PathBuf>,

	/// Also print the redirect target for this page URL
	#[arg(long, value_name = "URL")]
	pub redirect: Option<String>,

	/// How long to let the session run (retries included)
	#[arg(long, value_name = "MS", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
	pub settle_ms: u64,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}

impl Cli {
	pub fn settle(&self) -> Duration {
		Duration::from_millis(self.settle_ms)
	}
}
