use clap::{command, Parser};
use tracing::Level;

#[derive(Parser)]
#[command(version)]
pub struct CliOpts {
	/// Path to the toml configuration file
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,
	/// Path to the SCALE encoded warp sync responses
	#[arg(short, long, value_name = "FILE")]
	pub fragments: Option<String>,
	/// Path to the runtime code of the finalized head
	#[arg(short, long, value_name = "FILE")]
	pub runtime: Option<String>,
	/// Fragment request timeout in seconds
	#[arg(long)]
	pub fragment_request_timeout: Option<u64>,
	/// Log level
	#[arg(long)]
	pub verbosity: Option<Level>,
	/// Set logs format to JSON
	#[arg(long)]
	pub logs_json: bool,
}
