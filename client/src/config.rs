use serde::{Deserialize, Serialize};
use tracing::Level;
use warp_sync_core::{
	types::{tracing_level_format, Checkpoint},
	warp_sync::WarpSyncConfig,
};

/// Representation of a configuration used by this project.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RuntimeConfig {
	#[serde(flatten)]
	pub warp_sync: WarpSyncConfig,
	/// Trusted finalized block warp sync starts from.
	pub checkpoint: Checkpoint,
	/// File with SCALE encoded warp sync responses (default: "warp_sync_fragments.scale").
	pub fragments_path: String,
	/// File with runtime code of the finalized head (default: None).
	pub runtime_path: Option<String>,
	/// Log level, default is `INFO`. See `<https://docs.rs/log/0.4.14/log/enum.LevelFilter.html>` for possible log level values. (default: `INFO`).
	#[serde(with = "tracing_level_format")]
	pub log_level: Level,
	/// If set to true, logs are displayed in JSON format, which is used for structured logging. Otherwise, plain text format is used (default: false).
	pub log_format_json: bool,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		RuntimeConfig {
			warp_sync: WarpSyncConfig::default(),
			checkpoint: Checkpoint::default(),
			fragments_path: "warp_sync_fragments.scale".to_string(),
			runtime_path: None,
			log_level: Level::INFO,
			log_format_json: false,
		}
	}
}
