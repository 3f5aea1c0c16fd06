use crate::cli::CliOpts;
use clap::Parser;
use color_eyre::{
	eyre::{eyre, WrapErr},
	Result,
};
use config::RuntimeConfig;
use fragments::{FileFragmentSource, FileRuntimeSource};
use std::{fs, time::Duration};
use tracing::{error, info, info_span, warn, Instrument};
use warp_sync_core::{
	data::MemoryDB,
	network::PeerNotifier,
	utils::{default_subscriber, install_panic_hooks, json_subscriber, spawn_in_span},
	warp_sync::{FinishReason, WarpSyncContext, WarpSyncMachine},
};

mod cli;
mod config;
mod fragments;

pub fn load_runtime_config(opts: &CliOpts) -> Result<RuntimeConfig> {
	let mut cfg = if let Some(config_path) = &opts.config {
		fs::metadata(config_path).map_err(|_| eyre!("Provided config file doesn't exist."))?;
		confy::load_path(config_path)
			.wrap_err(format!("Failed to load configuration from {}", config_path))?
	} else {
		RuntimeConfig::default()
	};

	cfg.log_format_json = opts.logs_json || cfg.log_format_json;
	cfg.log_level = opts.verbosity.unwrap_or(cfg.log_level);

	// Flags override the config parameters
	if let Some(fragments) = &opts.fragments {
		cfg.fragments_path = fragments.to_string();
	}
	if let Some(runtime) = &opts.runtime {
		cfg.runtime_path = Some(runtime.to_string());
	}
	if let Some(timeout) = opts.fragment_request_timeout {
		cfg.warp_sync.fragment_request_timeout = Duration::from_secs(timeout);
	}

	Ok(cfg)
}

async fn run(cfg: RuntimeConfig) -> Result<()> {
	if cfg.checkpoint.authorities.is_empty() {
		return Err(eyre!("Checkpoint authority set is empty"));
	}

	let db = MemoryDB::default();
	let fragment_source = FileFragmentSource::open(&cfg.fragments_path)?;
	let runtime_source = FileRuntimeSource::new(cfg.runtime_path.clone());

	let (notifier, mut notifications) =
		PeerNotifier::channel(cfg.warp_sync.notification_channel_capacity);
	spawn_in_span(async move {
		while let Some(message) = notifications.recv().await {
			info!(
				round = message.round,
				set_id = message.set_id,
				last_finalized = message.last_finalized,
				"Sending neighbour message"
			);
		}
	});

	let ctx = WarpSyncContext::new(
		cfg.warp_sync.clone(),
		db,
		fragment_source,
		runtime_source,
		&cfg.checkpoint,
	)
	.with_notifier(notifier);

	let (reason, ctx) = WarpSyncMachine::new(ctx).run().await?;
	match reason {
		FinishReason::Completed { block_number } => {
			let sync_state = ctx.sync_state();
			info!(
				block_number,
				block_hash = ?sync_state.last_finalized_block_hash(),
				state_root = ?sync_state.state_root(),
				"Warp sync done"
			);
			Ok(())
		},
		FinishReason::Aborted { .. } => Err(eyre!("{reason}")),
	}
}

#[tokio::main]
pub async fn main() -> Result<()> {
	let opts = CliOpts::parse();
	let cfg = load_runtime_config(&opts)?;

	if cfg.log_format_json {
		tracing::subscriber::set_global_default(json_subscriber(cfg.log_level))?;
	} else {
		tracing::subscriber::set_global_default(default_subscriber(cfg.log_level))?;
	};

	// install custom panic hooks
	install_panic_hooks()?;

	let span = info_span!(
		"warp_sync",
		checkpoint = cfg.checkpoint.block_number,
		set_id = cfg.checkpoint.set_id
	);

	tokio::select! {
		result = run(cfg).instrument(span) => {
			if let Err(error) = &result {
				error!("{error:#}");
			}
			result.wrap_err("Warp sync client failed")
		},
		_ = tokio::signal::ctrl_c() => {
			warn!("Interrupted, stopping warp sync");
			Ok(())
		},
	}
}
