//! File backed fragment and runtime code sources.

use async_trait::async_trait;
use codec::Decode;
use color_eyre::{
	eyre::{eyre, WrapErr},
	Result,
};
use std::{collections::VecDeque, fs};
use tokio::sync::Mutex;
use tracing::debug;
use warp_sync_core::{
	network::{FragmentSource, RuntimeSource},
	types::{WarpSyncResponse, H256},
};

/// Serves stored warp sync responses, one per request.
pub struct FileFragmentSource {
	responses: Mutex<VecDeque<WarpSyncResponse>>,
}

impl FileFragmentSource {
	pub fn open(path: &str) -> Result<Self> {
		let bytes = fs::read(path).wrap_err(format!("Failed to read fragments from {path}"))?;
		Self::decode(&bytes)
	}

	pub fn decode(mut bytes: &[u8]) -> Result<Self> {
		let responses = Vec::<WarpSyncResponse>::decode(&mut bytes)
			.wrap_err("Failed to decode warp sync responses")?;
		Ok(FileFragmentSource {
			responses: Mutex::new(responses.into()),
		})
	}
}

#[async_trait]
impl FragmentSource for FileFragmentSource {
	async fn request_fragments(&self, from: H256) -> Result<WarpSyncResponse> {
		let response = self
			.responses
			.lock()
			.await
			.pop_front()
			.ok_or_else(|| eyre!("No stored fragments left after block {from:?}"))?;
		debug!(from = ?from, fragments = response.fragments.len(), "Serving stored fragments");
		Ok(response)
	}
}

pub struct FileRuntimeSource {
	path: Option<String>,
}

impl FileRuntimeSource {
	pub fn new(path: Option<String>) -> Self {
		FileRuntimeSource { path }
	}
}

#[async_trait]
impl RuntimeSource for FileRuntimeSource {
	async fn fetch_runtime_code(&self, block_hash: H256, _state_root: H256) -> Result<Vec<u8>> {
		let path = self
			.path
			.as_ref()
			.ok_or_else(|| eyre!("Runtime code path is not configured"))?;
		debug!(block_hash = ?block_hash, path = %path, "Reading runtime code");
		fs::read(path).wrap_err(format!("Failed to read runtime code from {path}"))
	}
}
