use crate::{
	data::{Database, LastFinalizedBlockHashKey, LastFinalizedBlockNumberKey, StateRootKey},
	types::{BlockHeader, BlockNumber, Checkpoint, H256},
};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::info;

pub type SharedSyncState = Arc<RwLock<SyncState>>;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Block #{block_number} does not extend last finalized block #{last_finalized}")]
pub struct NonMonotonicFinalization {
	pub block_number: BlockNumber,
	pub last_finalized: BlockNumber,
}

/// Finalized head reached so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncState {
	last_finalized_block_hash: H256,
	last_finalized_block_number: BlockNumber,
	state_root: H256,
}

impl SyncState {
	pub fn new(
		last_finalized_block_hash: H256,
		last_finalized_block_number: BlockNumber,
		state_root: H256,
	) -> Self {
		SyncState {
			last_finalized_block_hash,
			last_finalized_block_number,
			state_root,
		}
	}

	pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
		SyncState::new(
			checkpoint.block_hash,
			checkpoint.block_number,
			checkpoint.state_root,
		)
	}

	pub fn last_finalized_block_hash(&self) -> H256 {
		self.last_finalized_block_hash
	}

	pub fn last_finalized_block_number(&self) -> BlockNumber {
		self.last_finalized_block_number
	}

	pub fn state_root(&self) -> H256 {
		self.state_root
	}

	/// Checks whether the header would move finalized head forward.
	pub fn ensure_extends(&self, block_number: BlockNumber) -> Result<(), NonMonotonicFinalization> {
		if block_number <= self.last_finalized_block_number {
			return Err(NonMonotonicFinalization {
				block_number,
				last_finalized: self.last_finalized_block_number,
			});
		}
		Ok(())
	}

	/// Moves finalized head to the given header, which must be past the current head.
	pub fn finalize_header(&mut self, header: &BlockHeader) -> Result<(), NonMonotonicFinalization> {
		self.ensure_extends(header.number)?;
		self.last_finalized_block_hash = header.hash();
		self.last_finalized_block_number = header.number;
		self.state_root = header.state_root;
		info!(
			block_number = header.number,
			block_hash = ?self.last_finalized_block_hash,
			"Finalized block"
		);
		Ok(())
	}

	pub fn persist(&self, db: &impl Database) {
		db.put(LastFinalizedBlockHashKey, self.last_finalized_block_hash);
		db.put(LastFinalizedBlockNumberKey, self.last_finalized_block_number);
		db.put(StateRootKey, self.state_root);
	}

	pub fn load(db: &impl Database) -> Option<Self> {
		Some(SyncState::new(
			db.get(LastFinalizedBlockHashKey)?,
			db.get(LastFinalizedBlockNumberKey)?,
			db.get(StateRootKey)?,
		))
	}
}
