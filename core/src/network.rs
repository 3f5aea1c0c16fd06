//! Seams towards the peer-to-peer layer: warp sync fragment and runtime
//! code sources, and neighbour notifications sent to peers.

use crate::types::{BlockNumber, RoundNumber, SetId, WarpSyncResponse, H256};
use async_trait::async_trait;
use codec::{Decode, Encode};
use color_eyre::Result;
use mockall::automock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Neighbour message protocol version
pub const NEIGHBOUR_MESSAGE_VERSION: u8 = 1;

#[async_trait]
#[automock]
pub trait FragmentSource {
	/// Requests next batch of warp sync fragments, starting after the given finalized block.
	async fn request_fragments(&self, from: H256) -> Result<WarpSyncResponse>;
}

#[async_trait]
#[automock]
pub trait RuntimeSource {
	async fn fetch_runtime_code(&self, block_hash: H256, state_root: H256) -> Result<Vec<u8>>;
}

/// Announces our GRANDPA view to connected peers.
#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode)]
pub struct NeighbourMessage {
	pub version: u8,
	pub round: RoundNumber,
	pub set_id: SetId,
	pub last_finalized: BlockNumber,
}

impl NeighbourMessage {
	pub fn new(round: RoundNumber, set_id: SetId, last_finalized: BlockNumber) -> Self {
		NeighbourMessage {
			version: NEIGHBOUR_MESSAGE_VERSION,
			round,
			set_id,
			last_finalized,
		}
	}
}

/// Hands neighbour messages over to the networking task.
#[derive(Clone, Debug)]
pub struct PeerNotifier {
	sender: mpsc::Sender<NeighbourMessage>,
}

impl PeerNotifier {
	pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NeighbourMessage>) {
		let (sender, receiver) = mpsc::channel(capacity);
		(PeerNotifier { sender }, receiver)
	}

	/// Returns whether the message was queued. Dropped messages are not retried.
	pub fn notify(&self, message: NeighbourMessage) -> bool {
		match self.sender.try_send(message) {
			Ok(()) => {
				debug!("Neighbour message queued");
				true
			},
			Err(TrySendError::Full(message)) => {
				warn!(set_id = message.set_id, "Notification channel is full, neighbour message dropped");
				false
			},
			Err(TrySendError::Closed(message)) => {
				warn!(set_id = message.set_id, "Notification channel is closed, neighbour message dropped");
				false
			},
		}
	}
}
