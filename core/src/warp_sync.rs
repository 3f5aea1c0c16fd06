//! Warp sync state machine.
//!
//! Starting from a trusted checkpoint, fragments are requested from peers and
//! verified one at a time. Every verified fragment moves the finalized head
//! forward and enacts authority set changes announced in its header, so that
//! following justifications are checked against the right set. Once all
//! fragments are verified, runtime code of the finalized head is loaded and
//! steady state finality import takes over through [`WarpSyncContext::import_commit`].

use crate::{
	data::{Database, IsWarpSyncFinishedKey, RuntimeCodeKey},
	finality::JustificationVerifier,
	grandpa::{grandpa_consensus_messages, DecodeError, GrandpaSetState, SharedGrandpaSetState},
	network::{FragmentSource, NeighbourMessage, PeerNotifier, RuntimeSource},
	sync_state::{NonMonotonicFinalization, SharedSyncState, SyncState},
	types::{
		duration_seconds_format, BlockHeader, BlockNumber, Checkpoint, Justification,
		WarpSyncFragment, H256,
	},
};
use color_eyre::{eyre::WrapErr, Result};
use serde::{Deserialize, Serialize};
use std::{
	collections::VecDeque,
	sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
	time::Duration,
};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

mod action;
pub use action::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpSyncConfig {
	/// Fragment request timeout (in seconds) (default: 10).
	#[serde(with = "duration_seconds_format")]
	pub fragment_request_timeout: Duration,
	/// Number of superseded authority sets kept for verifying older justifications (default: 8).
	pub retained_authority_sets: usize,
	/// Capacity of the neighbour notification channel (default: 32).
	pub notification_channel_capacity: usize,
}

impl Default for WarpSyncConfig {
	fn default() -> Self {
		WarpSyncConfig {
			fragment_request_timeout: Duration::from_secs(10),
			retained_authority_sets: 8,
			notification_channel_capacity: 32,
		}
	}
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("Fragment request timed out after {0:?}")]
	FragmentFetchTimeout(Duration),
	#[error("Fragment request failed: {0}")]
	FragmentRequest(color_eyre::Report),
	#[error("Peer returned no fragments before warp sync finished")]
	EmptyFragmentResponse,
	#[error("No fragment left to verify")]
	MissingFragment,
	#[error("Justification of block #{0} is not valid")]
	JustificationNotVerified(BlockNumber),
	#[error(
		"Justification targets block #{justification_number} ({justification_hash:?}) instead of #{header_number} ({header_hash:?})"
	)]
	TargetMismatch {
		header_number: BlockNumber,
		header_hash: H256,
		justification_number: BlockNumber,
		justification_hash: H256,
	},
	#[error(transparent)]
	NonMonotonic(#[from] NonMonotonicFinalization),
	#[error(transparent)]
	Decode(#[from] DecodeError),
	#[error("Runtime download failed: {0}")]
	RuntimeDownload(color_eyre::Report),
	#[error("Invariant violation: {0}")]
	InvariantViolation(&'static str),
}

impl Error {
	pub fn is_invariant_violation(&self) -> bool {
		matches!(self, Error::InvariantViolation(_))
	}
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
	lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
	lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// FIFO of fetched fragments, shared with the fetching side.
#[derive(Clone, Debug, Default)]
pub struct FragmentQueue {
	fragments: Arc<Mutex<VecDeque<WarpSyncFragment>>>,
}

impl FragmentQueue {
	fn lock(&self) -> MutexGuard<'_, VecDeque<WarpSyncFragment>> {
		self.fragments.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn extend(&self, fragments: impl IntoIterator<Item = WarpSyncFragment>) {
		self.lock().extend(fragments);
	}

	pub fn pop(&self) -> Option<WarpSyncFragment> {
		self.lock().pop_front()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}
}

/// State shared by warp sync actions and the steady state finality import.
pub struct WarpSyncContext<D, F, R> {
	config: WarpSyncConfig,
	db: D,
	fragment_source: F,
	runtime_source: R,
	notifier: Option<PeerNotifier>,
	grandpa: SharedGrandpaSetState,
	sync_state: SharedSyncState,
	queue: FragmentQueue,
	fragments_finished: bool,
	warp_sync_finished: bool,
	runtime_code: Option<Vec<u8>>,
}

impl<D, F, R> WarpSyncContext<D, F, R> {
	pub fn config(&self) -> &WarpSyncConfig {
		&self.config
	}

	pub fn db(&self) -> &D {
		&self.db
	}

	pub fn grandpa(&self) -> SharedGrandpaSetState {
		self.grandpa.clone()
	}

	pub fn sync_state(&self) -> SyncState {
		read(&self.sync_state).clone()
	}

	pub fn queue(&self) -> &FragmentQueue {
		&self.queue
	}

	pub fn fragments_finished(&self) -> bool {
		self.fragments_finished
	}

	pub fn is_warp_sync_finished(&self) -> bool {
		self.warp_sync_finished
	}

	pub fn runtime_code(&self) -> Option<&[u8]> {
		self.runtime_code.as_deref()
	}

	pub fn last_finalized_block_number(&self) -> BlockNumber {
		read(&self.sync_state).last_finalized_block_number()
	}

	pub fn last_finalized_block_hash(&self) -> H256 {
		read(&self.sync_state).last_finalized_block_hash()
	}

	/// Sends our current view to peers, if a notifier is attached.
	pub fn notify_neighbours(&self) -> bool {
		let Some(notifier) = &self.notifier else {
			return false;
		};
		let message = {
			let grandpa = read(&self.grandpa);
			NeighbourMessage::new(
				grandpa.round(),
				grandpa.set_id(),
				self.last_finalized_block_number(),
			)
		};
		notifier.notify(message)
	}
}

impl<D, F, R> WarpSyncContext<D, F, R>
where
	D: Database,
	F: FragmentSource,
	R: RuntimeSource,
{
	/// Creates context from persisted state, falling back to the checkpoint.
	pub fn new(
		config: WarpSyncConfig,
		db: D,
		fragment_source: F,
		runtime_source: R,
		checkpoint: &Checkpoint,
	) -> Self {
		let grandpa = match GrandpaSetState::load(&db, config.retained_authority_sets) {
			Some(grandpa) => {
				info!(set_id = grandpa.set_id(), "Loaded persisted authority set");
				grandpa
			},
			None => {
				let grandpa =
					GrandpaSetState::from_checkpoint(checkpoint, config.retained_authority_sets);
				grandpa.persist_new_set_state(&db);
				grandpa
			},
		};

		let sync_state = match SyncState::load(&db) {
			Some(sync_state) => {
				info!(
					block_number = sync_state.last_finalized_block_number(),
					"Loaded persisted finalized block"
				);
				sync_state
			},
			None => {
				let sync_state = SyncState::from_checkpoint(checkpoint);
				sync_state.persist(&db);
				sync_state
			},
		};

		let warp_sync_finished = db.get(IsWarpSyncFinishedKey).unwrap_or(false);

		WarpSyncContext {
			config,
			db,
			fragment_source,
			runtime_source,
			notifier: None,
			grandpa: Arc::new(RwLock::new(grandpa)),
			sync_state: Arc::new(RwLock::new(sync_state)),
			queue: FragmentQueue::default(),
			fragments_finished: false,
			warp_sync_finished,
			runtime_code: None,
		}
	}

	pub fn with_notifier(mut self, notifier: PeerNotifier) -> Self {
		self.notifier = Some(notifier);
		self
	}

	pub async fn request_fragments(&mut self, from: H256) -> Result<(), Error> {
		let timeout = self.config.fragment_request_timeout;
		let response = tokio::time::timeout(timeout, self.fragment_source.request_fragments(from))
			.await
			.map_err(|_| Error::FragmentFetchTimeout(timeout))?
			.map_err(Error::FragmentRequest)?;

		info!(
			from = ?from,
			fragments = response.fragments.len(),
			is_finished = response.is_finished,
			"Received warp sync fragments"
		);
		self.fragments_finished = response.is_finished;
		if response.fragments.is_empty() && !response.is_finished {
			return Err(Error::EmptyFragmentResponse);
		}
		self.queue.extend(response.fragments);
		Ok(())
	}

	pub fn verify_next_fragment(&mut self) -> Result<(), Error> {
		let Some(fragment) = self.queue.pop() else {
			if self.fragments_finished {
				return Err(Error::InvariantViolation(
					"justification verification entered with all fragments verified",
				));
			}
			return Err(Error::MissingFragment);
		};

		let span = info_span!("verify_fragment", block_number = fragment.header.number);
		let _enter = span.enter();
		let set_changed = self.finalize(fragment.header, fragment.justification)?;
		if set_changed && self.warp_sync_finished {
			self.notify_neighbours();
		}
		Ok(())
	}

	pub async fn download_runtime(&mut self) -> Result<(), Error> {
		let code = match self.db.get(RuntimeCodeKey) {
			Some(code) => {
				info!("Using saved runtime code");
				code
			},
			None => {
				let (block_hash, state_root) = {
					let sync_state = read(&self.sync_state);
					(sync_state.last_finalized_block_hash(), sync_state.state_root())
				};
				info!(block_hash = ?block_hash, "Downloading runtime code");
				let code = self
					.runtime_source
					.fetch_runtime_code(block_hash, state_root)
					.await
					.map_err(Error::RuntimeDownload)?;
				self.db.put(RuntimeCodeKey, code.clone());
				code
			},
		};

		info!(size = code.len(), "Runtime code loaded");
		self.runtime_code = Some(code);
		self.warp_sync_finished = true;
		self.db.put(IsWarpSyncFinishedKey, true);
		self.notify_neighbours();
		Ok(())
	}

	/// Imports commit received after warp sync. Returns whether the block got finalized.
	pub fn import_commit(
		&mut self,
		header: BlockHeader,
		justification: Justification,
	) -> Result<bool, Error> {
		if header.number <= self.last_finalized_block_number() {
			debug!(block_number = header.number, "Ignoring commit of finalized block");
			return Ok(false);
		}

		let set_changed = self.finalize(header, justification)?;
		if set_changed && self.warp_sync_finished {
			self.notify_neighbours();
		}
		Ok(true)
	}

	/// Verifies justification of the header and finalizes it, enacting due
	/// authority set changes. Nothing is mutated unless every check passes.
	fn finalize(&mut self, header: BlockHeader, justification: Justification) -> Result<bool, Error> {
		read(&self.sync_state).ensure_extends(header.number)?;

		let header_hash = header.hash();
		if justification.target_hash != header_hash || justification.target_number != header.number
		{
			return Err(Error::TargetMismatch {
				header_number: header.number,
				header_hash,
				justification_number: justification.target_number,
				justification_hash: justification.target_hash,
			});
		}

		let mut grandpa = write(&self.grandpa);
		if !JustificationVerifier::new(&grandpa).verify(&justification) {
			return Err(Error::JustificationNotVerified(header.number));
		}
		let messages = grandpa_consensus_messages(&header)?;

		{
			let mut sync_state = write(&self.sync_state);
			sync_state.finalize_header(&header)?;
			sync_state.persist(&self.db);
		}

		if justification.set_id == grandpa.set_id() {
			grandpa.note_round(justification.round);
			grandpa.persist_finalized_round(&self.db, &justification.precommits);
		}

		for message in messages {
			debug!(%message, block_number = header.number, "GRANDPA consensus message");
			grandpa.handle_grandpa_consensus_message(message, header.number);
		}

		let mut set_changed = false;
		while grandpa.handle_authority_set_change(header.number) {
			set_changed = true;
		}
		if set_changed {
			grandpa.persist_new_set_state(&self.db);
		}
		Ok(set_changed)
	}
}

/// Drives warp sync actions until warp sync finishes.
pub struct WarpSyncMachine<D, F, R> {
	action: WarpSyncAction,
	ctx: WarpSyncContext<D, F, R>,
}

impl<D, F, R> WarpSyncMachine<D, F, R>
where
	D: Database,
	F: FragmentSource,
	R: RuntimeSource,
{
	pub fn new(ctx: WarpSyncContext<D, F, R>) -> Self {
		let from = ctx.last_finalized_block_hash();
		if ctx.is_warp_sync_finished() {
			warn!("Warp sync already finished before, syncing again from the last finalized block");
		}
		WarpSyncMachine {
			action: WarpSyncAction::RequestFragments { from },
			ctx,
		}
	}

	pub fn action(&self) -> &WarpSyncAction {
		&self.action
	}

	pub fn context(&self) -> &WarpSyncContext<D, F, R> {
		&self.ctx
	}

	pub fn is_syncing(&self) -> bool {
		!self.action.is_finished()
	}

	/// Handles current action and moves to the next one.
	pub async fn step(&mut self) -> Result<(), Error> {
		debug!(action = ?self.action, "Handling warp sync action");
		let handled = self.action.handle(&mut self.ctx).await;
		self.action = self.action.clone().next(handled, &self.ctx)?;
		Ok(())
	}

	/// Runs the machine to completion, returning how it finished along with the context
	/// for steady state import.
	pub async fn run(mut self) -> Result<(FinishReason, WarpSyncContext<D, F, R>)> {
		loop {
			if let WarpSyncAction::Finished(reason) = &self.action {
				return Ok((reason.clone(), self.ctx));
			}
			self.step().await.wrap_err("Warp sync state machine failed")?;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		data::{LastFinalizedBlockNumberKey, MemoryDB, SetIdKey},
		grandpa::GrandpaConsensusMessage,
		network::{MockFragmentSource, MockRuntimeSource},
		test_utils::{authorities, fragment, grandpa_digest, header, justification},
		types::{Checkpoint, WarpSyncResponse},
	};
	use async_trait::async_trait;
	use color_eyre::eyre::eyre;

	fn genesis() -> BlockHeader {
		header(0, H256::zero(), vec![])
	}

	fn checkpoint() -> Checkpoint {
		let genesis = genesis();
		Checkpoint {
			block_hash: genesis.hash(),
			block_number: 0,
			state_root: genesis.state_root,
			set_id: 0,
			authorities: authorities(&[1]),
		}
	}

	fn scheduled_change(seeds: &[u8], delay: BlockNumber) -> GrandpaConsensusMessage {
		GrandpaConsensusMessage::ScheduledChange {
			authorities: authorities(seeds),
			delay,
		}
	}

	fn fragment_source(responses: Vec<WarpSyncResponse>) -> MockFragmentSource {
		let mut source = MockFragmentSource::new();
		let mut responses = VecDeque::from(responses);
		source.expect_request_fragments().returning(move |_| {
			let response = responses.pop_front().unwrap_or_default();
			Box::pin(async move { Ok(response) })
		});
		source
	}

	fn runtime_source() -> MockRuntimeSource {
		let mut source = MockRuntimeSource::new();
		source
			.expect_fetch_runtime_code()
			.returning(|_, _| Box::pin(async move { Ok(vec![0x00, 0x61, 0x73, 0x6d]) }));
		source
	}

	fn context<F: FragmentSource>(
		db: MemoryDB,
		fragments: F,
	) -> WarpSyncContext<MemoryDB, F, MockRuntimeSource> {
		WarpSyncContext::new(
			WarpSyncConfig::default(),
			db,
			fragments,
			runtime_source(),
			&checkpoint(),
		)
	}

	fn finished(fragments: Vec<WarpSyncFragment>) -> WarpSyncResponse {
		WarpSyncResponse {
			fragments,
			is_finished: true,
		}
	}

	#[tokio::test]
	async fn single_fragment_warp_sync() {
		let block = header(10, genesis().hash(), vec![]);
		let source = fragment_source(vec![finished(vec![fragment(block.clone(), 0, &[1])])]);
		let (notifier, mut notifications) = PeerNotifier::channel(4);
		let ctx = context(MemoryDB::default(), source).with_notifier(notifier);

		let (reason, ctx) = WarpSyncMachine::new(ctx).run().await.unwrap();

		assert_eq!(reason, FinishReason::Completed { block_number: 10 });
		let sync_state = ctx.sync_state();
		assert_eq!(sync_state.last_finalized_block_number(), 10);
		assert_eq!(sync_state.last_finalized_block_hash(), block.hash());
		assert_eq!(sync_state.state_root(), block.state_root);
		assert!(ctx.is_warp_sync_finished());
		assert_eq!(ctx.runtime_code(), Some(&[0x00, 0x61, 0x73, 0x6d][..]));
		assert_eq!(ctx.db().get(LastFinalizedBlockNumberKey), Some(10));
		assert_eq!(ctx.grandpa().read().unwrap().set_id(), 0);
		assert_eq!(notifications.try_recv().unwrap(), NeighbourMessage::new(1, 0, 10));
	}

	#[tokio::test]
	async fn invalid_signature_aborts_without_side_effects() {
		let change = grandpa_digest(scheduled_change(&[2], 0));
		let block = header(10, genesis().hash(), vec![change]);
		// signed by an authority outside of the set
		let source = fragment_source(vec![finished(vec![fragment(block, 0, &[2])])]);
		let ctx = context(MemoryDB::default(), source);

		let (reason, ctx) = WarpSyncMachine::new(ctx).run().await.unwrap();

		let FinishReason::Aborted { block_number, .. } = &reason else {
			panic!("Expected abort, got {reason:?}");
		};
		assert_eq!(*block_number, 0);
		assert!(reason
			.to_string()
			.starts_with("Warp sync failed to progress past block 0"));
		assert_eq!(ctx.sync_state().last_finalized_block_hash(), genesis().hash());
		let grandpa = ctx.grandpa();
		let grandpa = grandpa.read().unwrap();
		assert_eq!(grandpa.set_id(), 0);
		assert_eq!(grandpa.pending_changes().count(), 0);
		assert!(!ctx.is_warp_sync_finished());
	}

	#[tokio::test]
	async fn authority_set_changes_between_fragments() {
		let first = header(5, genesis().hash(), vec![grandpa_digest(scheduled_change(&[2, 3], 0))]);
		let second = header(9, first.hash(), vec![]);
		let first_hash = first.hash();

		let mut source = MockFragmentSource::new();
		let first_fragment = fragment(first, 0, &[1]);
		source
			.expect_request_fragments()
			.withf(|from| *from == genesis().hash())
			.times(1)
			.returning(move |_| {
				let response = WarpSyncResponse {
					fragments: vec![first_fragment.clone()],
					is_finished: false,
				};
				Box::pin(async move { Ok(response) })
			});
		let second_fragment = fragment(second, 1, &[2, 3]);
		source
			.expect_request_fragments()
			.withf(move |from| *from == first_hash)
			.times(1)
			.returning(move |_| {
				let response = finished(vec![second_fragment.clone()]);
				Box::pin(async move { Ok(response) })
			});

		let db = MemoryDB::default();
		let (reason, ctx) = WarpSyncMachine::new(context(db.clone(), source))
			.run()
			.await
			.unwrap();

		assert_eq!(reason, FinishReason::Completed { block_number: 9 });
		let grandpa = ctx.grandpa();
		let grandpa = grandpa.read().unwrap();
		assert_eq!(grandpa.set_id(), 1);
		assert_eq!(grandpa.authorities(), authorities(&[2, 3]));
		assert_eq!(grandpa.round(), 1);
		assert_eq!(db.get(SetIdKey), Some(1));
	}

	#[tokio::test]
	async fn change_is_enacted_at_application_block() {
		let announce = header(100, genesis().hash(), vec![grandpa_digest(scheduled_change(&[2], 5))]);
		let before = header(104, announce.hash(), vec![]);
		let enacting = header(105, before.hash(), vec![]);
		let mut ctx = context(MemoryDB::default(), MockFragmentSource::new());

		for block in [&announce, &before] {
			ctx.queue().extend([fragment(block.clone(), 0, &[1])]);
			ctx.verify_next_fragment().unwrap();
			assert_eq!(ctx.grandpa().read().unwrap().set_id(), 0);
		}

		ctx.queue().extend([fragment(enacting, 0, &[1])]);
		ctx.verify_next_fragment().unwrap();
		let grandpa = ctx.grandpa();
		let grandpa = grandpa.read().unwrap();
		assert_eq!(grandpa.set_id(), 1);
		assert_eq!(grandpa.authorities(), authorities(&[2]));
		assert_eq!(grandpa.round(), 0);
	}

	#[tokio::test]
	async fn set_change_during_resync_notifies_peers() {
		let db = MemoryDB::default();
		db.put(IsWarpSyncFinishedKey, true);
		let (notifier, mut notifications) = PeerNotifier::channel(4);
		let mut ctx = context(db, MockFragmentSource::new()).with_notifier(notifier);
		assert!(ctx.is_warp_sync_finished());

		let block = header(5, genesis().hash(), vec![grandpa_digest(scheduled_change(&[2], 0))]);
		ctx.queue().extend([fragment(block, 0, &[1])]);
		ctx.verify_next_fragment().unwrap();

		assert_eq!(ctx.grandpa().read().unwrap().set_id(), 1);
		assert_eq!(notifications.try_recv().unwrap(), NeighbourMessage::new(0, 1, 5));
	}

	#[tokio::test]
	async fn set_change_during_warp_sync_is_not_announced() {
		let (notifier, mut notifications) = PeerNotifier::channel(4);
		let mut ctx = context(MemoryDB::default(), MockFragmentSource::new()).with_notifier(notifier);

		let block = header(5, genesis().hash(), vec![grandpa_digest(scheduled_change(&[2], 0))]);
		ctx.queue().extend([fragment(block, 0, &[1])]);
		ctx.verify_next_fragment().unwrap();

		assert_eq!(ctx.grandpa().read().unwrap().set_id(), 1);
		assert!(notifications.try_recv().is_err());
	}

	#[tokio::test]
	async fn out_of_order_fragment_aborts() {
		let newer = header(10, genesis().hash(), vec![]);
		let older = header(8, genesis().hash(), vec![]);
		let source = fragment_source(vec![finished(vec![
			fragment(newer, 0, &[1]),
			fragment(older, 0, &[1]),
		])]);

		let (reason, ctx) = WarpSyncMachine::new(context(MemoryDB::default(), source))
			.run()
			.await
			.unwrap();

		assert!(matches!(reason, FinishReason::Aborted { block_number: 10, .. }));
		assert_eq!(ctx.last_finalized_block_number(), 10);
	}

	#[tokio::test]
	async fn mismatched_justification_aborts() {
		let block = header(10, genesis().hash(), vec![]);
		let other = header(10, H256::repeat_byte(3), vec![]);
		let fragment = WarpSyncFragment {
			header: block,
			justification: justification(&other, 1, 0, &[1]),
		};
		let source = fragment_source(vec![finished(vec![fragment])]);

		let (reason, _) = WarpSyncMachine::new(context(MemoryDB::default(), source))
			.run()
			.await
			.unwrap();

		assert!(matches!(reason, FinishReason::Aborted { block_number: 0, .. }));
	}

	#[tokio::test]
	async fn malformed_digest_aborts() {
		let digest = crate::types::DigestItem::Consensus(crate::types::GRANDPA_ENGINE_ID, vec![9]);
		let block = header(10, genesis().hash(), vec![digest]);
		let source = fragment_source(vec![finished(vec![fragment(block, 0, &[1])])]);

		let (reason, ctx) = WarpSyncMachine::new(context(MemoryDB::default(), source))
			.run()
			.await
			.unwrap();

		assert!(matches!(reason, FinishReason::Aborted { block_number: 0, .. }));
		assert_eq!(ctx.last_finalized_block_number(), 0);
	}

	#[tokio::test]
	async fn empty_responses() {
		let source = fragment_source(vec![WarpSyncResponse::default()]);
		let (reason, _) = WarpSyncMachine::new(context(MemoryDB::default(), source))
			.run()
			.await
			.unwrap();
		assert!(matches!(reason, FinishReason::Aborted { block_number: 0, .. }));

		let source = fragment_source(vec![finished(vec![])]);
		let mut machine = WarpSyncMachine::new(context(MemoryDB::default(), source));
		machine.step().await.unwrap();
		assert_eq!(machine.action(), &WarpSyncAction::RuntimeDownload);
		machine.step().await.unwrap();
		assert_eq!(
			machine.action(),
			&WarpSyncAction::Finished(FinishReason::Completed { block_number: 0 })
		);
		assert!(!machine.is_syncing());
	}

	#[tokio::test]
	async fn failed_request_aborts() {
		let mut source = MockFragmentSource::new();
		source
			.expect_request_fragments()
			.returning(|_| Box::pin(async move { Err(eyre!("Peer disconnected")) }));

		let (reason, _) = WarpSyncMachine::new(context(MemoryDB::default(), source))
			.run()
			.await
			.unwrap();

		let FinishReason::Aborted { reason, .. } = reason else {
			panic!("Expected abort");
		};
		assert!(reason.contains("Peer disconnected"));
	}

	struct PendingSource;

	#[async_trait]
	impl FragmentSource for PendingSource {
		async fn request_fragments(&self, _from: H256) -> Result<WarpSyncResponse> {
			futures::future::pending().await
		}
	}

	#[tokio::test]
	async fn fragment_request_times_out() {
		let config = WarpSyncConfig {
			fragment_request_timeout: Duration::from_millis(10),
			..Default::default()
		};
		let ctx = WarpSyncContext::new(
			config,
			MemoryDB::default(),
			PendingSource,
			runtime_source(),
			&checkpoint(),
		);

		let (reason, _) = WarpSyncMachine::new(ctx).run().await.unwrap();

		let FinishReason::Aborted { reason, .. } = reason else {
			panic!("Expected abort");
		};
		assert!(reason.contains("timed out"));
	}

	#[tokio::test]
	async fn verification_without_fragments_is_invariant_violation() {
		let source = fragment_source(vec![finished(vec![])]);
		let mut ctx = context(MemoryDB::default(), source);
		ctx.request_fragments(genesis().hash()).await.unwrap();

		let action = WarpSyncAction::VerifyJustification;
		let handled = action.handle(&mut ctx).await;
		let error = action.next(handled, &ctx).unwrap_err();
		assert!(error.is_invariant_violation());
	}

	#[tokio::test]
	async fn missing_fragment_aborts() {
		let mut ctx = context(MemoryDB::default(), MockFragmentSource::new());

		let action = WarpSyncAction::VerifyJustification;
		let handled = action.handle(&mut ctx).await;
		assert!(matches!(handled, Err(Error::MissingFragment)));
		assert!(action.next(handled, &ctx).unwrap().is_finished());
	}

	#[tokio::test]
	async fn saved_runtime_code_is_preferred() {
		let db = MemoryDB::default();
		db.put(RuntimeCodeKey, vec![7]);
		let mut runtime = MockRuntimeSource::new();
		runtime.expect_fetch_runtime_code().never();
		let mut ctx = WarpSyncContext::new(
			WarpSyncConfig::default(),
			db,
			MockFragmentSource::new(),
			runtime,
			&checkpoint(),
		);

		ctx.download_runtime().await.unwrap();
		assert_eq!(ctx.runtime_code(), Some(&[7u8][..]));
		assert!(ctx.is_warp_sync_finished());
	}

	#[tokio::test]
	async fn runtime_download_failure_aborts() {
		let mut runtime = MockRuntimeSource::new();
		runtime
			.expect_fetch_runtime_code()
			.returning(|_, _| Box::pin(async move { Err(eyre!("No code")) }));
		let source = fragment_source(vec![finished(vec![])]);
		let ctx = WarpSyncContext::new(
			WarpSyncConfig::default(),
			MemoryDB::default(),
			source,
			runtime,
			&checkpoint(),
		);

		let (reason, ctx) = WarpSyncMachine::new(ctx).run().await.unwrap();
		assert!(matches!(reason, FinishReason::Aborted { .. }));
		assert!(!ctx.is_warp_sync_finished());
	}

	#[tokio::test]
	async fn persisted_state_wins_over_checkpoint() {
		let db = MemoryDB::default();
		let block = header(10, genesis().hash(), vec![]);
		let source = fragment_source(vec![finished(vec![fragment(block.clone(), 0, &[1])])]);
		WarpSyncMachine::new(context(db.clone(), source))
			.run()
			.await
			.unwrap();

		let ctx = context(db, MockFragmentSource::new());
		assert_eq!(ctx.last_finalized_block_number(), 10);
		assert_eq!(ctx.last_finalized_block_hash(), block.hash());
		assert!(ctx.is_warp_sync_finished());
		assert_eq!(
			WarpSyncMachine::new(ctx).action(),
			&WarpSyncAction::RequestFragments { from: block.hash() }
		);
	}

	#[tokio::test]
	async fn steady_state_commit_import() {
		let source = fragment_source(vec![finished(vec![])]);
		let (notifier, mut notifications) = PeerNotifier::channel(4);
		let ctx = context(MemoryDB::default(), source).with_notifier(notifier);
		let (_, mut ctx) = WarpSyncMachine::new(ctx).run().await.unwrap();
		assert_eq!(notifications.try_recv().unwrap(), NeighbourMessage::new(0, 0, 0));

		let block = header(3, genesis().hash(), vec![grandpa_digest(scheduled_change(&[4], 0))]);
		let commit = justification(&block, 2, 0, &[1]);
		assert!(ctx.import_commit(block.clone(), commit.clone()).unwrap());
		assert_eq!(notifications.try_recv().unwrap(), NeighbourMessage::new(0, 1, 3));

		// already finalized
		assert!(!ctx.import_commit(block, commit).unwrap());

		// outgoing authority is not part of the new set
		let next = header(4, H256::zero(), vec![]);
		let outgoing = justification(&next, 1, 1, &[1]);
		assert!(matches!(
			ctx.import_commit(next, outgoing),
			Err(Error::JustificationNotVerified(4))
		));
	}
}
