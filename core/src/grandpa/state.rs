use super::{AuthoritySetChange, DecodeError, GrandpaConsensusMessage};
use crate::{
	data::{AuthoritySetKey, Database, LatestRoundKey, PrecommitsKey, SetIdKey},
	types::{Authority, AuthoritySet, BlockNumber, Checkpoint, RoundNumber, SetId, SignedVote},
};
use std::{
	collections::{BTreeSet, VecDeque},
	sync::{Arc, RwLock},
};
use tracing::{debug, info, warn};

pub type SharedGrandpaSetState = Arc<RwLock<GrandpaSetState>>;

/// Current GRANDPA authority set along with changes waiting to be applied.
#[derive(Clone, Debug)]
pub struct GrandpaSetState {
	current: AuthoritySet,
	round: RoundNumber,
	pending_changes: BTreeSet<AuthoritySetChange>,
	next_sequence: u64,
	previous_sets: VecDeque<AuthoritySet>,
	retained_sets: usize,
	disabled_authority: Option<u64>,
}

impl GrandpaSetState {
	/// Creates state for the given set, remembering up to `retained_sets` superseded sets.
	pub fn new(authority_set: AuthoritySet, retained_sets: usize) -> Self {
		GrandpaSetState {
			current: authority_set,
			round: 0,
			pending_changes: BTreeSet::new(),
			next_sequence: 0,
			previous_sets: VecDeque::new(),
			retained_sets,
			disabled_authority: None,
		}
	}

	pub fn from_checkpoint(checkpoint: &Checkpoint, retained_sets: usize) -> Self {
		let authority_set = AuthoritySet::new(checkpoint.set_id, checkpoint.authorities.clone());
		GrandpaSetState::new(authority_set, retained_sets)
	}

	pub fn set_id(&self) -> SetId {
		self.current.set_id
	}

	pub fn authorities(&self) -> &[Authority] {
		&self.current.authorities
	}

	pub fn authority_set(&self) -> &AuthoritySet {
		&self.current
	}

	pub fn round(&self) -> RoundNumber {
		self.round
	}

	/// Index of the authority reported as disabled during the current set.
	pub fn disabled_authority(&self) -> Option<u64> {
		self.disabled_authority
	}

	/// Pending changes, highest priority first.
	pub fn pending_changes(&self) -> impl Iterator<Item = &AuthoritySetChange> {
		self.pending_changes.iter()
	}

	/// Looks up current or retained previous authority set by its ID.
	pub fn authority_set_for(&self, set_id: SetId) -> Option<&AuthoritySet> {
		if self.current.set_id == set_id {
			return Some(&self.current);
		}
		self.previous_sets
			.iter()
			.find(|authority_set| authority_set.set_id == set_id)
	}

	/// Records a finalized round of the current set. Rounds never go backwards.
	pub fn note_round(&mut self, round: RoundNumber) {
		if round > self.round {
			self.round = round;
		}
	}

	/// Enqueues a change (or records a notice) announced in the given block.
	/// Changes are never applied here, see [`Self::handle_authority_set_change`].
	pub fn handle_grandpa_consensus_message(
		&mut self,
		message: GrandpaConsensusMessage,
		block_number: BlockNumber,
	) {
		let change = match message {
			GrandpaConsensusMessage::ScheduledChange { authorities, delay } => {
				AuthoritySetChange::scheduled(authorities, delay, block_number)
			},
			GrandpaConsensusMessage::ForcedChange {
				additional_offset,
				authorities,
				delay,
			} => AuthoritySetChange::forced(authorities, delay, additional_offset, block_number),
			GrandpaConsensusMessage::OnDisabled { authority_index } => {
				info!(authority_index, block_number, "Authority disabled");
				self.disabled_authority = Some(authority_index);
				return;
			},
			GrandpaConsensusMessage::Pause { delay } => {
				warn!(delay, block_number, "GRANDPA pause is not supported, ignoring");
				return;
			},
			GrandpaConsensusMessage::Resume { delay } => {
				warn!(delay, block_number, "GRANDPA resume is not supported, ignoring");
				return;
			},
		};

		let change = change.with_sequence(self.next_sequence);
		self.next_sequence += 1;
		debug!(
			kind = %change.kind(),
			block_number,
			application_block = change.application_block(),
			authorities = change.authorities().len(),
			"Authority set change scheduled"
		);
		self.pending_changes.insert(change);
	}

	/// Decodes raw consensus digest payload and handles the message.
	pub fn handle_consensus_digest(
		&mut self,
		data: &[u8],
		block_number: BlockNumber,
	) -> Result<(), DecodeError> {
		let message = GrandpaConsensusMessage::decode_digest(data)?;
		self.handle_grandpa_consensus_message(message, block_number);
		Ok(())
	}

	/// Applies the highest priority change which became due at the given finalized block.
	/// At most one change is applied per call. Returns whether the set changed.
	pub fn handle_authority_set_change(&mut self, finalized_block: BlockNumber) -> bool {
		let Some(change) = self
			.pending_changes
			.iter()
			.find(|change| change.application_block() <= finalized_block)
			.cloned()
		else {
			return false;
		};
		self.pending_changes.remove(&change);

		let applied_at = change.application_block();
		let pending = self.pending_changes.len();
		self.pending_changes
			.retain(|change| change.application_block() > applied_at);
		let discarded = pending - self.pending_changes.len();
		if discarded > 0 {
			warn!(
				discarded,
				applied_at, "Discarding authority set changes superseded by applied change"
			);
		}

		let kind = change.kind();
		self.start_new_set(change.into_authorities());
		info!(
			%kind,
			set_id = self.current.set_id,
			authorities = self.current.authorities.len(),
			finalized_block,
			"Applied authority set change"
		);
		true
	}

	fn start_new_set(&mut self, authorities: Vec<Authority>) {
		let next = AuthoritySet::new(self.current.set_id + 1, authorities);
		let previous = std::mem::replace(&mut self.current, next);
		self.previous_sets.push_back(previous);
		while self.previous_sets.len() > self.retained_sets {
			self.previous_sets.pop_front();
		}
		self.round = 0;
		self.disabled_authority = None;
	}

	pub fn persist_new_set_state(&self, db: &impl Database) {
		db.put(AuthoritySetKey(self.set_id()), self.current.authorities.clone());
		db.put(SetIdKey, self.set_id());
		db.put(LatestRoundKey, self.round);
	}

	pub fn persist_finalized_round(&self, db: &impl Database, precommits: &[SignedVote]) {
		db.put(LatestRoundKey, self.round);
		db.put(PrecommitsKey(self.round, self.set_id()), precommits.to_vec());
	}

	/// Restores the current set from the database. Pending changes are not persisted.
	pub fn load(db: &impl Database, retained_sets: usize) -> Option<Self> {
		let set_id = db.get(SetIdKey)?;
		let authorities = db.get(AuthoritySetKey(set_id))?;
		let mut state = GrandpaSetState::new(AuthoritySet::new(set_id, authorities), retained_sets);
		state.round = db.get(LatestRoundKey).unwrap_or_default();
		for previous_id in set_id.saturating_sub(retained_sets as u64)..set_id {
			if let Some(authorities) = db.get(AuthoritySetKey(previous_id)) {
				state
					.previous_sets
					.push_back(AuthoritySet::new(previous_id, authorities));
			}
		}
		Some(state)
	}
}
