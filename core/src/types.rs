//! Shared GRANDPA and warp sync structs, enums and (de)serialization helpers.

use crate::utils::blake2_256;
use codec::{Decode, Encode};
use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use sp_core::ed25519;
use std::time::Duration;

pub use sp_core::H256;

pub type BlockNumber = u32;
pub type SetId = u64;
pub type RoundNumber = u64;
pub type AuthorityWeight = u64;

/// GRANDPA consensus engine identifier used in header digests
pub const GRANDPA_ENGINE_ID: [u8; 4] = *b"FRNK";

/// Checks whether weight of valid signatures is strictly more than two thirds of total weight.
pub fn is_signed_by_supermajority(signed_weight: u128, total_weight: u128) -> bool {
	total_weight > 0 && signed_weight * 3 > total_weight * 2
}

#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct Authority {
	pub id: ed25519::Public,
	pub weight: AuthorityWeight,
}

impl Authority {
	pub fn new(id: ed25519::Public, weight: AuthorityWeight) -> Self {
		Authority { id, weight }
	}
}

/// Authorities entitled to vote during the lifetime of one set ID.
#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct AuthoritySet {
	pub set_id: SetId,
	pub authorities: Vec<Authority>,
}

impl AuthoritySet {
	pub fn new(set_id: SetId, authorities: Vec<Authority>) -> Self {
		AuthoritySet {
			set_id,
			authorities,
		}
	}

	pub fn total_weight(&self) -> u128 {
		self.authorities
			.iter()
			.map(|authority| authority.weight as u128)
			.sum()
	}

	/// Weight of the first authority entry with the given key.
	pub fn weight_of(&self, id: &ed25519::Public) -> Option<AuthorityWeight> {
		self.authorities
			.iter()
			.find(|authority| &authority.id == id)
			.map(|authority| authority.weight)
	}

	/// Minimum signed weight which constitutes a supermajority.
	pub fn threshold(&self) -> u128 {
		self.total_weight() * 2 / 3 + 1
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Decode, Encode, Serialize, Deserialize)]
pub struct Vote {
	pub target_hash: H256,
	pub target_number: BlockNumber,
}

impl Vote {
	pub fn new(target_hash: H256, target_number: BlockNumber) -> Self {
		Vote {
			target_hash,
			target_number,
		}
	}
}

impl From<&BlockHeader> for Vote {
	fn from(header: &BlockHeader) -> Self {
		Vote::new(header.hash(), header.number)
	}
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum SubRound {
	Prevote,
	Precommit,
	PrimaryPropose,
}

/// Message which authorities sign, variant index matches the sub-round stage.
#[derive(Debug, Encode)]
pub enum SignerMessage {
	#[codec(index = 0)]
	Prevote(Vote),
	#[codec(index = 1)]
	Precommit(Vote),
	#[codec(index = 2)]
	PrimaryPropose(Vote),
}

impl SignerMessage {
	pub fn new(sub_round: SubRound, vote: Vote) -> Self {
		match sub_round {
			SubRound::Prevote => SignerMessage::Prevote(vote),
			SubRound::Precommit => SignerMessage::Precommit(vote),
			SubRound::PrimaryPropose => SignerMessage::PrimaryPropose(vote),
		}
	}

	/// Bytes covered by the authority signature.
	pub fn signing_payload(&self, round: RoundNumber, set_id: SetId) -> Vec<u8> {
		Encode::encode(&(self, &round, &set_id))
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct SignedVote {
	pub vote: Vote,
	pub signature: ed25519::Signature,
	pub id: ed25519::Public,
}

/// Finality proof for a target block, also used as the commit message
/// gossiped at the end of a round.
#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct Justification {
	/// The target block's hash.
	pub target_hash: H256,
	/// The target block's number.
	pub target_number: BlockNumber,
	pub round: RoundNumber,
	pub set_id: SetId,
	/// Precommits for target block or any block after it that justify this commit.
	pub precommits: Vec<SignedVote>,
	/// Headers linking precommit targets back to the justification target.
	pub votes_ancestries: Vec<BlockHeader>,
}

impl Justification {
	pub fn target(&self) -> Vote {
		Vote::new(self.target_hash, self.target_number)
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct Digest {
	pub logs: Vec<DigestItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub enum DigestItem {
	#[codec(index = 6)]
	PreRuntime([u8; 4], Vec<u8>),
	#[codec(index = 4)]
	Consensus([u8; 4], Vec<u8>),
	#[codec(index = 5)]
	Seal([u8; 4], Vec<u8>),
	#[codec(index = 0)]
	Other(Vec<u8>),
	#[codec(index = 8)]
	RuntimeEnvironmentUpdated,
}

#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct BlockHeader {
	pub parent_hash: H256,
	#[codec(compact)]
	pub number: BlockNumber,
	pub state_root: H256,
	pub extrinsics_root: H256,
	pub digest: Digest,
}

impl BlockHeader {
	pub fn hash(&self) -> H256 {
		Encode::using_encoded(self, blake2_256).into()
	}

	/// Payloads of the consensus digests emitted by the given engine.
	pub fn consensus_logs(&self, engine_id: [u8; 4]) -> impl Iterator<Item = &[u8]> {
		self.digest.logs.iter().filter_map(move |item| match item {
			DigestItem::Consensus(id, data) if *id == engine_id => Some(data.as_slice()),
			_ => None,
		})
	}
}

/// One warp sync proof step: a header whose finality is proven by the justification.
#[derive(Clone, Debug, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct WarpSyncFragment {
	pub header: BlockHeader,
	pub justification: Justification,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Decode, Encode, Serialize, Deserialize)]
pub struct WarpSyncResponse {
	pub fragments: Vec<WarpSyncFragment>,
	pub is_finished: bool,
}

/// Trusted starting point of warp sync.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
	pub block_hash: H256,
	pub block_number: BlockNumber,
	pub state_root: H256,
	pub set_id: SetId,
	pub authorities: Vec<Authority>,
}

pub mod tracing_level_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::str::FromStr;
	use tracing::Level;

	pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&level.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		Level::from_str(&value).map_err(serde::de::Error::custom)
	}
}

pub mod duration_seconds_format {
	use super::Duration;
	use serde::{self, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(duration.as_secs())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = u64::deserialize(deserializer)?;
		Ok(Duration::from_secs(value))
	}
}
