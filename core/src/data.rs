use crate::types::{Authority, BlockNumber, RoundNumber, SetId, SignedVote, H256};
use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

mod keys;
use keys::*;

mod mem_db;
pub use mem_db::*;

/// Column family for GRANDPA voter state
pub const GRANDPA_STATE_CF: &str = "grandpa_state_cf";

/// Column family for block sync state
pub const SYNC_STATE_CF: &str = "sync_state_cf";

/// Type of the database key which we can get from the custom key.
pub trait RecordKey {
	type Type: Serialize + for<'a> Deserialize<'a> + Encode + Decode;

	fn space(&self) -> Option<&'static str>;

	/// Returns key space (if any) and key
	fn key(&self) -> String;
}

pub trait Database {
	/// Puts value for given key into database.
	/// Key is serialized into database key, value is serialized into type supported by database.
	fn put<T: RecordKey>(&self, key: T, value: T::Type);

	/// Gets value for given key.
	/// Key is serialized into database key, value is deserialized into the given type.
	fn get<T: RecordKey>(&self, key: T) -> Option<T::Type>;

	/// Deletes value from the database for the given key.
	fn delete<T: RecordKey>(&self, key: T);
}

/// Authorities of the set with the given ID.
pub struct AuthoritySetKey(pub SetId);

impl RecordKey for AuthoritySetKey {
	type Type = Vec<Authority>;

	fn space(&self) -> Option<&'static str> {
		Some(GRANDPA_STATE_CF)
	}

	fn key(&self) -> String {
		let AuthoritySetKey(set_id) = self;
		format!("{AUTHORITY_SET_KEY}{set_id}")
	}
}

pub struct SetIdKey;

impl RecordKey for SetIdKey {
	type Type = SetId;

	fn space(&self) -> Option<&'static str> {
		Some(GRANDPA_STATE_CF)
	}

	fn key(&self) -> String {
		SET_ID_KEY.into()
	}
}

pub struct LatestRoundKey;

impl RecordKey for LatestRoundKey {
	type Type = RoundNumber;

	fn space(&self) -> Option<&'static str> {
		Some(GRANDPA_STATE_CF)
	}

	fn key(&self) -> String {
		LATEST_ROUND_KEY.into()
	}
}

/// Precommits which finalized the given round of the given set.
pub struct PrecommitsKey(pub RoundNumber, pub SetId);

impl RecordKey for PrecommitsKey {
	type Type = Vec<SignedVote>;

	fn space(&self) -> Option<&'static str> {
		Some(GRANDPA_STATE_CF)
	}

	fn key(&self) -> String {
		let PrecommitsKey(round, set_id) = self;
		format!("{GRANDPA_PRECOMMITS_KEY}{round}{set_id}")
	}
}

pub struct LastFinalizedBlockNumberKey;

impl RecordKey for LastFinalizedBlockNumberKey {
	type Type = BlockNumber;

	fn space(&self) -> Option<&'static str> {
		Some(SYNC_STATE_CF)
	}

	fn key(&self) -> String {
		LAST_FINALIZED_BLOCK_NUMBER_KEY.into()
	}
}

pub struct LastFinalizedBlockHashKey;

impl RecordKey for LastFinalizedBlockHashKey {
	type Type = H256;

	fn space(&self) -> Option<&'static str> {
		Some(SYNC_STATE_CF)
	}

	fn key(&self) -> String {
		LAST_FINALIZED_BLOCK_HASH_KEY.into()
	}
}

pub struct StateRootKey;

impl RecordKey for StateRootKey {
	type Type = H256;

	fn space(&self) -> Option<&'static str> {
		Some(SYNC_STATE_CF)
	}

	fn key(&self) -> String {
		STATE_ROOT_KEY.into()
	}
}

/// Runtime code fetched at the end of warp sync
pub struct RuntimeCodeKey;

impl RecordKey for RuntimeCodeKey {
	type Type = Vec<u8>;

	fn space(&self) -> Option<&'static str> {
		Some(SYNC_STATE_CF)
	}

	fn key(&self) -> String {
		RUNTIME_CODE_KEY.into()
	}
}

pub struct IsWarpSyncFinishedKey;

impl RecordKey for IsWarpSyncFinishedKey {
	type Type = bool;

	fn space(&self) -> Option<&'static str> {
		Some(SYNC_STATE_CF)
	}

	fn key(&self) -> String {
		IS_WARP_SYNC_FINISHED_KEY.into()
	}
}
