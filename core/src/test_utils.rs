use crate::{
	grandpa::GrandpaConsensusMessage,
	types::{
		Authority, AuthoritySet, BlockHeader, BlockNumber, Digest, DigestItem, Justification,
		RoundNumber, SetId, SignedVote, SignerMessage, SubRound, Vote, WarpSyncFragment,
		GRANDPA_ENGINE_ID, H256,
	},
};
use codec::Encode;
use sp_core::{ed25519, Pair};

pub fn pair(seed: u8) -> ed25519::Pair {
	ed25519::Pair::from_seed(&[seed; 32])
}

pub fn authorities(seeds: &[u8]) -> Vec<Authority> {
	seeds
		.iter()
		.map(|&seed| Authority::new(pair(seed).public(), 1))
		.collect()
}

pub fn authority_set(set_id: SetId, seeds: &[u8]) -> AuthoritySet {
	AuthoritySet::new(set_id, authorities(seeds))
}

pub fn header(number: BlockNumber, parent_hash: H256, logs: Vec<DigestItem>) -> BlockHeader {
	BlockHeader {
		parent_hash,
		number,
		state_root: H256::repeat_byte(number as u8),
		extrinsics_root: H256::zero(),
		digest: Digest { logs },
	}
}

pub fn grandpa_digest(message: GrandpaConsensusMessage) -> DigestItem {
	DigestItem::Consensus(GRANDPA_ENGINE_ID, message.encode())
}

pub fn sign_precommit(
	pair: &ed25519::Pair,
	vote: Vote,
	round: RoundNumber,
	set_id: SetId,
) -> SignedVote {
	let payload = SignerMessage::new(SubRound::Precommit, vote).signing_payload(round, set_id);
	SignedVote {
		vote,
		signature: pair.sign(&payload),
		id: pair.public(),
	}
}

pub fn justification(
	header: &BlockHeader,
	round: RoundNumber,
	set_id: SetId,
	signers: &[u8],
) -> Justification {
	let target = Vote::from(header);
	Justification {
		target_hash: target.target_hash,
		target_number: target.target_number,
		round,
		set_id,
		precommits: signers
			.iter()
			.map(|&seed| sign_precommit(&pair(seed), target, round, set_id))
			.collect(),
		votes_ancestries: vec![],
	}
}

pub fn fragment(header: BlockHeader, set_id: SetId, signers: &[u8]) -> WarpSyncFragment {
	let justification = justification(&header, 1, set_id, signers);
	WarpSyncFragment {
		header,
		justification,
	}
}
