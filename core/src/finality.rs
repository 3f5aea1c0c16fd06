use crate::{
	grandpa::GrandpaSetState,
	types::{
		is_signed_by_supermajority, AuthoritySet, Justification, SignedVote, SignerMessage,
		SubRound, H256,
	},
};
use codec::Decode;
use color_eyre::{eyre::eyre, Result};
use itertools::Itertools;
use sp_core::ed25519;
use std::collections::HashMap;
use tracing::{debug, warn};

fn verify_signature(precommit: &SignedVote, justification: &Justification) -> bool {
	let message = SignerMessage::new(SubRound::Precommit, precommit.vote)
		.signing_payload(justification.round, justification.set_id);
	<ed25519::Pair as sp_core::Pair>::verify(&precommit.signature, message, &precommit.id)
}

/// Verifies justifications against the authority set active for their set ID.
pub struct JustificationVerifier<'a> {
	grandpa: &'a GrandpaSetState,
}

impl<'a> JustificationVerifier<'a> {
	pub fn new(grandpa: &'a GrandpaSetState) -> Self {
		JustificationVerifier { grandpa }
	}

	/// Returns `false` for any justification which does not prove finality of its target.
	pub fn verify(&self, justification: &Justification) -> bool {
		let Some(authority_set) = self.grandpa.authority_set_for(justification.set_id) else {
			warn!(
				set_id = justification.set_id,
				current_set_id = self.grandpa.set_id(),
				"No authority set known for justification"
			);
			return false;
		};

		match check_finality(authority_set, justification) {
			Ok(()) => true,
			Err(error) => {
				warn!(
					block_number = justification.target_number,
					set_id = justification.set_id,
					round = justification.round,
					"Justification rejected: {error}"
				);
				false
			},
		}
	}

	/// Decodes SCALE encoded justification and verifies it.
	pub fn verify_encoded(&self, mut encoded: &[u8]) -> Result<bool, codec::Error> {
		let justification = Justification::decode(&mut encoded)?;
		Ok(self.verify(&justification))
	}
}

pub fn check_finality(authority_set: &AuthoritySet, justification: &Justification) -> Result<()> {
	if authority_set.set_id != justification.set_id {
		return Err(eyre!(
			"Justification for set {} checked against set {}",
			justification.set_id,
			authority_set.set_id
		));
	}

	let ancestry_map: HashMap<H256, H256> = justification
		.votes_ancestries
		.iter()
		.map(|header| (header.hash(), header.parent_hash))
		.collect();

	if !ancestry_map.is_empty() {
		debug!("Votes ancestries found, mapping: {ancestry_map:?}");
	}

	for precommit in &justification.precommits {
		if authority_set.weight_of(&precommit.id).is_none() {
			return Err(eyre!(
				"Precommit signer {:?} is not in authority set {}",
				precommit.id,
				authority_set.set_id
			));
		}

		if !verify_signature(precommit, justification) {
			return Err(eyre!(
				"Failed signature verification on block {:?}, validator id: {:?}",
				precommit.vote.target_hash,
				precommit.id
			));
		}

		let on_fork = precommit.vote.target_number >= justification.target_number
			&& confirm_ancestry(
				&precommit.vote.target_hash,
				&justification.target_hash,
				&ancestry_map,
			);
		if !on_fork {
			return Err(eyre!(
				"Precommit for block {:?} does not descend from target {:?}",
				precommit.vote.target_hash,
				justification.target_hash
			));
		}
	}

	// an authority counts once, and only if all of its votes agree
	let signed_weight: u128 = justification
		.precommits
		.iter()
		.into_group_map_by(|precommit| precommit.id)
		.into_iter()
		.filter_map(|(id, precommits)| {
			let equivocated = precommits
				.iter()
				.any(|precommit| precommit.vote != precommits[0].vote);
			if equivocated {
				warn!(validator_id = ?id, "Equivocating precommits ignored");
				return None;
			}
			authority_set.weight_of(&id).map(u128::from)
		})
		.sum();

	debug!(
		signed_weight,
		total_weight = authority_set.total_weight(),
		threshold = authority_set.threshold(),
		block_number = justification.target_number,
		set_id = authority_set.set_id,
		"Justification weight tallied"
	);

	is_signed_by_supermajority(signed_weight, authority_set.total_weight())
		.then_some(())
		.ok_or(eyre!("Not signed by supermajority of authority set!"))
}

fn confirm_ancestry(
	child_hash: &H256,
	root_hash: &H256,
	ancestry_map: &HashMap<H256, H256>,
) -> bool {
	if child_hash == root_hash {
		return true;
	}

	let mut curr_hash = child_hash;

	// We should be able to test it in at most ancestry_map.len() passes
	for _ in 0..ancestry_map.len() {
		if let Some(parent_hash) = ancestry_map.get(curr_hash) {
			if parent_hash == root_hash {
				return true;
			}
			curr_hash = parent_hash;
		} else {
			return false;
		}
	}

	false
}
