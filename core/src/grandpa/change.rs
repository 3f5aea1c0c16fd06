use crate::types::{Authority, BlockNumber};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ChangeKind {
	Forced,
	Scheduled,
}

/// Authority set change announced in a finalized header, applicable once
/// its application block is finalized.
/// Ordering follows [`compare`], remaining fields only break its ties so that
/// `Ord` stays consistent with the structural `PartialEq`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthoritySetChange {
	kind: ChangeKind,
	authorities: Vec<Authority>,
	delay: BlockNumber,
	application_block: BlockNumber,
	sequence: u64,
}

impl AuthoritySetChange {
	pub fn scheduled(
		authorities: Vec<Authority>,
		delay: BlockNumber,
		announce_block: BlockNumber,
	) -> Self {
		AuthoritySetChange {
			kind: ChangeKind::Scheduled,
			authorities,
			delay,
			application_block: announce_block.saturating_add(delay),
			sequence: 0,
		}
	}

	/// Forced changes are delayed by the additional offset on top of the digest delay.
	pub fn forced(
		authorities: Vec<Authority>,
		delay: BlockNumber,
		additional_offset: BlockNumber,
		announce_block: BlockNumber,
	) -> Self {
		let delay = delay.saturating_add(additional_offset);
		AuthoritySetChange {
			kind: ChangeKind::Forced,
			authorities,
			delay,
			application_block: announce_block.saturating_add(delay),
			sequence: 0,
		}
	}

	/// Sets the insertion sequence used to order changes of the same kind.
	pub fn with_sequence(mut self, sequence: u64) -> Self {
		self.sequence = sequence;
		self
	}

	pub fn kind(&self) -> ChangeKind {
		self.kind
	}

	pub fn is_forced(&self) -> bool {
		self.kind == ChangeKind::Forced
	}

	pub fn authorities(&self) -> &[Authority] {
		&self.authorities
	}

	pub fn delay(&self) -> BlockNumber {
		self.delay
	}

	pub fn application_block(&self) -> BlockNumber {
		self.application_block
	}

	pub fn sequence(&self) -> u64 {
		self.sequence
	}

	pub fn into_authorities(self) -> Vec<Authority> {
		self.authorities
	}
}

/// Forced changes take priority over scheduled ones, ties are broken by insertion order.
pub fn compare(a: &AuthoritySetChange, b: &AuthoritySetChange) -> Ordering {
	match (a.is_forced(), b.is_forced()) {
		(true, false) => Ordering::Less,
		(false, true) => Ordering::Greater,
		_ => a.sequence.cmp(&b.sequence),
	}
}

impl PartialOrd for AuthoritySetChange {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuthoritySetChange {
	fn cmp(&self, other: &Self) -> Ordering {
		let members = |change: &Self| {
			change
				.authorities
				.iter()
				.map(|authority| (authority.id, authority.weight))
				.collect::<Vec<_>>()
		};
		compare(self, other)
			.then_with(|| self.application_block.cmp(&other.application_block))
			.then_with(|| self.delay.cmp(&other.delay))
			.then_with(|| members(self).cmp(&members(other)))
	}
}
