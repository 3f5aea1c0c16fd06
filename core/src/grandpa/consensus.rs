use crate::types::{Authority, BlockHeader, BlockNumber, GRANDPA_ENGINE_ID};
use codec::{Decode, Encode, Output};
use thiserror::Error;

const SCHEDULED_CHANGE: u8 = 1;
const FORCED_CHANGE: u8 = 2;
const ON_DISABLED: u8 = 3;
const PAUSE: u8 = 4;
const RESUME: u8 = 5;

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("Unknown GRANDPA consensus message format {0}")]
	UnknownDigestFormat(u8),
	#[error("Forced authority set change is missing its additional offset")]
	MissingAdditionalOffset,
	#[error("Cannot decode GRANDPA consensus message: {0}")]
	Codec(#[from] codec::Error),
}

/// GRANDPA consensus message carried in a header digest.
#[derive(Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum GrandpaConsensusMessage {
	ScheduledChange {
		authorities: Vec<Authority>,
		delay: BlockNumber,
	},
	ForcedChange {
		additional_offset: BlockNumber,
		authorities: Vec<Authority>,
		delay: BlockNumber,
	},
	OnDisabled {
		authority_index: u64,
	},
	Pause {
		delay: BlockNumber,
	},
	Resume {
		delay: BlockNumber,
	},
}

impl GrandpaConsensusMessage {
	/// Decodes digest payload, leading byte selects the message format.
	pub fn decode_digest(mut data: &[u8]) -> Result<Self, DecodeError> {
		let input = &mut data;
		let message = match u8::decode(input)? {
			SCHEDULED_CHANGE => GrandpaConsensusMessage::ScheduledChange {
				authorities: Decode::decode(input)?,
				delay: Decode::decode(input)?,
			},
			FORCED_CHANGE => {
				let additional_offset =
					u32::decode(input).map_err(|_| DecodeError::MissingAdditionalOffset)?;
				GrandpaConsensusMessage::ForcedChange {
					additional_offset,
					authorities: Decode::decode(input)?,
					delay: Decode::decode(input)?,
				}
			},
			ON_DISABLED => GrandpaConsensusMessage::OnDisabled {
				authority_index: Decode::decode(input)?,
			},
			PAUSE => GrandpaConsensusMessage::Pause {
				delay: Decode::decode(input)?,
			},
			RESUME => GrandpaConsensusMessage::Resume {
				delay: Decode::decode(input)?,
			},
			format => return Err(DecodeError::UnknownDigestFormat(format)),
		};
		if !input.is_empty() {
			return Err(codec::Error::from("Trailing bytes after GRANDPA digest").into());
		}
		Ok(message)
	}

	fn format(&self) -> u8 {
		match self {
			GrandpaConsensusMessage::ScheduledChange { .. } => SCHEDULED_CHANGE,
			GrandpaConsensusMessage::ForcedChange { .. } => FORCED_CHANGE,
			GrandpaConsensusMessage::OnDisabled { .. } => ON_DISABLED,
			GrandpaConsensusMessage::Pause { .. } => PAUSE,
			GrandpaConsensusMessage::Resume { .. } => RESUME,
		}
	}
}

impl Encode for GrandpaConsensusMessage {
	fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
		self.format().encode_to(dest);
		match self {
			GrandpaConsensusMessage::ScheduledChange { authorities, delay } => {
				authorities.encode_to(dest);
				delay.encode_to(dest);
			},
			GrandpaConsensusMessage::ForcedChange {
				additional_offset,
				authorities,
				delay,
			} => {
				additional_offset.encode_to(dest);
				authorities.encode_to(dest);
				delay.encode_to(dest);
			},
			GrandpaConsensusMessage::OnDisabled { authority_index } => {
				authority_index.encode_to(dest)
			},
			GrandpaConsensusMessage::Pause { delay } | GrandpaConsensusMessage::Resume { delay } => {
				delay.encode_to(dest)
			},
		}
	}
}

/// Decodes all GRANDPA consensus messages from the header digest.
/// Fails as a whole if any of the messages cannot be decoded.
pub fn grandpa_consensus_messages(
	header: &BlockHeader,
) -> Result<Vec<GrandpaConsensusMessage>, DecodeError> {
	header
		.consensus_logs(GRANDPA_ENGINE_ID)
		.map(GrandpaConsensusMessage::decode_digest)
		.collect()
}
