use super::{Error, WarpSyncContext};
use crate::{
	data::Database,
	network::{FragmentSource, RuntimeSource},
	types::{BlockNumber, H256},
};
use derive_more::derive::Display;
use tracing::{error, info};

/// How warp sync ended.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum FinishReason {
	#[display("Warp sync completed at block {block_number}")]
	Completed { block_number: BlockNumber },
	#[display("Warp sync failed to progress past block {block_number}: {reason}")]
	Aborted {
		block_number: BlockNumber,
		reason: String,
	},
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WarpSyncAction {
	/// Fetches fragments following the given finalized block.
	RequestFragments { from: H256 },
	/// Verifies and finalizes one queued fragment.
	VerifyJustification,
	/// Loads runtime code of the finalized head.
	RuntimeDownload,
	Finished(FinishReason),
}

impl WarpSyncAction {
	pub fn is_finished(&self) -> bool {
		matches!(self, WarpSyncAction::Finished(_))
	}

	/// Executes the action against the context. Errors are passed on to [`Self::next`].
	pub async fn handle<D, F, R>(&self, ctx: &mut WarpSyncContext<D, F, R>) -> Result<(), Error>
	where
		D: Database,
		F: FragmentSource,
		R: RuntimeSource,
	{
		match self {
			WarpSyncAction::RequestFragments { from } => ctx.request_fragments(*from).await,
			WarpSyncAction::VerifyJustification => ctx.verify_next_fragment(),
			WarpSyncAction::RuntimeDownload => ctx.download_runtime().await,
			WarpSyncAction::Finished(_) => Ok(()),
		}
	}

	/// Selects the following action. Failures of external data end warp sync,
	/// only invariant violations are returned as errors.
	pub fn next<D, F, R>(
		self,
		handled: Result<(), Error>,
		ctx: &WarpSyncContext<D, F, R>,
	) -> Result<WarpSyncAction, Error> {
		if let Err(error) = handled {
			if error.is_invariant_violation() {
				return Err(error);
			}
			let block_number = ctx.last_finalized_block_number();
			error!(block_number, action = ?self, "Warp sync aborted: {error}");
			return Ok(WarpSyncAction::Finished(FinishReason::Aborted {
				block_number,
				reason: error.to_string(),
			}));
		}

		let next = match self {
			WarpSyncAction::RequestFragments { .. } => {
				if !ctx.queue().is_empty() {
					WarpSyncAction::VerifyJustification
				} else if ctx.fragments_finished() {
					WarpSyncAction::RuntimeDownload
				} else {
					return Err(Error::InvariantViolation(
						"fragment request succeeded without fragments",
					));
				}
			},
			WarpSyncAction::VerifyJustification => {
				if !ctx.queue().is_empty() {
					WarpSyncAction::VerifyJustification
				} else if ctx.fragments_finished() {
					WarpSyncAction::RuntimeDownload
				} else {
					WarpSyncAction::RequestFragments {
						from: ctx.last_finalized_block_hash(),
					}
				}
			},
			WarpSyncAction::RuntimeDownload => {
				let block_number = ctx.last_finalized_block_number();
				info!(block_number, "Warp sync finished");
				WarpSyncAction::Finished(FinishReason::Completed { block_number })
			},
			WarpSyncAction::Finished(reason) => WarpSyncAction::Finished(reason),
		};
		Ok(next)
	}
}
