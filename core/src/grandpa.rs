//! GRANDPA voter state tracked while following finality: authority sets,
//! pending set changes and the consensus digests which announce them.

mod change;
mod consensus;
mod state;

pub use change::*;
pub use consensus::*;
pub use state::*;
