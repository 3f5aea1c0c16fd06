pub mod data;
pub mod finality;
pub mod grandpa;
pub mod network;
pub mod sync_state;
pub mod types;
pub mod utils;
pub mod warp_sync;

#[cfg(test)]
mod test_utils;
