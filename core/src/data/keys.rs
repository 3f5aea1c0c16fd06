/// Keys predefined for persistance:
/// Prefix of the authority set key, suffixed with the set ID
pub const AUTHORITY_SET_KEY: &str = "grandpa_authorities";
/// Current authority set ID key
pub const SET_ID_KEY: &str = "grandpa_set_id";
/// Latest finalized round key
pub const LATEST_ROUND_KEY: &str = "grandpa_latest_round";
/// Prefix of the precommits key, suffixed with round number and set ID
pub const GRANDPA_PRECOMMITS_KEY: &str = "grandpa_precommits";
/// Last finalized block number key
pub const LAST_FINALIZED_BLOCK_NUMBER_KEY: &str = "last_finalized_block_number";
/// Last finalized block hash key
pub const LAST_FINALIZED_BLOCK_HASH_KEY: &str = "last_finalized_block_hash";
/// State root of the last finalized block
pub const STATE_ROOT_KEY: &str = "state_root";
/// Runtime code key
pub const RUNTIME_CODE_KEY: &str = "runtime_code";
/// Warp sync finished flag key
pub const IS_WARP_SYNC_FINISHED_KEY: &str = "is_warp_sync_finished";
