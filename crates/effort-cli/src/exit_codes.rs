//! Process exit codes. Part of the CLI contract.

pub const OK: i32 = 0;
/// A transcription was rejected or a replayed event failed.
pub const FAILED: i32 = 1;
/// The session config or script could not be loaded or is invalid.
pub const CONFIG_ERROR: i32 = 2;
