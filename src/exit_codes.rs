//! Process exit codes
//!
//! - `0` success
//! - `1` general error (unreadable files, bad settings)
//! - `2` invalid command-line usage (reported by clap)
//! - `3` the config spec did not parse
//! - `4` one or more paths could not be resolved
//! - `5` the store failed part-way through a batch
//! - `6` another run holds the working tree lock
//! - `130` the run was cancelled (conventional for SIGINT)

pub const SUCCESS: u8 = 0;
pub const ERROR: u8 = 1;
pub const USAGE: u8 = 2;
pub const PARSE_FAILURE: u8 = 3;
pub const RESOLUTION_FAILURE: u8 = 4;
pub const STORE_FAILURE: u8 = 5;
pub const TREE_BUSY: u8 = 6;
pub const CANCELLED: u8 = 130;
