pub mod list;
pub mod merge_shuffle;
pub mod split_rng;

#[macro_use]
extern crate log;
