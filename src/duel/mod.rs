//! Duel selection and vote processing

pub mod selector;
pub mod vote;

pub use selector::{choose_pair, merge_ratings, DuelSelector};
pub use vote::{apply_vote, validate_vote, VoteProcessor, VoteReceipt, VoteSettings};
