pub mod attempt;
pub mod feed_item;
pub mod ledger;

pub use attempt::{ImportAttempt, ImportOutcome};
pub use feed_item::{sort_oldest_first, FeedItem};
pub use ledger::Ledger;
