pub mod artifact_writer;
pub mod feed_source;
pub mod ledger_store;
pub mod title_match;
pub mod topics;

pub use artifact_writer::ArtifactWriter;
pub use feed_source::{FeedSource, RssFeedSource, StaticFeedSource};
pub use ledger_store::{InMemoryLedgerStore, JsonFileLedgerStore, LedgerLoad, LedgerStore, LoadedLedger};
pub use title_match::TitleMatcher;
pub use topics::{StaticTopics, TopicService, TopicSource};
