pub mod feed;
pub mod parser;

pub use feed::{DEFAULT_SBS_ADDRESS, FeedSource, SbsFeed};
pub use parser::{SbsField, SbsMessage, SbsMessageType, parse_sbs_message};
