//! squitter-core: ADS-B extended squitter decoding and CPR position tracking.
//!
//! No async, no I/O beyond reading the config file. The `squitter` CLI feeds
//! frames into a [`Session`] and prints the resulting reports.

pub mod altitude;
pub mod bits;
pub mod config;
pub mod cpr;
pub mod crc;
pub mod decode;
pub mod session;
pub mod track;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{Config, ConfigError, FeedConfig, SessionConfig};
pub use cpr::CprError;
pub use decode::decode;
pub use session::{FrameRecord, Report, Session, SessionStats};
pub use track::{TrackCache, TrackEntry};
pub use types::*;
