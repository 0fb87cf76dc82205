pub mod domain;
pub mod journal;
pub mod period;
pub mod ports;

pub use domain::{JournalStats, MediaAsset, MediaCategory, PeriodBucket, RawFile, UnknownCategory};
pub use journal::{
    decode_upload, parse_assets, JournalError, JournalPorts, JournalResult, JournalSettings, MediaJournal, DEFAULT_PERIOD_WINDOW,
    DEFAULT_STORAGE_KEY,
};
pub use period::{compare_period_keys, format_period_key, parse_period_key};
pub use ports::{Clock, FileReader, KeyValueStore, PortError, PortResult};
