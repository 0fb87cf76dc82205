pub mod clock;
pub mod file_reader;
pub mod kv_store;

pub use clock::SystemClock;
pub use file_reader::DataUriReader;
pub use kv_store::{MemoryKvStore, SqliteKvStore};
