//! crates/progress_journal_core/src/journal.rs
//!
//! The `MediaJournal` aggregate: an append-only list of progress photos, the
//! period-grouped view and summary statistics derived from it, and the
//! whole-collection round-trip with the durable store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{JournalStats, MediaAsset, MediaCategory, PeriodBucket, RawFile, UnknownCategory};
use crate::period::{compare_period_keys, format_period_key};
use crate::ports::{Clock, FileReader, KeyValueStore, PortError};

pub const DEFAULT_STORAGE_KEY: &str = "progress_photos";
pub const DEFAULT_PERIOD_WINDOW: usize = 6;

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Invalid category: {0}")]
    InvalidCategory(#[from] UnknownCategory),

    /// The uploaded file could not be turned into a displayable payload.
    #[error("Failed to decode photo: {0}")]
    Decode(#[source] PortError),

    /// The durable store rejected a read or write. When raised by an upload,
    /// `asset` holds the photo that is nonetheless kept in memory.
    #[error("Failed to persist journal: {source}")]
    Persistence {
        asset: Option<Box<MediaAsset>>,
        #[source]
        source: PortError,
    },

    #[error("Stored journal could not be parsed: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Upload was cancelled before the photo was read")]
    Cancelled,
}

impl JournalError {
    /// Text suitable for showing to the person using the dashboard.
    pub fn user_message(&self) -> &'static str {
        match self {
            JournalError::InvalidCategory(_) => "Pick front, side or back for this photo.",
            JournalError::Decode(_) => "Couldn't read that photo, try another.",
            JournalError::Persistence { .. } => {
                "Saved for this session but may not persist. Check storage space."
            }
            JournalError::Corrupt(_) => "Your saved progress photos could not be loaded.",
            JournalError::Cancelled => "Upload cancelled.",
        }
    }

    fn persistence(source: PortError) -> Self {
        JournalError::Persistence { asset: None, source }
    }
}

pub type JournalResult<T> = Result<T, JournalError>;

//=========================================================================================
// Settings and Collaborators
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSettings {
    /// The single key the whole collection is stored under.
    pub storage_key: String,
    /// How many of the most recent periods `group_by_period` returns.
    pub period_window: usize,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            period_window: DEFAULT_PERIOD_WINDOW,
        }
    }
}

/// The external collaborators a journal is wired to.
#[derive(Clone)]
pub struct JournalPorts {
    pub store: Arc<dyn KeyValueStore>,
    pub reader: Arc<dyn FileReader>,
    pub clock: Arc<dyn Clock>,
}

//=========================================================================================
// The Journal
//=========================================================================================

pub struct MediaJournal {
    ports: JournalPorts,
    settings: JournalSettings,
    assets: Vec<MediaAsset>,
}

impl MediaJournal {
    /// Builds a journal over an already-known list of assets. Nothing is read
    /// from or written to the store.
    pub fn new(ports: JournalPorts, settings: JournalSettings, assets: Vec<MediaAsset>) -> Self {
        Self {
            ports,
            settings,
            assets,
        }
    }

    /// Rehydrates the journal from the durable store. An absent key yields an
    /// empty journal.
    pub async fn load(ports: JournalPorts, settings: JournalSettings) -> JournalResult<Self> {
        let stored = ports
            .store
            .get(&settings.storage_key)
            .await
            .map_err(JournalError::persistence)?;

        let assets = match stored {
            Some(serialized) => parse_assets(&serialized).map_err(|e| {
                warn!(key = %settings.storage_key, "Stored journal is corrupt: {}", e);
                e
            })?,
            None => Vec::new(),
        };
        info!(key = %settings.storage_key, count = assets.len(), "Journal rehydrated");

        Ok(Self::new(ports, settings, assets))
    }

    pub fn assets(&self) -> &[MediaAsset] {
        &self.assets
    }

    pub fn settings(&self) -> &JournalSettings {
        &self.settings
    }

    /// The reader this journal decodes uploads with. Lets callers decode
    /// outside whatever lock guards the journal, then hand the payload to
    /// `record_decoded`.
    pub fn reader(&self) -> Arc<dyn FileReader> {
        Arc::clone(&self.ports.reader)
    }

    /// Decodes `file`, records it under `category` and persists the collection.
    ///
    /// A decode failure leaves the journal untouched. A persistence failure
    /// still keeps the new asset in memory and returns it inside the error.
    pub async fn add_asset(&mut self, category: MediaCategory, file: RawFile) -> JournalResult<MediaAsset> {
        let payload = decode_upload(self.ports.reader.as_ref(), file, None).await?;
        self.record_decoded(category, payload).await
    }

    /// Same as `add_asset`, but abandons the upload if `cancel` fires while
    /// the file is still being read.
    pub async fn add_asset_cancellable(
        &mut self,
        category: MediaCategory,
        file: RawFile,
        cancel: &CancellationToken,
    ) -> JournalResult<MediaAsset> {
        let reader = self.reader();
        let payload = decode_upload(reader.as_ref(), file, Some(cancel)).await?;
        self.record_decoded(category, payload).await
    }

    /// Parses a category label and uploads under it.
    pub async fn add_asset_labeled(&mut self, category: &str, file: RawFile) -> JournalResult<MediaAsset> {
        let category: MediaCategory = category.parse()?;
        self.add_asset(category, file).await
    }

    /// Appends an already-decoded payload as a new asset and persists the collection.
    pub async fn record_decoded(&mut self, category: MediaCategory, payload: String) -> JournalResult<MediaAsset> {
        let asset = MediaAsset::new(category, payload, self.ports.clock.now());
        self.assets.push(asset.clone());
        info!(id = %asset.id, %category, period = %asset.period_key, "Photo added to journal");

        match self.save().await {
            Ok(()) => Ok(asset),
            Err(JournalError::Persistence { source, .. }) => Err(JournalError::Persistence {
                asset: Some(Box::new(asset)),
                source,
            }),
            Err(e) => Err(e),
        }
    }

    /// Writes the full collection to the store, overwriting the previous value.
    pub async fn save(&self) -> JournalResult<()> {
        let serialized = self.to_serialized()?;
        self.ports
            .store
            .set(&self.settings.storage_key, &serialized)
            .await
            .map_err(|e| {
                warn!(key = %self.settings.storage_key, "Journal write failed: {}", e);
                JournalError::persistence(e)
            })
    }

    /// Drops every asset, in memory and in the store.
    pub async fn clear(&mut self) -> JournalResult<()> {
        let removed = self.assets.len();
        self.assets.clear();
        self.ports
            .store
            .remove(&self.settings.storage_key)
            .await
            .map_err(JournalError::persistence)?;
        info!(removed, "Journal cleared");
        Ok(())
    }

    pub fn to_serialized(&self) -> JournalResult<String> {
        Ok(serde_json::to_string(&self.assets)?)
    }

    /// The most recent periods in ascending calendar order, each showing the
    /// last-inserted asset of every category.
    pub fn group_by_period(&self) -> Vec<PeriodBucket> {
        let mut buckets = self.group_all();
        let start = buckets.len().saturating_sub(self.settings.period_window);
        let window = buckets.split_off(start);
        debug!(periods = window.len(), skipped = start, "Grouped journal by period");
        window
    }

    /// Folds the whole history in insertion order. A later asset in the same
    /// (period, category) slot replaces the earlier one.
    fn group_all(&self) -> Vec<PeriodBucket> {
        let mut buckets: Vec<PeriodBucket> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for asset in &self.assets {
            let slot = *index.entry(asset.period_key.as_str()).or_insert_with(|| {
                buckets.push(PeriodBucket::empty(asset.period_key.clone()));
                buckets.len() - 1
            });
            buckets[slot].put(asset.clone());
        }

        buckets.sort_by(|a, b| compare_period_keys(&a.period_key, &b.period_key));
        buckets
    }

    pub fn stats(&self) -> JournalStats {
        self.stats_at(self.ports.clock.now())
    }

    /// Statistics as of `now`.
    ///
    /// `days_since_first` counts from the first asset in insertion order, not
    /// the earliest capture, and never goes below zero.
    pub fn stats_at(&self, now: DateTime<FixedOffset>) -> JournalStats {
        let periods: HashSet<&str> = self.assets.iter().map(|a| a.period_key.as_str()).collect();
        let days_since_first = self
            .assets
            .first()
            .map(|first| (now - first.captured_at).num_days().max(0))
            .unwrap_or(0);
        let current_period = format_period_key(&now);
        let current_period_count = self
            .assets
            .iter()
            .filter(|a| a.period_key == current_period)
            .count();

        JournalStats {
            total_assets: self.assets.len(),
            periods_tracked: periods.len(),
            days_since_first,
            current_period_count,
        }
    }
}

/// Reads `file` into a `data:` URI without touching any journal state.
///
/// When `cancel` is given and fires first, nothing is decoded and
/// `JournalError::Cancelled` is returned.
pub async fn decode_upload(
    reader: &dyn FileReader,
    file: RawFile,
    cancel: Option<&CancellationToken>,
) -> JournalResult<String> {
    let file_name = file.file_name.clone();
    let result = match cancel {
        Some(cancel) => tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(file = %file_name, "Upload cancelled during decode");
                return Err(JournalError::Cancelled);
            }
            result = reader.read_as_data_uri(file) => result,
        },
        None => reader.read_as_data_uri(file).await,
    };
    result.map_err(|e| {
        warn!(file = %file_name, "Photo decode failed: {}", e);
        JournalError::Decode(e)
    })
}

/// Parses the stored JSON form of a journal.
pub fn parse_assets(serialized: &str) -> JournalResult<Vec<MediaAsset>> {
    Ok(serde_json::from_str(serialized)?)
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestStore {
        values: Mutex<HashMap<String, String>>,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for TestStore {
        async fn get(&self, key: &str) -> PortResult<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> PortResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("quota exceeded".into()));
            }
            self.values.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> PortResult<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }

    /// Encodes the file name as the payload; empty files fail, files named
    /// "hang" never finish.
    struct TestReader;

    #[async_trait]
    impl FileReader for TestReader {
        async fn read_as_data_uri(&self, file: RawFile) -> PortResult<String> {
            if file.file_name == "hang" {
                std::future::pending::<()>().await;
            }
            if file.bytes.is_empty() {
                return Err(PortError::Unsupported("empty file".into()));
            }
            Ok(format!("data:image/png;name={}", file.file_name))
        }
    }

    struct TestClock(Mutex<DateTime<FixedOffset>>);

    impl TestClock {
        fn set(&self, at: DateTime<FixedOffset>) {
            *self.0.lock().unwrap() = at;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<FixedOffset> {
            *self.0.lock().unwrap()
        }
    }

    fn day(year: i32, month: u32, d: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(year, month, d, 12, 0, 0)
            .unwrap()
    }

    fn photo(name: &str) -> RawFile {
        RawFile {
            file_name: name.to_string(),
            content_type: Some("image/png".into()),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    struct Harness {
        store: Arc<TestStore>,
        clock: Arc<TestClock>,
    }

    impl Harness {
        fn new(start: DateTime<FixedOffset>) -> Self {
            Self {
                store: Arc::new(TestStore::default()),
                clock: Arc::new(TestClock(Mutex::new(start))),
            }
        }

        fn ports(&self) -> JournalPorts {
            JournalPorts {
                store: self.store.clone(),
                reader: Arc::new(TestReader),
                clock: self.clock.clone(),
            }
        }

        async fn journal(&self) -> MediaJournal {
            MediaJournal::load(self.ports(), JournalSettings::default()).await.unwrap()
        }
    }

    #[tokio::test]
    async fn empty_journal_has_no_periods_and_zero_stats() {
        let h = Harness::new(day(2024, 5, 1));
        let journal = h.journal().await;

        assert!(journal.group_by_period().is_empty());
        assert_eq!(journal.stats(), JournalStats::default());
    }

    #[tokio::test]
    async fn groups_months_ascending_with_one_slot_per_category() {
        let h = Harness::new(day(2024, 1, 10));
        let mut journal = h.journal().await;

        let a1 = journal.add_asset(MediaCategory::Front, photo("a1")).await.unwrap();
        let a2 = journal.add_asset(MediaCategory::Side, photo("a2")).await.unwrap();
        h.clock.set(day(2024, 2, 3));
        let a3 = journal.add_asset(MediaCategory::Front, photo("a3")).await.unwrap();

        let groups = journal.group_by_period();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].period_key, "January 2024");
        assert_eq!(groups[0].front.as_ref(), Some(&a1));
        assert_eq!(groups[0].side.as_ref(), Some(&a2));
        assert!(groups[0].back.is_none());
        assert_eq!(groups[1].period_key, "February 2024");
        assert_eq!(groups[1].front.as_ref(), Some(&a3));
        assert!(groups[1].side.is_none() && groups[1].back.is_none());
    }

    #[tokio::test]
    async fn later_upload_of_same_category_shadows_earlier_one() {
        let h = Harness::new(day(2024, 3, 1));
        let mut journal = h.journal().await;

        let first = journal.add_asset(MediaCategory::Front, photo("first")).await.unwrap();
        h.clock.set(day(2024, 3, 20));
        let second = journal.add_asset(MediaCategory::Front, photo("second")).await.unwrap();

        let groups = journal.group_by_period();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].front.as_ref(), Some(&second));
        assert_eq!(journal.assets().len(), 2);
        assert_eq!(journal.assets()[0], first);
        assert_eq!(journal.stats().current_period_count, 2);
    }

    #[tokio::test]
    async fn window_keeps_the_six_most_recent_periods() {
        let h = Harness::new(day(2023, 9, 1));
        let mut journal = h.journal().await;

        // September 2023 through April 2024: eight months.
        let months = [(2023, 9), (2023, 10), (2023, 11), (2023, 12), (2024, 1), (2024, 2), (2024, 3), (2024, 4)];
        for (year, month) in months {
            h.clock.set(day(year, month, 15));
            journal.add_asset(MediaCategory::Back, photo("m")).await.unwrap();
        }

        let keys: Vec<_> = journal.group_by_period().into_iter().map(|b| b.period_key).collect();
        assert_eq!(
            keys,
            vec!["November 2023", "December 2023", "January 2024", "February 2024", "March 2024", "April 2024"]
        );
        assert_eq!(journal.stats().periods_tracked, 8);
    }

    #[tokio::test]
    async fn grouping_sorts_by_calendar_even_when_inserted_out_of_order() {
        let h = Harness::new(day(2024, 3, 10));
        let mut journal = h.journal().await;

        journal.add_asset(MediaCategory::Front, photo("march")).await.unwrap();
        h.clock.set(day(2024, 1, 5));
        journal.add_asset(MediaCategory::Front, photo("january")).await.unwrap();
        h.clock.set(day(2023, 12, 5));
        journal.add_asset(MediaCategory::Side, photo("december")).await.unwrap();

        let keys: Vec<_> = journal.group_by_period().into_iter().map(|b| b.period_key).collect();
        assert_eq!(keys, vec!["December 2023", "January 2024", "March 2024"]);

        // Counted from the first inserted photo (March 10), not the earliest capture.
        assert_eq!(journal.stats_at(day(2024, 3, 20)).days_since_first, 10);
    }

    #[tokio::test]
    async fn days_since_first_starts_at_zero_and_grows() {
        let h = Harness::new(day(2024, 6, 1));
        let mut journal = h.journal().await;

        journal.add_asset(MediaCategory::Front, photo("p")).await.unwrap();
        assert_eq!(journal.stats().days_since_first, 0);

        h.clock.set(day(2024, 6, 2));
        assert_eq!(journal.stats().days_since_first, 1);
        h.clock.set(day(2024, 7, 1));
        assert_eq!(journal.stats().days_since_first, 30);

        // A clock that jumps backwards never yields a negative count.
        h.clock.set(day(2024, 5, 1));
        assert_eq!(journal.stats().days_since_first, 0);
    }

    #[tokio::test]
    async fn stats_count_current_period_only() {
        let h = Harness::new(day(2024, 4, 2));
        let mut journal = h.journal().await;

        journal.add_asset(MediaCategory::Front, photo("a")).await.unwrap();
        h.clock.set(day(2024, 5, 2));
        journal.add_asset(MediaCategory::Front, photo("b")).await.unwrap();
        journal.add_asset(MediaCategory::Side, photo("c")).await.unwrap();
        journal.add_asset(MediaCategory::Back, photo("d")).await.unwrap();

        let stats = journal.stats();
        assert_eq!(stats.total_assets, 4);
        assert_eq!(stats.periods_tracked, 2);
        assert_eq!(stats.current_period_count, 3);
        assert_eq!(stats.days_since_first, 30);
    }

    #[tokio::test]
    async fn decode_failure_is_reported_and_nothing_is_added() {
        let h = Harness::new(day(2024, 1, 1));
        let mut journal = h.journal().await;

        let empty = RawFile {
            file_name: "broken.png".into(),
            content_type: None,
            bytes: Bytes::new(),
        };
        let err = journal.add_asset(MediaCategory::Front, empty).await.unwrap_err();

        assert!(matches!(err, JournalError::Decode(_)));
        assert_eq!(err.user_message(), "Couldn't read that photo, try another.");
        assert!(journal.assets().is_empty());
        assert!(h.store.values.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_keeps_asset_in_memory() {
        let h = Harness::new(day(2024, 1, 1));
        let mut journal = h.journal().await;
        h.store.fail_writes.store(true, Ordering::SeqCst);

        let err = journal.add_asset(MediaCategory::Side, photo("p")).await.unwrap_err();
        let kept = match err {
            JournalError::Persistence { asset: Some(asset), .. } => *asset,
            other => panic!("expected persistence error, got {:?}", other),
        };
        assert_eq!(journal.assets(), &[kept.clone()]);
        assert_eq!(journal.stats().total_assets, 1);
        assert!(h.store.values.lock().unwrap().is_empty());

        // Once the store recovers, an explicit save writes the kept asset.
        h.store.fail_writes.store(false, Ordering::SeqCst);
        journal.save().await.unwrap();
        let reloaded = h.journal().await;
        assert_eq!(reloaded.assets(), &[kept]);
    }

    #[tokio::test]
    async fn rehydrated_journal_answers_identically() {
        let h = Harness::new(day(2024, 1, 10));
        let mut journal = h.journal().await;
        journal.add_asset(MediaCategory::Front, photo("a")).await.unwrap();
        h.clock.set(day(2024, 2, 11));
        journal.add_asset(MediaCategory::Back, photo("b")).await.unwrap();

        let reloaded = h.journal().await;
        assert_eq!(reloaded.assets(), journal.assets());
        assert_eq!(reloaded.group_by_period(), journal.group_by_period());
        assert_eq!(reloaded.stats(), journal.stats());
        assert_eq!(reloaded.to_serialized().unwrap(), journal.to_serialized().unwrap());
    }

    #[tokio::test]
    async fn corrupt_stored_value_is_reported() {
        let h = Harness::new(day(2024, 1, 1));
        h.store
            .values
            .lock()
            .unwrap()
            .insert(DEFAULT_STORAGE_KEY.to_string(), "{not json".to_string());

        let result = MediaJournal::load(h.ports(), JournalSettings::default()).await;
        assert!(matches!(result, Err(JournalError::Corrupt(_))));
    }

    #[tokio::test]
    async fn labeled_upload_rejects_unknown_category() {
        let h = Harness::new(day(2024, 1, 1));
        let mut journal = h.journal().await;

        let err = journal.add_asset_labeled("top", photo("p")).await.unwrap_err();
        assert!(matches!(err, JournalError::InvalidCategory(_)));
        assert!(journal.assets().is_empty());

        let asset = journal.add_asset_labeled("Back", photo("p")).await.unwrap();
        assert_eq!(asset.category, MediaCategory::Back);
    }

    #[tokio::test]
    async fn cancelled_upload_adds_nothing() {
        let h = Harness::new(day(2024, 1, 1));
        let mut journal = h.journal().await;
        let token = CancellationToken::new();
        token.cancel();

        let err = journal
            .add_asset_cancellable(MediaCategory::Front, photo("hang"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::Cancelled));
        assert!(journal.assets().is_empty());

        let live = CancellationToken::new();
        journal
            .add_asset_cancellable(MediaCategory::Front, photo("ok"), &live)
            .await
            .unwrap();
        assert_eq!(journal.assets().len(), 1);
    }

    #[tokio::test]
    async fn decode_then_record_matches_add_asset() {
        let h = Harness::new(day(2024, 8, 3));
        let mut journal = h.journal().await;
        let reader = journal.reader();

        let payload = decode_upload(reader.as_ref(), photo("split"), None).await.unwrap();
        assert!(journal.assets().is_empty());
        let asset = journal.record_decoded(MediaCategory::Side, payload).await.unwrap();

        assert_eq!(asset.payload, "data:image/png;name=split");
        assert_eq!(asset.period_key, "August 2024");
        assert_eq!(h.journal().await.assets(), &[asset]);
    }

    #[tokio::test]
    async fn decode_upload_reports_failure_and_cancellation() {
        let reader = TestReader;
        let empty = RawFile {
            file_name: "empty.jpg".into(),
            content_type: None,
            bytes: Bytes::new(),
        };
        let live = CancellationToken::new();
        assert!(matches!(
            decode_upload(&reader, empty, Some(&live)).await,
            Err(JournalError::Decode(_))
        ));

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(matches!(
            decode_upload(&reader, photo("hang"), Some(&cancelled)).await,
            Err(JournalError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn clear_empties_memory_and_store() {
        let h = Harness::new(day(2024, 1, 1));
        let mut journal = h.journal().await;
        journal.add_asset(MediaCategory::Front, photo("p")).await.unwrap();

        journal.clear().await.unwrap();
        assert!(journal.assets().is_empty());
        assert!(h.journal().await.assets().is_empty());
    }

    #[tokio::test]
    async fn custom_window_is_respected() {
        let h = Harness::new(day(2024, 1, 1));
        let settings = JournalSettings {
            period_window: 2,
            ..JournalSettings::default()
        };
        let mut journal = MediaJournal::load(h.ports(), settings).await.unwrap();
        for month in 1..=4 {
            h.clock.set(day(2024, month, 1));
            journal.add_asset(MediaCategory::Front, photo("p")).await.unwrap();
        }

        let keys: Vec<_> = journal.group_by_period().into_iter().map(|b| b.period_key).collect();
        assert_eq!(keys, vec!["March 2024", "April 2024"]);
    }
}
