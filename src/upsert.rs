use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{Rejection, StoreError, UpsertError};
use crate::payload::Payload;
use crate::schema::{CellRange, Descriptor, RECORD_SPAN, RECORD_WIDTH, Stage, TRACKING_SHEET};
use crate::store::{RecordStore, bounded};
use crate::validator::validate;

/// Default limit on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// How the first row of a brand-new identifier is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateLayout {
    /// Operation values are spliced in from column B onwards, whatever
    /// operation created the record. Staged operations contribute their
    /// end-stage values regardless of the submitted stage, so a first
    /// `start` submission yields a row holding only the identifier. Only
    /// `Production Details` lands in its own columns this way; kept as the
    /// default because existing sheets were filled like this.
    #[default]
    LegacyOffset,
    /// The submitted stage's values are placed at its declared columns.
    ColumnAligned,
}

impl CreateLayout {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "legacy" => Some(CreateLayout::LegacyOffset),
            "aligned" => Some(CreateLayout::ColumnAligned),
            _ => None,
        }
    }

    /// A full-width record holding `identifier` and the values `payload`
    /// gives for `descriptor`.
    pub fn build_row(self, identifier: &str, descriptor: &Descriptor, payload: &Payload) -> Vec<String> {
        let mut row = vec![String::new(); RECORD_WIDTH];
        row[0] = identifier.to_string();

        let (start, values) = match self {
            CreateLayout::LegacyOffset => {
                let source = match descriptor.stage {
                    Some(_) => descriptor
                        .operation
                        .descriptor(Some(Stage::End))
                        .unwrap_or(descriptor),
                    None => descriptor,
                };
                (1, source.values_from_payload(payload))
            }
            CreateLayout::ColumnAligned => (
                descriptor.span.first.index(),
                descriptor.values_from_payload(payload),
            ),
        };
        for (slot, value) in row.iter_mut().skip(start).zip(values) {
            *slot = value;
        }
        row
    }
}

/// Whether upserts for the same identifier may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Read-then-write runs unguarded; concurrent first submissions for one
    /// identifier can both append.
    #[default]
    None,
    /// Upserts for one identifier run one at a time within this process.
    PerIdentifier,
}

impl LockPolicy {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "none" => Some(LockPolicy::None),
            "per-identifier" => Some(LockPolicy::PerIdentifier),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct IdentifierLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IdentifierLocks {
    async fn acquire(&self, identifier: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Slots no one holds or waits on can go.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(identifier.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new record was appended.
    Created { row: Vec<String> },
    /// An existing record was overwritten within `range`.
    Updated { range: CellRange, values: Vec<String> },
}

/// Create-or-update of tracking records keyed by QR identifier.
pub struct UpsertEngine {
    store: Arc<dyn RecordStore>,
    layout: CreateLayout,
    locks: Option<IdentifierLocks>,
    timeout: Duration,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        UpsertEngine {
            store,
            layout: CreateLayout::default(),
            locks: None,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_layout(mut self, layout: CreateLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.locks = match policy {
            LockPolicy::None => None,
            LockPolicy::PerIdentifier => Some(IdentifierLocks::default()),
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Apply one submission.
    ///
    /// Validation failures return before the store is touched. Otherwise the
    /// tracking sheet is read, the identifier located (first exact match in
    /// column A), and the record appended or updated in place. Store failures
    /// are returned as-is; nothing is retried.
    pub async fn upsert(
        &self,
        identifier: &str,
        operation: &str,
        stage: Option<&str>,
        payload: &Payload,
    ) -> Result<UpsertOutcome, UpsertError> {
        let descriptor = validate(operation, stage, payload).map_err(Rejection::from)?;
        let values = descriptor.values_from_payload(payload);
        if values.is_empty() || values.len() != descriptor.span.width() {
            return Err(Rejection::InvalidOperationData.into());
        }

        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(identifier).await),
            None => None,
        };

        match self.find_row(identifier).await? {
            None => self.create(identifier, descriptor, payload).await,
            Some(index) => self.update(identifier, descriptor, index, values).await,
        }
    }

    /// Index of the first row whose identifier cell equals `identifier`.
    async fn find_row(&self, identifier: &str) -> Result<Option<usize>, StoreError> {
        let rows = bounded(self.timeout, self.store.read_range(TRACKING_SHEET, RECORD_SPAN)).await?;
        let index = rows
            .iter()
            .position(|row| row.first().map(String::as_str) == Some(identifier));
        log::debug!(
            "lookup of {} over {} rows: {:?}",
            identifier,
            rows.len(),
            index
        );
        Ok(index)
    }

    async fn create(
        &self,
        identifier: &str,
        descriptor: &Descriptor,
        payload: &Payload,
    ) -> Result<UpsertOutcome, UpsertError> {
        let row = self.layout.build_row(identifier, descriptor, payload);
        bounded(
            self.timeout,
            self.store.append_row(TRACKING_SHEET, RECORD_SPAN, row.clone()),
        )
        .await?;
        log::info!("created record {} with {}", identifier, descriptor.operation);
        Ok(UpsertOutcome::Created { row })
    }

    async fn update(
        &self,
        identifier: &str,
        descriptor: &Descriptor,
        index: usize,
        values: Vec<String>,
    ) -> Result<UpsertOutcome, UpsertError> {
        // Row 1 of the sheet is the header, and rows are 1-based.
        let range = descriptor.target_range(index + 1);
        bounded(self.timeout, self.store.update_range(&range, values.clone())).await?;
        log::info!(
            "updated {} for {} at {}",
            descriptor.operation,
            identifier,
            range
        );
        Ok(UpsertOutcome::Updated { range, values })
    }
}
