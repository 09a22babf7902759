use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::StoreError;
use crate::schema::{CellRange, ColumnSpan};

/// The tabular service tracking records live in.
///
/// Rows are ordered sequences of cell strings. Implementations must report
/// failures instead of assuming a write landed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every row of `span` on `sheet`, header row included.
    async fn read_range(&self, sheet: &str, span: ColumnSpan)
    -> Result<Vec<Vec<String>>, StoreError>;

    /// Add `row` after the last row of `span` on `sheet`.
    async fn append_row(
        &self,
        sheet: &str,
        span: ColumnSpan,
        row: Vec<String>,
    ) -> Result<(), StoreError>;

    /// Overwrite the cells of `range` with `row`.
    async fn update_range(&self, range: &CellRange, row: Vec<String>) -> Result<(), StoreError>;
}

/// Run a store call, turning an elapsed `limit` into [`StoreError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// A store call as observed by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Read {
        sheet: String,
        span: String,
    },
    Append {
        sheet: String,
        row: Vec<String>,
    },
    Update {
        sheet: String,
        cells: String,
        row: Vec<String>,
    },
}

#[derive(Debug, Default)]
struct MemoryInner {
    sheets: HashMap<String, Vec<Vec<String>>>,
    calls: Vec<StoreCall>,
    unavailable: bool,
    latency: Option<Duration>,
}

/// In-process record store.
///
/// Backs local dry runs (`TRACKER_STORE=memory`) and the test suites. Every
/// call is recorded so tests can assert what was written and where.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `sheet` with `rows`, replacing anything already there.
    pub fn with_rows(self, sheet: &str, rows: Vec<Vec<String>>) -> Self {
        self.lock().sheets.insert(sheet.to_string(), rows);
        self
    }

    /// Delay every call by `latency` before it touches the data.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// While set, every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
        self.lock().sheets.get(sheet).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self, call: StoreCall) -> Result<(), StoreError> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.lock();
        inner.calls.push(call);
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_range(
        &self,
        sheet: &str,
        span: ColumnSpan,
    ) -> Result<Vec<Vec<String>>, StoreError> {
        self.enter(StoreCall::Read {
            sheet: sheet.to_string(),
            span: span.to_string(),
        })
        .await?;

        let inner = self.lock();
        let first = span.first.index();
        let last = span.last.index();
        let rows = inner
            .sheets
            .get(sheet)
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        let end = row.len().min(last + 1);
                        row.get(first..end).map(<[String]>::to_vec).unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn append_row(
        &self,
        sheet: &str,
        span: ColumnSpan,
        row: Vec<String>,
    ) -> Result<(), StoreError> {
        if row.len() > span.width() {
            return Err(StoreError::Malformed(format!(
                "{} cells do not fit {}",
                row.len(),
                span
            )));
        }
        self.enter(StoreCall::Append {
            sheet: sheet.to_string(),
            row: row.clone(),
        })
        .await?;

        let mut padded = vec![String::new(); span.first.index()];
        padded.extend(row);
        self.lock()
            .sheets
            .entry(sheet.to_string())
            .or_default()
            .push(padded);
        Ok(())
    }

    async fn update_range(&self, range: &CellRange, row: Vec<String>) -> Result<(), StoreError> {
        if row.len() != range.span.width() || range.row == 0 {
            return Err(StoreError::Malformed(format!(
                "{} cells do not fit {}",
                row.len(),
                range
            )));
        }
        self.enter(StoreCall::Update {
            sheet: range.sheet.clone(),
            cells: range.cells(),
            row: row.clone(),
        })
        .await?;

        let mut inner = self.lock();
        let rows = inner.sheets.entry(range.sheet.clone()).or_default();
        if rows.len() < range.row {
            rows.resize(range.row, Vec::new());
        }
        let target = &mut rows[range.row - 1];
        let last = range.span.last.index();
        if target.len() <= last {
            target.resize(last + 1, String::new());
        }
        for (offset, value) in row.into_iter().enumerate() {
            target[range.span.first.index() + offset] = value;
        }
        Ok(())
    }
}
