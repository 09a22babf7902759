use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SheetsCredentials;
use crate::error::StoreError;
use crate::schema::{CellRange, ColumnSpan};
use crate::store::RecordStore;

/// Values are interpreted as if typed into the sheet UI.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

const SHEETS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

enum Authorization {
    Fixed(String),
    /// Caches the current token and refreshes it before it expires.
    Minted(Arc<dyn TokenProvider>),
}

impl Authorization {
    fn from_credentials(credentials: &SheetsCredentials) -> Result<Self, StoreError> {
        match credentials {
            SheetsCredentials::AccessToken(token) => Ok(Authorization::Fixed(token.clone())),
            SheetsCredentials::ServiceAccount(path) => {
                let account = CustomServiceAccount::from_file(path).map_err(|e| {
                    StoreError::Unauthorized(format!(
                        "cannot load service account from {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Authorization::Minted(Arc::new(account)))
            }
        }
    }

    async fn bearer(&self) -> Result<String, StoreError> {
        match self {
            Authorization::Fixed(token) => Ok(token.clone()),
            Authorization::Minted(provider) => {
                let token = provider
                    .token(SHEETS_SCOPES)
                    .await
                    .map_err(|e| StoreError::Unauthorized(e.to_string()))?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Record store backed by the Google Sheets v4 values API.
pub struct SheetsStore {
    http_client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    authorization: Authorization,
}

impl SheetsStore {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        credentials: &SheetsCredentials,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let authorization = Authorization::from_credentials(credentials)?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(SheetsStore {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            authorization,
        })
    }

    /// URL of the values resource for an A1 range, with an optional `:verb`.
    fn values_url(&self, a1: &str, verb: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(a1),
            verb
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String, StoreError> {
        let token = self.authorization.bearer().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "HTTP {} from {}: {}",
                status, url, body
            )));
        }
        Ok(body)
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    async fn read_range(
        &self,
        sheet: &str,
        span: ColumnSpan,
    ) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.values_url(&span.on_sheet(sheet), "");
        let body = self.send(self.http_client.get(&url), &url).await?;

        let range: ValueRange = serde_json::from_str(&body)
            .map_err(|e| StoreError::Malformed(format!("values from {}: {}", url, e)))?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn append_row(
        &self,
        sheet: &str,
        span: ColumnSpan,
        row: Vec<String>,
    ) -> Result<(), StoreError> {
        let url = format!(
            "{}?valueInputOption={}",
            self.values_url(&span.on_sheet(sheet), ":append"),
            VALUE_INPUT_OPTION
        );
        let request = self.http_client.post(&url).json(&json!({ "values": [row] }));
        self.send(request, &url).await?;
        Ok(())
    }

    async fn update_range(&self, range: &CellRange, row: Vec<String>) -> Result<(), StoreError> {
        let a1 = range.to_string();
        let url = format!(
            "{}?valueInputOption={}",
            self.values_url(&a1, ""),
            VALUE_INPUT_OPTION
        );
        let request = self
            .http_client
            .put(&url)
            .json(&json!({ "range": a1, "values": [row] }));
        self.send(request, &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SHEETS_URL as DEFAULT_BASE;
    use crate::schema::{RECORD_SPAN, TRACKING_SHEET};
    use std::io::Write;

    fn token() -> SheetsCredentials {
        SheetsCredentials::AccessToken("ya29.test".to_string())
    }

    #[test]
    fn ranges_are_escaped_into_the_path() {
        let store = SheetsStore::new(
            "https://sheets.example.test/",
            "abc",
            &token(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            store.values_url(&RECORD_SPAN.on_sheet(TRACKING_SHEET), ":append"),
            "https://sheets.example.test/v4/spreadsheets/abc/values/%27getdata%27%21A%3AY:append"
        );
    }

    #[tokio::test]
    async fn fixed_tokens_are_sent_as_is() {
        let authorization = Authorization::from_credentials(&token()).unwrap();
        assert_eq!(authorization.bearer().await.unwrap(), "ya29.test");
    }

    #[test]
    fn unreadable_key_files_fail_at_startup() {
        let missing = SheetsCredentials::ServiceAccount("/nonexistent/credentials.json".into());
        let err = SheetsStore::new(DEFAULT_BASE, "abc", &missing, Duration::from_secs(1));
        assert!(matches!(err, Err(StoreError::Unauthorized(_))));

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "{{\"type\": \"authorized_user\"}}").unwrap();
        let bad = SheetsCredentials::ServiceAccount(garbage.path().to_path_buf());
        let err = SheetsStore::new(DEFAULT_BASE, "abc", &bad, Duration::from_secs(1));
        assert!(matches!(err, Err(StoreError::Unauthorized(_))));
    }

    #[test]
    fn cells_become_text() {
        assert_eq!(cell_text(json!("QR-1")), "QR-1");
        assert_eq!(cell_text(Value::Null), "");
        assert_eq!(cell_text(json!(12)), "12");
    }
}
