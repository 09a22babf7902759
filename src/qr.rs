use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LabelError;

const QR_ID_KEY: &str = "QR ID";
const BOX_TYPE_KEY: &str = "Box Type";
const OPERATOR_KEY: &str = "Operator";

/// Offset of Indian Standard Time from UTC, in seconds.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// The text printed into a box's QR code.
///
/// Encoded as `QR ID: <id>, Box Type: <type>, Operator: <name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrLabel {
    pub qr_id: String,
    pub box_type: String,
    pub operator: String,
}

impl QrLabel {
    /// Parse scanned label text. Unknown keys are ignored; later duplicates win.
    pub fn parse(text: &str) -> Result<Self, LabelError> {
        let mut qr_id = None;
        let mut box_type = None;
        let mut operator = None;

        for item in text.split(", ") {
            let mut parts = item.splitn(2, ": ");
            let key = parts.next().unwrap_or_default().trim();
            let value = parts.next().map(str::trim).filter(|v| !v.is_empty());
            match key {
                QR_ID_KEY => qr_id = value,
                BOX_TYPE_KEY => box_type = value,
                OPERATOR_KEY => operator = value,
                _ => {}
            }
        }

        Ok(QrLabel {
            qr_id: qr_id.ok_or(LabelError::MissingKey(QR_ID_KEY))?.to_string(),
            box_type: box_type.ok_or(LabelError::MissingKey(BOX_TYPE_KEY))?.to_string(),
            operator: operator.ok_or(LabelError::MissingKey(OPERATOR_KEY))?.to_string(),
        })
    }

    /// Label text for printing; every field must be filled in.
    pub fn encode(&self) -> Result<String, LabelError> {
        if self.qr_id.is_empty() || self.box_type.is_empty() || self.operator.is_empty() {
            return Err(LabelError::EmptyField);
        }
        Ok(format!(
            "{}: {}, {}: {}, {}: {}",
            QR_ID_KEY, self.qr_id, BOX_TYPE_KEY, self.box_type, OPERATOR_KEY, self.operator
        ))
    }
}

/// `now` in IST, formatted for a `datetime-local` input (`YYYY-MM-DDTHH:MM`).
pub fn ist_timestamp(now: DateTime<Utc>) -> String {
    let Some(ist) = FixedOffset::east_opt(IST_OFFSET_SECS) else {
        return now.format("%Y-%m-%dT%H:%M").to_string();
    };
    now.with_timezone(&ist).format("%Y-%m-%dT%H:%M").to_string()
}
