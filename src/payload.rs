use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single submitted form value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
    /// Arrays and objects. Accepted so unrelated form state does not fail
    /// the whole submission.
    Other(serde_json::Value),
}

impl FieldValue {
    /// Form truthiness: `false`, `0` and `""` count as not filled in.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Flag(b) => *b,
            FieldValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Other(_) => true,
        }
    }

    /// Text written to a plain cell.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Flag(true) => "TRUE".to_string(),
            FieldValue::Flag(false) => "FALSE".to_string(),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Other(value) => value.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

/// The `data` object of a submission: field name to value, `null` allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    fields: BTreeMap<String, Option<FieldValue>>,
}

impl Payload {
    /// Key the UI uses to carry the stage of a staged operation.
    pub const STAGE_KEY: &'static str = "status";

    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), Some(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).and_then(Option::as_ref)
    }

    /// The value of `key` when it was submitted as a string.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(FieldValue::is_truthy)
    }

    /// The submitted stage, if any. An empty status counts as none.
    pub fn stage(&self) -> Option<&str> {
        self.text(Self::STAGE_KEY).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_mixed_form_values() {
        let payload: Payload = serde_json::from_str(
            r#"{"status":"end","movedToAssembly":true,"count":3,"rework":null,"qcResult":"Good"}"#,
        )
        .unwrap();

        assert_eq!(payload.stage(), Some("end"));
        assert_eq!(payload.get("movedToAssembly"), Some(&FieldValue::Flag(true)));
        assert_eq!(payload.get("count").map(FieldValue::to_cell).as_deref(), Some("3"));
        assert_eq!(payload.get("rework"), None);
        assert_eq!(payload.text("qcResult"), Some("Good"));
        assert_eq!(payload.text("movedToAssembly"), None);
    }

    #[test]
    fn truthiness_follows_form_semantics() {
        let payload = Payload::default()
            .with("empty", "")
            .with("space", " ")
            .with("off", false)
            .with("zero", 0.0)
            .with("on", true);

        assert!(!payload.is_truthy("empty"));
        assert!(payload.is_truthy("space"));
        assert!(!payload.is_truthy("off"));
        assert!(!payload.is_truthy("zero"));
        assert!(payload.is_truthy("on"));
        assert!(!payload.is_truthy("absent"));
    }

    #[test]
    fn cells_render_flags_and_numbers() {
        assert_eq!(FieldValue::Flag(true).to_cell(), "TRUE");
        assert_eq!(FieldValue::Number(2.5).to_cell(), "2.5");
        assert_eq!(FieldValue::Number(-4.0).to_cell(), "-4");
    }

    #[test]
    fn nested_values_are_kept_as_json() {
        let payload: Payload = serde_json::from_str(
            r#"{"orderId":"O-1","selected":["a","b"],"meta":{"page":2},"empty":[]}"#,
        )
        .unwrap();

        assert_eq!(payload.text("orderId"), Some("O-1"));
        assert!(payload.is_truthy("selected"));
        assert!(payload.is_truthy("empty"));
        assert_eq!(
            payload.get("meta").map(FieldValue::to_cell).as_deref(),
            Some(r#"{"page":2}"#)
        );
    }

    #[test]
    fn empty_status_is_no_stage() {
        let payload = Payload::default().with("status", "");
        assert_eq!(payload.stage(), None);
    }
}
