pub mod campaign;
pub mod list;
pub mod message;
pub mod recipient;
pub mod user;

use serde::{Deserialize, Serialize};

/// Free-form per-record metadata value. Kept as a small tagged union instead of
/// an untyped blob so custom fields stay type-checked end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl FieldValue {
    /// Rendering used when a custom field is substituted into message text.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::Flag(b) => b.to_string(),
        }
    }
}

pub type FieldMap = std::collections::HashMap<String, FieldValue>;
