//! The dataset interface consumed by the engine.
//!
//! Storage is owned elsewhere; the engine only reads values, manages case
//! selection, and listens to mutation notifications through
//! [`Dataset::on_action`]. Notifications are delivered after the mutation has
//! been applied.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use plotweave_core::ConnectionGuard;
use serde::{Deserialize, Serialize};

use super::attribute::AttributeType;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseValue {
    /// A number. `NaN` counts as empty.
    Number(f64),
    /// A string. The empty string counts as empty.
    Text(String),
}

impl CaseValue {
    /// Whether this value counts as missing.
    pub fn is_empty(&self) -> bool {
        match self {
            CaseValue::Number(n) => n.is_nan(),
            CaseValue::Text(s) => s.is_empty(),
        }
    }

    /// Numeric interpretation: numbers as-is, strings parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CaseValue::Number(n) => Some(*n),
            CaseValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for CaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseValue::Number(n) => write!(f, "{n}"),
            CaseValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CaseValue {
    fn from(n: f64) -> Self {
        CaseValue::Number(n)
    }
}

impl From<i32> for CaseValue {
    fn from(n: i32) -> Self {
        CaseValue::Number(f64::from(n))
    }
}

impl From<&str> for CaseValue {
    fn from(s: &str) -> Self {
        CaseValue::Text(s.to_string())
    }
}

impl From<String> for CaseValue {
    fn from(s: String) -> Self {
        CaseValue::Text(s)
    }
}

/// A case id together with some or all of its values.
///
/// Used both for inserting cases and for describing value changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaseValues {
    /// The case id.
    #[serde(rename = "__id__")]
    pub id: String,
    /// Values keyed by attribute id.
    #[serde(flatten)]
    pub values: BTreeMap<String, CaseValue>,
}

impl CaseValues {
    /// A case with no values.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Add a value.
    pub fn with(mut self, attribute_id: impl Into<String>, value: impl Into<CaseValue>) -> Self {
        self.values.insert(attribute_id.into(), value.into());
        self
    }

    /// String form of a value, empty if absent.
    pub fn str_value(&self, attribute_id: &str) -> String {
        self.values
            .get(attribute_id)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

/// Metadata describing one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Declared or inferred type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
}

/// A mutation notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetAction {
    /// Cases were appended.
    AddCases(Vec<CaseValues>),
    /// Cases were deleted.
    RemoveCases(Vec<String>),
    /// Values of existing cases changed. `cases` hold the new values.
    SetCaseValues {
        /// The affected cases and their new values.
        cases: Vec<CaseValues>,
        /// The attributes touched, when known.
        attribute_ids: Option<Vec<String>>,
    },
    /// An attribute was added.
    AddAttribute(String),
    /// An attribute and all of its values were deleted.
    RemoveAttribute(String),
}

impl DatasetAction {
    /// The action name, as used in serialized action logs.
    pub fn name(&self) -> &'static str {
        match self {
            DatasetAction::AddCases(_) => "addCases",
            DatasetAction::RemoveCases(_) => "removeCases",
            DatasetAction::SetCaseValues { .. } => "setCaseValues",
            DatasetAction::AddAttribute(_) => "addAttribute",
            DatasetAction::RemoveAttribute(_) => "removeAttribute",
        }
    }
}

/// Callback invoked for every dataset mutation.
pub type ActionHandler = Box<dyn Fn(&DatasetAction) + Send + Sync>;

/// Unsubscribes an action handler when dropped or disposed.
pub struct ActionDisposer {
    dispose: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ActionDisposer {
    /// Wrap an arbitrary unsubscribe closure.
    pub fn new<F>(dispose: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            dispose: Mutex::new(Some(Box::new(dispose))),
        }
    }

    /// Unsubscribe by dropping a signal connection guard.
    pub fn from_guard(guard: ConnectionGuard<DatasetAction>) -> Self {
        Self::new(move || drop(guard))
    }

    /// Unsubscribe now. Later calls do nothing.
    pub fn dispose(&self) {
        let dispose = self.dispose.lock().take();
        if let Some(dispose) = dispose {
            dispose();
        }
    }
}

impl Drop for ActionDisposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ActionDisposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDisposer")
            .field("active", &self.dispose.lock().is_some())
            .finish()
    }
}

/// Read access, selection and change notification for a case table.
pub trait Dataset: Send + Sync {
    /// Stable identifier of the dataset.
    fn id(&self) -> String;

    /// Attributes in column order.
    fn attributes(&self) -> Vec<Attribute>;

    /// Look up an attribute.
    fn attr_from_id(&self, attribute_id: &str) -> Option<Attribute>;

    /// Case ids in table order.
    fn cases(&self) -> Vec<String>;

    /// All values of one case.
    fn get_case(&self, case_id: &str) -> Option<CaseValues>;

    /// Raw value of a cell.
    fn get_value(&self, case_id: &str, attribute_id: &str) -> Option<CaseValue>;

    /// Numeric value of a cell, if it has one.
    fn get_numeric(&self, case_id: &str, attribute_id: &str) -> Option<f64> {
        self.get_value(case_id, attribute_id)
            .and_then(|v| v.as_number())
    }

    /// String value of a cell; empty if missing.
    fn get_str_value(&self, case_id: &str, attribute_id: &str) -> String {
        self.get_value(case_id, attribute_id)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    /// Finite numeric values of an attribute across all cases.
    fn numeric_values(&self, attribute_id: &str) -> Vec<f64> {
        self.cases()
            .iter()
            .filter_map(|id| self.get_numeric(id, attribute_id))
            .filter(|n| n.is_finite())
            .collect()
    }

    /// Add cases to the selection.
    fn select_cases(&self, case_ids: &[String]);

    /// Replace the selection.
    fn set_selected_cases(&self, case_ids: &[String]);

    /// Whether a case is selected.
    fn is_case_selected(&self, case_id: &str) -> bool;

    /// Selected case ids in selection order.
    fn case_selection(&self) -> Vec<String>;

    /// Mark attributes as selected (e.g. highlighted in a table).
    fn set_selected_attributes(&self, attribute_ids: &[String]);

    /// Subscribe to mutation notifications.
    fn on_action(&self, handler: ActionHandler) -> ActionDisposer;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_case_value_emptiness() {
        assert!(CaseValue::Number(f64::NAN).is_empty());
        assert!(!CaseValue::Number(0.0).is_empty());
        assert!(CaseValue::from("").is_empty());
        assert_eq!(CaseValue::from(" 2.5 ").as_number(), Some(2.5));
        assert_eq!(CaseValue::from("abc").as_number(), None);
    }

    #[test]
    fn test_case_values_json_shape() {
        let case = CaseValues::new("c1").with("a", 1.0).with("b", "x");
        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(json, serde_json::json!({"__id__": "c1", "a": 1.0, "b": "x"}));
        let back: CaseValues = serde_json::from_value(json).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn test_disposer_runs_once() {
        let disposed = Arc::new(AtomicBool::new(false));
        let flag = disposed.clone();
        let disposer = ActionDisposer::new(move || {
            assert!(!flag.swap(true, Ordering::SeqCst));
        });
        disposer.dispose();
        drop(disposer);
        assert!(disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_action_names() {
        assert_eq!(DatasetAction::RemoveAttribute("a".into()).name(), "removeAttribute");
        assert_eq!(
            DatasetAction::SetCaseValues { cases: vec![], attribute_ids: None }.name(),
            "setCaseValues"
        );
    }
}
