//! In-memory dataset.
//!
//! A small, complete [`Dataset`] implementation for tests, demos and hosts
//! that do not bring their own storage. Mutations are applied under a lock,
//! the lock is released, and only then is the action broadcast, so handlers
//! may read the dataset freely.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;
use plotweave_core::Signal;
use plotweave_core::logging::targets;

use super::attribute::AttributeType;
use super::dataset::{
    ActionDisposer, ActionHandler, Attribute, CaseValue, CaseValues, Dataset, DatasetAction,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct AttributeEntry {
    id: String,
    name: String,
    declared: Option<AttributeType>,
}

#[derive(Debug, Default)]
struct DatasetState {
    attributes: Vec<AttributeEntry>,
    case_order: Vec<String>,
    values: HashMap<String, BTreeMap<String, CaseValue>>,
    selection: Vec<String>,
    selected_set: HashSet<String>,
    selected_attributes: Vec<String>,
}

impl DatasetState {
    fn attribute_index(&self, id: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.id == id)
    }

    /// Numeric if every non-empty value parses as a finite number and there
    /// is at least one; categorical otherwise.
    fn inferred_type(&self, attribute_id: &str) -> AttributeType {
        let mut saw_value = false;
        for case_id in &self.case_order {
            let value = self.values.get(case_id).and_then(|v| v.get(attribute_id));
            match value {
                Some(v) if !v.is_empty() => {
                    saw_value = true;
                    if !v.as_number().is_some_and(f64::is_finite) {
                        return AttributeType::Categorical;
                    }
                }
                _ => {}
            }
        }
        if saw_value {
            AttributeType::Numeric
        } else {
            AttributeType::Categorical
        }
    }

    fn describe(&self, entry: &AttributeEntry) -> Attribute {
        Attribute {
            id: entry.id.clone(),
            name: entry.name.clone(),
            attr_type: entry
                .declared
                .unwrap_or_else(|| self.inferred_type(&entry.id)),
        }
    }
}

/// A dataset held entirely in memory.
pub struct MemoryDataset {
    id: String,
    state: RwLock<DatasetState>,
    actions: Signal<DatasetAction>,
}

impl MemoryDataset {
    /// Create an empty dataset.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(DatasetState::default()),
            actions: Signal::new(),
        }
    }

    /// Add an attribute. `declared` fixes its type; `None` infers it from
    /// the values.
    pub fn add_attribute(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        declared: Option<AttributeType>,
    ) -> Result<()> {
        let id = id.into();
        {
            let mut state = self.state.write();
            if state.attribute_index(&id).is_some() {
                return Err(Error::DuplicateAttribute(id));
            }
            state.attributes.push(AttributeEntry {
                id: id.clone(),
                name: name.into(),
                declared,
            });
        }
        self.broadcast(DatasetAction::AddAttribute(id));
        Ok(())
    }

    /// Remove an attribute and every value stored for it.
    pub fn remove_attribute(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            let index = state
                .attribute_index(id)
                .ok_or_else(|| Error::UnknownAttribute(id.to_string()))?;
            state.attributes.remove(index);
            for values in state.values.values_mut() {
                values.remove(id);
            }
            state.selected_attributes.retain(|a| a != id);
        }
        self.broadcast(DatasetAction::RemoveAttribute(id.to_string()));
        Ok(())
    }

    /// Append cases. Values for unknown attributes are rejected.
    pub fn add_cases(&self, cases: Vec<CaseValues>) -> Result<()> {
        {
            let mut state = self.state.write();
            let mut seen = HashSet::new();
            for case in &cases {
                if state.values.contains_key(&case.id) || !seen.insert(case.id.as_str()) {
                    return Err(Error::DuplicateCase(case.id.clone()));
                }
                if let Some(attr) = case.values.keys().find(|a| state.attribute_index(a).is_none()) {
                    return Err(Error::UnknownAttribute(attr.clone()));
                }
            }
            for case in &cases {
                state.case_order.push(case.id.clone());
                state.values.insert(case.id.clone(), case.values.clone());
            }
        }
        self.broadcast(DatasetAction::AddCases(cases));
        Ok(())
    }

    /// Delete cases. Unknown ids are ignored.
    pub fn remove_cases(&self, case_ids: &[&str]) {
        let removed: Vec<String> = {
            let mut state = self.state.write();
            let removed: Vec<String> = case_ids
                .iter()
                .filter(|id| state.values.remove(**id).is_some())
                .map(|id| id.to_string())
                .collect();
            let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();
            state.case_order.retain(|id| !gone.contains(id.as_str()));
            state.selection.retain(|id| !gone.contains(id.as_str()));
            state.selected_set.retain(|id| !gone.contains(id.as_str()));
            removed
        };
        if !removed.is_empty() {
            self.broadcast(DatasetAction::RemoveCases(removed));
        }
    }

    /// Merge new values into existing cases.
    ///
    /// The broadcast action carries the full post-change values of each case.
    pub fn set_case_values(&self, changes: Vec<CaseValues>) -> Result<()> {
        let (cases, attribute_ids) = {
            let mut state = self.state.write();
            for change in &changes {
                if !state.values.contains_key(&change.id) {
                    return Err(Error::UnknownCase(change.id.clone()));
                }
                if let Some(attr) = change.values.keys().find(|a| state.attribute_index(a).is_none()) {
                    return Err(Error::UnknownAttribute(attr.clone()));
                }
            }
            let mut attribute_ids: Vec<String> = Vec::new();
            let mut cases = Vec::with_capacity(changes.len());
            for change in changes {
                for attr in change.values.keys() {
                    if !attribute_ids.contains(attr) {
                        attribute_ids.push(attr.clone());
                    }
                }
                if let Some(values) = state.values.get_mut(&change.id) {
                    values.extend(change.values);
                    cases.push(CaseValues {
                        id: change.id,
                        values: values.clone(),
                    });
                }
            }
            (cases, attribute_ids)
        };
        self.broadcast(DatasetAction::SetCaseValues {
            cases,
            attribute_ids: Some(attribute_ids),
        });
        Ok(())
    }

    /// Attributes most recently marked as selected.
    pub fn selected_attributes(&self) -> Vec<String> {
        self.state.read().selected_attributes.clone()
    }

    /// Number of action subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.actions.connection_count()
    }

    fn broadcast(&self, action: DatasetAction) {
        tracing::debug!(target: targets::DATA, dataset = %self.id, action = action.name(), "dataset action");
        self.actions.emit(action);
    }
}

impl Dataset for MemoryDataset {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn attributes(&self) -> Vec<Attribute> {
        let state = self.state.read();
        state.attributes.iter().map(|a| state.describe(a)).collect()
    }

    fn attr_from_id(&self, attribute_id: &str) -> Option<Attribute> {
        let state = self.state.read();
        let index = state.attribute_index(attribute_id)?;
        Some(state.describe(&state.attributes[index]))
    }

    fn cases(&self) -> Vec<String> {
        self.state.read().case_order.clone()
    }

    fn get_case(&self, case_id: &str) -> Option<CaseValues> {
        self.state.read().values.get(case_id).map(|values| CaseValues {
            id: case_id.to_string(),
            values: values.clone(),
        })
    }

    fn get_value(&self, case_id: &str, attribute_id: &str) -> Option<CaseValue> {
        self.state
            .read()
            .values
            .get(case_id)
            .and_then(|v| v.get(attribute_id))
            .cloned()
    }

    fn select_cases(&self, case_ids: &[String]) {
        let mut state = self.state.write();
        for id in case_ids {
            if state.values.contains_key(id) && state.selected_set.insert(id.clone()) {
                state.selection.push(id.clone());
            }
        }
    }

    fn set_selected_cases(&self, case_ids: &[String]) {
        {
            let mut state = self.state.write();
            state.selection.clear();
            state.selected_set.clear();
        }
        self.select_cases(case_ids);
    }

    fn is_case_selected(&self, case_id: &str) -> bool {
        self.state.read().selected_set.contains(case_id)
    }

    fn case_selection(&self) -> Vec<String> {
        self.state.read().selection.clone()
    }

    fn set_selected_attributes(&self, attribute_ids: &[String]) {
        self.state.write().selected_attributes = attribute_ids.to_vec();
    }

    fn on_action(&self, handler: ActionHandler) -> ActionDisposer {
        ActionDisposer::from_guard(self.actions.connect_scoped(move |action| handler(action)))
    }
}

impl std::fmt::Debug for MemoryDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryDataset")
            .field("id", &self.id)
            .field("attributes", &state.attributes.len())
            .field("cases", &state.case_order.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(MemoryDataset: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn sample() -> MemoryDataset {
        let data = MemoryDataset::new("data");
        data.add_attribute("n", "name", None).unwrap();
        data.add_attribute("a", "a", None).unwrap();
        data.add_cases(vec![
            CaseValues::new("c1").with("n", "one").with("a", 1.0),
            CaseValues::new("c2").with("n", "two").with("a", "2"),
        ])
        .unwrap();
        data
    }

    #[test]
    fn test_type_inference() {
        let data = sample();
        assert_eq!(data.attr_from_id("a").unwrap().attr_type, AttributeType::Numeric);
        assert_eq!(data.attr_from_id("n").unwrap().attr_type, AttributeType::Categorical);

        data.set_case_values(vec![CaseValues::new("c2").with("a", "n/a")]).unwrap();
        assert_eq!(data.attr_from_id("a").unwrap().attr_type, AttributeType::Categorical);
    }

    #[test]
    fn test_declared_type_wins() {
        let data = sample();
        data.add_attribute("d", "d", Some(AttributeType::Categorical)).unwrap();
        data.set_case_values(vec![CaseValues::new("c1").with("d", 3.0)]).unwrap();
        assert_eq!(data.attr_from_id("d").unwrap().attr_type, AttributeType::Categorical);
    }

    #[test]
    fn test_mutation_errors() {
        let data = sample();
        assert!(matches!(
            data.add_attribute("a", "again", None),
            Err(Error::DuplicateAttribute(_))
        ));
        assert!(matches!(
            data.add_cases(vec![CaseValues::new("c1")]),
            Err(Error::DuplicateCase(_))
        ));
        assert!(matches!(
            data.set_case_values(vec![CaseValues::new("zz").with("a", 1.0)]),
            Err(Error::UnknownCase(_))
        ));
        assert!(matches!(
            data.set_case_values(vec![CaseValues::new("c1").with("zz", 1.0)]),
            Err(Error::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_actions_are_broadcast_after_mutation() {
        let data = Arc::new(sample());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let data_clone = data.clone();
        let seen_clone = seen.clone();
        let disposer = data.on_action(Box::new(move |action| {
            // Reading inside the handler must observe the new state.
            seen_clone
                .lock()
                .push((action.name(), data_clone.cases().len()));
        }));

        data.add_cases(vec![CaseValues::new("c3").with("a", 3.0)]).unwrap();
        data.remove_cases(&["c1", "missing"]);
        data.remove_attribute("n").unwrap();

        assert_eq!(
            *seen.lock(),
            vec![("addCases", 3), ("removeCases", 2), ("removeAttribute", 2)]
        );
        assert_eq!(data.get_value("c2", "n"), None);

        disposer.dispose();
        assert_eq!(data.subscriber_count(), 0);
    }

    #[test]
    fn test_selection() {
        let data = sample();
        data.set_selected_cases(&["c2".to_string(), "nope".to_string()]);
        data.select_cases(&["c1".to_string(), "c2".to_string()]);
        assert_eq!(data.case_selection(), vec!["c2".to_string(), "c1".to_string()]);
        data.remove_cases(&["c2"]);
        assert!(!data.is_case_selected("c2"));
        assert!(data.is_case_selected("c1"));
    }

    #[test]
    fn test_set_case_values_reports_full_case() {
        let data = sample();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let _disposer = data.on_action(Box::new(move |action| {
            *seen_clone.lock() = Some(action.clone());
        }));
        data.set_case_values(vec![CaseValues::new("c1").with("a", 5.0)]).unwrap();
        let expected = DatasetAction::SetCaseValues {
            cases: vec![CaseValues::new("c1").with("n", "one").with("a", 5.0)],
            attribute_ids: Some(vec!["a".to_string()]),
        };
        assert_eq!(seen.lock().clone(), Some(expected));
    }
}
