//! Category metadata shared between the engine and the host.
//!
//! A [`CategorySet`] is the ordered, colourable list of distinct values of one
//! categorical attribute. The order starts as first occurrence in the dataset
//! and is refined by user moves; colours come from a fixed palette unless the
//! user pinned one.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use plotweave_core::Signal;
use plotweave_core::logging::targets;

use super::dataset::Dataset;

/// Colour used for values that have no category.
pub const MISSING_COLOR: &str = "#888888";

/// Kelly's maximum-contrast palette, used for categories in order.
pub const KELLY_COLORS: [&str; 20] = [
    "#FF6800", "#A6BDD7", "#C10020", "#CEA262", "#817066", "#007D34", "#F6768E", "#00538A",
    "#FF7A5C", "#53377A", "#FF8E00", "#B32851", "#F4C800", "#7F180D", "#93AA00", "#593315",
    "#F13A13", "#232C16", "#803E75", "#FFB300",
];

/// Source of category sets, keyed by attribute id.
pub trait CaseMetadata: Send + Sync {
    /// The category set for an attribute, or `None` if the attribute is
    /// unknown or the id is empty.
    fn category_set_for(&self, attribute_id: &str) -> Option<Arc<CategorySet>>;
}

/// Ordered distinct values of one attribute, with colours.
pub struct CategorySet {
    attribute_id: String,
    source: Weak<dyn Dataset>,
    /// User-arranged order; empty until the first move.
    arranged: RwLock<Vec<String>>,
    colors: RwLock<HashMap<String, String>>,
    /// Emitted after the order or a colour changed.
    pub changed: Signal<()>,
}

impl CategorySet {
    /// Create a set over `attribute_id` of `source`.
    pub fn new(attribute_id: impl Into<String>, source: Weak<dyn Dataset>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            source,
            arranged: RwLock::new(Vec::new()),
            colors: RwLock::new(HashMap::new()),
            changed: Signal::new(),
        }
    }

    /// The attribute this set describes.
    pub fn attribute_id(&self) -> &str {
        &self.attribute_id
    }

    fn occurring_values(&self) -> Vec<String> {
        let Some(dataset) = self.source.upgrade() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for case_id in dataset.cases() {
            match dataset.get_value(&case_id, &self.attribute_id) {
                Some(value) if !value.is_empty() => {
                    let value = value.to_string();
                    if seen.insert(value.clone()) {
                        values.push(value);
                    }
                }
                _ => {}
            }
        }
        values
    }

    /// Distinct non-empty values in display order.
    ///
    /// Arranged values come first in their arranged order, then values the
    /// user never placed, in first-occurrence order.
    pub fn values(&self) -> Vec<String> {
        let occurring = self.occurring_values();
        let arranged = self.arranged.read();
        if arranged.is_empty() {
            return occurring;
        }
        let live: HashSet<&str> = occurring.iter().map(String::as_str).collect();
        let placed: HashSet<&str> = arranged.iter().map(String::as_str).collect();
        let mut values: Vec<String> = arranged
            .iter()
            .filter(|v| live.contains(v.as_str()))
            .cloned()
            .collect();
        values.extend(occurring.iter().filter(|v| !placed.contains(v.as_str())).cloned());
        values
    }

    /// Position of a value in display order.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values().iter().position(|v| v == value)
    }

    /// Move `value` so it sits just before `before`; `None` moves it last.
    /// Unknown values are ignored.
    pub fn move_value(&self, value: &str, before: Option<&str>) {
        let mut values = self.values();
        if !move_before(&mut values, value, before) {
            return;
        }
        {
            let mut arranged = self.arranged.write();
            // Values absent from the data right now keep their place at the end.
            let shown: HashSet<&str> = values.iter().map(String::as_str).collect();
            let hidden: Vec<String> = arranged
                .iter()
                .filter(|v| !shown.contains(v.as_str()))
                .cloned()
                .collect();
            values.extend(hidden);
            *arranged = values;
        }
        tracing::debug!(target: targets::DATA, attribute = %self.attribute_id, value, before, "category moved");
        self.changed.emit(());
    }

    /// The colour of a category: the pinned colour if any, else the palette
    /// colour for its position. `None` for values not in the set.
    pub fn color_for_category(&self, value: &str) -> Option<String> {
        if let Some(color) = self.colors.read().get(value) {
            return Some(color.clone());
        }
        self.index_of(value)
            .map(|i| KELLY_COLORS[i % KELLY_COLORS.len()].to_string())
    }

    /// Pin a colour for a category.
    pub fn set_color_for_category(&self, value: &str, color: impl Into<String>) {
        self.colors.write().insert(value.to_string(), color.into());
        self.changed.emit(());
    }

    /// Pin every category's current colour, so later reordering keeps them.
    pub fn store_all_current_colors(&self) {
        let current: Vec<(String, String)> = self
            .values()
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, KELLY_COLORS[i % KELLY_COLORS.len()].to_string()))
            .collect();
        let mut colors = self.colors.write();
        for (value, color) in current {
            colors.entry(value).or_insert(color);
        }
    }
}

fn move_before(values: &mut Vec<String>, value: &str, before: Option<&str>) -> bool {
    let Some(from) = values.iter().position(|v| v == value) else {
        return false;
    };
    if before == Some(value) {
        return false;
    }
    let value = values.remove(from);
    let to = before
        .and_then(|b| values.iter().position(|v| v == b))
        .unwrap_or(values.len());
    values.insert(to, value);
    true
}

impl std::fmt::Debug for CategorySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategorySet")
            .field("attribute_id", &self.attribute_id)
            .field("arranged", &self.arranged.read().len())
            .field("pinned_colors", &self.colors.read().len())
            .finish()
    }
}

/// Category metadata that builds sets lazily from a dataset.
pub struct MemoryCaseMetadata {
    dataset: Weak<dyn Dataset>,
    sets: RwLock<HashMap<String, Arc<CategorySet>>>,
}

impl MemoryCaseMetadata {
    /// Create metadata for `dataset`.
    pub fn new(dataset: Weak<dyn Dataset>) -> Self {
        Self {
            dataset,
            sets: RwLock::new(HashMap::new()),
        }
    }

    /// Convenience constructor from a concrete dataset handle.
    pub fn for_dataset<D: Dataset + 'static>(dataset: &Arc<D>) -> Self {
        let dataset: Arc<dyn Dataset> = dataset.clone();
        Self::new(Arc::downgrade(&dataset))
    }

    /// Number of sets created so far.
    pub fn set_count(&self) -> usize {
        self.sets.read().len()
    }
}

impl CaseMetadata for MemoryCaseMetadata {
    fn category_set_for(&self, attribute_id: &str) -> Option<Arc<CategorySet>> {
        if attribute_id.is_empty() {
            return None;
        }
        if let Some(set) = self.sets.read().get(attribute_id) {
            return Some(set.clone());
        }
        let dataset = self.dataset.upgrade()?;
        dataset.attr_from_id(attribute_id)?;
        let set = self
            .sets
            .write()
            .entry(attribute_id.to_string())
            .or_insert_with(|| Arc::new(CategorySet::new(attribute_id, self.dataset.clone())))
            .clone();
        Some(set)
    }
}

impl std::fmt::Debug for MemoryCaseMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCaseMetadata")
            .field("sets", &self.set_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(CategorySet: Send, Sync);
static_assertions::assert_impl_all!(MemoryCaseMetadata: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::CaseValues;
    use crate::data::memory::MemoryDataset;

    fn fruit() -> Arc<MemoryDataset> {
        let data = Arc::new(MemoryDataset::new("fruit"));
        data.add_attribute("kind", "kind", None).unwrap();
        data.add_cases(vec![
            CaseValues::new("c1").with("kind", "pear"),
            CaseValues::new("c2").with("kind", "apple"),
            CaseValues::new("c3").with("kind", "pear"),
            CaseValues::new("c4").with("kind", ""),
            CaseValues::new("c5").with("kind", "fig"),
        ])
        .unwrap();
        data
    }

    #[test]
    fn test_values_in_first_occurrence_order() {
        let data = fruit();
        let metadata = MemoryCaseMetadata::for_dataset(&data);
        let set = metadata.category_set_for("kind").unwrap();
        assert_eq!(set.values(), vec!["pear", "apple", "fig"]);
        assert!(metadata.category_set_for("").is_none());
        assert!(metadata.category_set_for("missing").is_none());
        assert!(Arc::ptr_eq(&set, &metadata.category_set_for("kind").unwrap()));
    }

    #[test]
    fn test_move_value() {
        let data = fruit();
        let metadata = MemoryCaseMetadata::for_dataset(&data);
        let set = metadata.category_set_for("kind").unwrap();

        set.move_value("fig", Some("pear"));
        assert_eq!(set.values(), vec!["fig", "pear", "apple"]);
        set.move_value("fig", None);
        assert_eq!(set.values(), vec!["pear", "apple", "fig"]);
        set.move_value("banana", Some("pear"));
        assert_eq!(set.values(), vec!["pear", "apple", "fig"]);
    }

    #[test]
    fn test_new_values_follow_the_arranged_ones() {
        let data = fruit();
        let metadata = MemoryCaseMetadata::for_dataset(&data);
        let set = metadata.category_set_for("kind").unwrap();
        set.move_value("fig", Some("pear"));
        for _ in 0..50 {
            set.move_value("apple", Some("fig"));
            set.move_value("apple", None);
        }
        assert_eq!(set.values(), vec!["fig", "pear", "apple"]);

        data.add_cases(vec![CaseValues::new("c6").with("kind", "kiwi")]).unwrap();
        assert_eq!(set.values(), vec!["fig", "pear", "apple", "kiwi"]);

        data.remove_cases(&["c5"]);
        assert_eq!(set.values(), vec!["pear", "apple", "kiwi"]);
        set.move_value("kiwi", Some("pear"));
        data.add_cases(vec![CaseValues::new("c7").with("kind", "fig")]).unwrap();
        assert_eq!(set.values(), vec!["kiwi", "pear", "apple", "fig"]);
        assert_eq!(set.index_of("apple"), Some(2));
    }

    #[test]
    fn test_colors_follow_position_until_pinned() {
        let data = fruit();
        let metadata = MemoryCaseMetadata::for_dataset(&data);
        let set = metadata.category_set_for("kind").unwrap();

        assert_eq!(set.color_for_category("pear").as_deref(), Some(KELLY_COLORS[0]));
        assert_eq!(set.color_for_category("banana"), None);

        set.store_all_current_colors();
        set.move_value("fig", Some("pear"));
        assert_eq!(set.color_for_category("pear").as_deref(), Some(KELLY_COLORS[0]));
        assert_eq!(set.color_for_category("fig").as_deref(), Some(KELLY_COLORS[2]));

        set.set_color_for_category("apple", "#123456");
        assert_eq!(set.color_for_category("apple").as_deref(), Some("#123456"));
    }

    #[test]
    fn test_changed_signal() {
        let data = fruit();
        let metadata = MemoryCaseMetadata::for_dataset(&data);
        let set = metadata.category_set_for("kind").unwrap();
        let count = Arc::new(parking_lot::Mutex::new(0));
        let count_clone = count.clone();
        set.changed.connect(move |_| *count_clone.lock() += 1);
        set.move_value("apple", None);
        set.set_color_for_category("pear", "#000000");
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_dropped_dataset_gives_empty_values() {
        let data = fruit();
        let metadata = MemoryCaseMetadata::for_dataset(&data);
        let set = metadata.category_set_for("kind").unwrap();
        drop(data);
        assert!(set.values().is_empty());
    }
}
