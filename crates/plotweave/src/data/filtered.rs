//! Filtered case sets.
//!
//! A [`FilteredCaseSet`] caches the ids of the cases that can be plotted for
//! one series: those with a usable value for every bound attribute. The cache
//! is rebuilt lazily after [`invalidate`](FilteredCaseSet::invalidate) and is
//! otherwise kept exact by classifying each dataset mutation into added,
//! removed and changed cases.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use plotweave_core::PerfSpan;
use plotweave_core::logging::{span_names, targets};

use super::attribute::AttributeType;
use super::dataset::{Dataset, DatasetAction};

/// One attribute a case must have a usable value for.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequirement {
    /// The attribute.
    pub attribute_id: String,
    /// Its effective type. Numeric needs a finite number; anything else
    /// needs a non-empty value.
    pub attr_type: AttributeType,
}

/// A snapshot of what one series requires of a case.
///
/// Built from the bindings at the start of a filtering pass, so evaluating
/// it never touches the configuration that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFilter {
    requirements: Vec<FilterRequirement>,
    plotted: HashSet<String>,
}

impl CaseFilter {
    /// Create a filter from requirements and the full set of plotted
    /// attributes (including ones that never exclude a case).
    pub fn new(requirements: Vec<FilterRequirement>, plotted: impl IntoIterator<Item = String>) -> Self {
        Self {
            requirements,
            plotted: plotted.into_iter().collect(),
        }
    }

    /// The requirements.
    pub fn requirements(&self) -> &[FilterRequirement] {
        &self.requirements
    }

    /// Whether a case passes.
    pub fn accepts(&self, dataset: &dyn Dataset, case_id: &str) -> bool {
        self.requirements.iter().all(|req| match req.attr_type {
            AttributeType::Numeric => dataset
                .get_numeric(case_id, &req.attribute_id)
                .is_some_and(f64::is_finite),
            AttributeType::Categorical | AttributeType::Empty => dataset
                .get_value(case_id, &req.attribute_id)
                .is_some_and(|v| !v.is_empty()),
        })
    }

    /// Whether the attribute is plotted by this series.
    pub fn plots(&self, attribute_id: &str) -> bool {
        self.plotted.contains(attribute_id)
    }

    /// Whether any of the attributes is plotted by this series.
    pub fn plots_any<'a>(&self, attribute_ids: impl IntoIterator<Item = &'a String>) -> bool {
        attribute_ids.into_iter().any(|a| self.plotted.contains(a))
    }
}

/// Produces the current filter for a series index; `None` once the owner is
/// gone.
pub type FilterFn = Arc<dyn Fn(usize) -> Option<CaseFilter> + Send + Sync>;

/// The effect of one dataset mutation on a filtered set.
///
/// The three lists are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedCases {
    /// Cases that became members.
    pub added: Vec<String>,
    /// Cases that stopped being members.
    pub removed: Vec<String>,
    /// Members whose plotted values changed.
    pub changed: Vec<String>,
}

impl ChangedCases {
    /// Whether nothing was affected.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Fold another result into this one, keeping the lists disjoint.
    pub fn merge(&mut self, other: ChangedCases) {
        for id in other.added {
            if !self.added.contains(&id) {
                self.removed.retain(|r| *r != id);
                self.changed.retain(|c| *c != id);
                self.added.push(id);
            }
        }
        for id in other.removed {
            if !self.removed.contains(&id) && !self.added.contains(&id) {
                self.changed.retain(|c| *c != id);
                self.removed.push(id);
            }
        }
        for id in other.changed {
            if !self.changed.contains(&id) && !self.added.contains(&id) && !self.removed.contains(&id) {
                self.changed.push(id);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MemberSet {
    order: Vec<String>,
    index: HashSet<String>,
}

impl MemberSet {
    fn insert(&mut self, id: &str) -> bool {
        if self.index.insert(id.to_string()) {
            self.order.push(id.to_string());
            true
        } else {
            false
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.index.remove(id) {
            self.order.retain(|m| m != id);
            true
        } else {
            false
        }
    }

    /// Restore dataset order after out-of-order insertions.
    fn sort_by_source(&mut self, source_order: &[String]) {
        let position: HashMap<&str, usize> = source_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        self.order
            .sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));
    }
}

/// The cases of one series that pass its filter.
pub struct FilteredCaseSet {
    series_index: usize,
    source: Weak<dyn Dataset>,
    filter: FilterFn,
    members: RwLock<Option<MemberSet>>,
}

impl FilteredCaseSet {
    /// Create an (invalid, lazily built) set for one series.
    pub fn new(series_index: usize, source: Weak<dyn Dataset>, filter: FilterFn) -> Self {
        Self {
            series_index,
            source,
            filter,
            members: RwLock::new(None),
        }
    }

    /// The series this set belongs to.
    pub fn series_index(&self) -> usize {
        self.series_index
    }

    /// Drop the cache; the next read rebuilds it.
    pub fn invalidate(&self) {
        *self.members.write() = None;
        tracing::trace!(target: targets::FILTER, series = self.series_index, "case set invalidated");
    }

    /// Whether the cache is current.
    pub fn is_valid(&self) -> bool {
        self.members.read().is_some()
    }

    /// Member ids in dataset order.
    pub fn case_ids(&self) -> Vec<String> {
        if let Some(members) = self.members.read().as_ref() {
            return members.order.clone();
        }
        let members = self.rebuild();
        let ids = members.order.clone();
        *self.members.write() = Some(members);
        ids
    }

    /// Whether a case is a member.
    pub fn contains(&self, case_id: &str) -> bool {
        if let Some(members) = self.members.read().as_ref() {
            return members.index.contains(case_id);
        }
        self.case_ids().iter().any(|id| id == case_id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        if let Some(members) = self.members.read().as_ref() {
            return members.order.len();
        }
        self.case_ids().len()
    }

    /// Whether there are no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rebuild(&self) -> MemberSet {
        let _span = PerfSpan::new(span_names::REBUILD_CASES);
        let mut members = MemberSet::default();
        let (Some(dataset), Some(filter)) = (self.source.upgrade(), (self.filter)(self.series_index)) else {
            tracing::trace!(target: targets::FILTER, series = self.series_index, "no source; case set is empty");
            return members;
        };
        for case_id in dataset.cases() {
            if filter.accepts(dataset.as_ref(), &case_id) {
                members.insert(&case_id);
            }
        }
        tracing::trace!(
            target: targets::FILTER,
            series = self.series_index,
            members = members.order.len(),
            "case set rebuilt"
        );
        members
    }

    /// Update membership for a mutation that has already been applied to the
    /// dataset, and report its effect.
    ///
    /// An invalid set reports nothing: its next read rebuilds from scratch.
    pub fn apply(&self, action: &DatasetAction) -> ChangedCases {
        let mut result = ChangedCases::default();
        let (Some(dataset), Some(filter)) = (self.source.upgrade(), (self.filter)(self.series_index)) else {
            return result;
        };
        let mut guard = self.members.write();
        let Some(members) = guard.as_mut() else {
            return result;
        };

        match action {
            DatasetAction::AddCases(cases) => {
                for case in cases {
                    if filter.accepts(dataset.as_ref(), &case.id) && members.insert(&case.id) {
                        result.added.push(case.id.clone());
                    }
                }
                if !result.added.is_empty() {
                    members.sort_by_source(&dataset.cases());
                }
            }
            DatasetAction::RemoveCases(ids) => {
                for id in ids {
                    if members.remove(id) {
                        result.removed.push(id.clone());
                    }
                }
            }
            DatasetAction::SetCaseValues { cases, attribute_ids } => {
                let mut seen = HashSet::new();
                for case in cases {
                    // A case listed twice is classified once, from its final values.
                    if !seen.insert(case.id.as_str()) {
                        continue;
                    }
                    let was = members.index.contains(&case.id);
                    let is = filter.accepts(dataset.as_ref(), &case.id);
                    match (was, is) {
                        (false, true) => {
                            members.insert(&case.id);
                            result.added.push(case.id.clone());
                        }
                        (true, false) => {
                            members.remove(&case.id);
                            result.removed.push(case.id.clone());
                        }
                        (true, true) => {
                            let touches_plot = match attribute_ids {
                                Some(ids) => filter.plots_any(ids),
                                None => filter.plots_any(case.values.keys()),
                            };
                            if touches_plot {
                                result.changed.push(case.id.clone());
                            }
                        }
                        (false, false) => {}
                    }
                }
                if !result.added.is_empty() {
                    members.sort_by_source(&dataset.cases());
                }
            }
            DatasetAction::RemoveAttribute(attribute_id) => {
                // Every member depended on a plotted attribute. The owner
                // unbinds it next and the set is rebuilt from scratch.
                if filter.plots(attribute_id) {
                    result.removed = std::mem::take(&mut members.order);
                    members.index.clear();
                }
            }
            DatasetAction::AddAttribute(_) => {}
        }

        if !result.is_empty() {
            tracing::trace!(
                target: targets::FILTER,
                series = self.series_index,
                action = action.name(),
                added = result.added.len(),
                removed = result.removed.len(),
                changed = result.changed.len(),
                "case set updated"
            );
        }
        result
    }
}

impl std::fmt::Debug for FilteredCaseSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredCaseSet")
            .field("series_index", &self.series_index)
            .field("valid", &self.is_valid())
            .finish()
    }
}

static_assertions::assert_impl_all!(FilteredCaseSet: Send, Sync);
