// src/action/inputs.rs

use std::collections::BTreeMap;

use crate::action::{ActionId, ActionValue};

/// Results of an action's *direct* dependencies, keyed by dependency id.
///
/// Dependencies that were Skipped (only possible in lenient mode) are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionInputs {
    values: BTreeMap<ActionId, ActionValue>,
}

impl ActionInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ActionId, value: ActionValue) {
        self.values.insert(id, value);
    }

    pub fn get(&self, id: &str) -> Option<&ActionValue> {
        self.values.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ActionId> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActionId, &ActionValue)> {
        self.values.iter()
    }

    /// All inputs as one JSON object keyed by dependency id.
    pub fn to_json(&self) -> ActionValue {
        let map = self
            .values
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect::<serde_json::Map<_, _>>();
        ActionValue::Object(map)
    }
}

impl FromIterator<(ActionId, ActionValue)> for ActionInputs {
    fn from_iter<I: IntoIterator<Item = (ActionId, ActionValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ActionInputs {
    type Item = (ActionId, ActionValue);
    type IntoIter = std::collections::btree_map::IntoIter<ActionId, ActionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
