use std::collections::HashMap;

use rand::Rng;

use crate::{ConfigSpace, Exclusion, HyperparameterConfiguration};

/// The filtered hyperparameter grid.
///
/// Rows keep the enumeration order of the [`ConfigSpace`] they were expanded
/// from and are indexed densely from zero, so a row index identifies the same
/// configuration across runs.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: Vec<HyperparameterConfiguration>,
    raw_len: usize,
}

impl Grid {
    pub fn generate(space: &ConfigSpace) -> Self {
        let mut removed: HashMap<Exclusion, usize> = HashMap::new();

        let rows: Vec<HyperparameterConfiguration> = space
            .expand()
            .filter(|row| match Exclusion::first_match(row) {
                Some(rule) => {
                    *removed.entry(rule).or_default() += 1;
                    false
                }
                None => true,
            })
            .collect();

        for rule in Exclusion::ALL {
            log::debug!(
                "Removed {} rows: {}",
                removed.get(&rule).copied().unwrap_or(0),
                rule
            );
        }
        log::debug!("Grid has {} of {} rows", rows.len(), space.raw_len());

        Self {
            rows,
            raw_len: space.raw_len(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows before filtering.
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    pub fn get(&self, index: usize) -> Option<&HyperparameterConfiguration> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HyperparameterConfiguration> {
        self.rows.iter()
    }

    /// Draws `count` row indices uniformly, with replacement.
    pub fn sample_rows<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<usize> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        (0..count).map(|_| rng.gen_range(0..self.rows.len())).collect()
    }
}
