//! In-memory index of recorded demonstrations.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::action::Demonstration;
use crate::edit_distance;

/// Demonstrations grouped by application, then by command phrase.
///
/// Each application scope keeps insertion order, so ranking ties always
/// resolve to the earliest recorded command. Persistence lives in
/// [`crate::store`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemonstrationCatalog {
    scopes: BTreeMap<String, Vec<Demonstration>>,
}

impl DemonstrationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog by adding each demonstration in order.
    pub fn from_demonstrations(demonstrations: impl IntoIterator<Item = Demonstration>) -> Self {
        let mut catalog = Self::new();
        for demonstration in demonstrations {
            catalog.add(demonstration);
        }
        catalog
    }

    /// Insert under `(app_identifier, command)`. A demonstration with the
    /// same command in the same app is replaced in place; returns whether
    /// that happened.
    pub fn add(&mut self, demonstration: Demonstration) -> bool {
        let scope = self
            .scopes
            .entry(demonstration.app_identifier.clone())
            .or_default();

        match scope.iter_mut().find(|d| d.command == demonstration.command) {
            Some(existing) => {
                info!(
                    "Replaced command {:?} for {}",
                    existing.command, demonstration.app_identifier
                );
                *existing = demonstration;
                true
            }
            None => {
                debug!(
                    "Added command {:?} for {}",
                    demonstration.command, demonstration.app_identifier
                );
                scope.push(demonstration);
                false
            }
        }
    }

    /// Closest command to `phrase` within `app_identifier`'s scope.
    ///
    /// Only ranks: the caller decides whether the distance is acceptable.
    /// The returned copy carries the distance in `match_distance`.
    pub fn find_best_match(&self, phrase: &str, app_identifier: &str) -> Option<Demonstration> {
        let scope = self.scopes.get(app_identifier)?;

        let mut best: Option<(usize, &Demonstration)> = None;
        for candidate in scope {
            let distance = edit_distance::distance(phrase, &candidate.command);
            if best.map_or(true, |(lowest, _)| distance < lowest) {
                best = Some((distance, candidate));
            }
        }

        best.map(|(distance, demonstration)| {
            debug!(
                "Best match for {:?} in {}: {:?} at distance {}",
                phrase, app_identifier, demonstration.command, distance
            );
            let mut found = demonstration.clone();
            found.match_distance = Some(distance);
            found
        })
    }

    pub fn get(&self, app_identifier: &str, command: &str) -> Option<&Demonstration> {
        self.scopes
            .get(app_identifier)?
            .iter()
            .find(|d| d.command == command)
    }

    /// Delete one demonstration. Empty scopes are dropped.
    pub fn remove(&mut self, app_identifier: &str, command: &str) -> Option<Demonstration> {
        let scope = self.scopes.get_mut(app_identifier)?;
        let index = scope.iter().position(|d| d.command == command)?;
        let removed = scope.remove(index);
        if scope.is_empty() {
            self.scopes.remove(app_identifier);
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }

    /// Total number of demonstrations across all apps.
    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Applications with at least one demonstration, sorted.
    pub fn apps(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// Demonstrations of one application, in insertion order.
    pub fn scope(&self, app_identifier: &str) -> &[Demonstration] {
        self.scopes
            .get(app_identifier)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every demonstration, grouped by app.
    pub fn iter(&self) -> impl Iterator<Item = &Demonstration> {
        self.scopes.values().flatten()
    }
}
