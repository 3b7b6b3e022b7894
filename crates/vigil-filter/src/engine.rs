//! The filter predicate engine.
//!
//! [`FilterEngine`] evaluates filter specifications against an
//! [`IncidentStore`]. Each constraint dimension is queried independently over
//! the full incident universe and the partial results are intersected:
//!
//! ```text
//!   by source ∩ by tags ∩ by tri-states ∩ by maxlevel
//! ```
//!
//! Several filters are combined with union. The empty specification
//! short-circuits to the empty set without touching the store.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use vigil_incident::{Incident, IncidentSet, IncidentStore};

use crate::error::Result;
use crate::types::{CompiledFilter, FilterSpecification};

/// Evaluator for filter specifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine;

impl FilterEngine {
    /// Returns the incidents in `store` selected by `spec` at `now`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the specification is malformed.
    pub fn matching<S>(spec: &FilterSpecification, store: &S, now: DateTime<Utc>) -> Result<IncidentSet>
    where
        S: IncidentStore + ?Sized,
    {
        let compiled = spec.compile()?;
        Ok(Self::matching_compiled(&compiled, store, now))
    }

    /// Returns the incidents selected by an already compiled filter.
    pub fn matching_compiled<S>(filter: &CompiledFilter, store: &S, now: DateTime<Utc>) -> IncidentSet
    where
        S: IncidentStore + ?Sized,
    {
        if filter.empty {
            debug!("empty filter selects no incidents");
            return IncidentSet::none();
        }

        let by_source = if filter.sources.is_empty() {
            store.universe()
        } else {
            let sources: Vec<_> = filter.sources.iter().copied().collect();
            store.with_sources(&sources)
        };

        let by_tags = if filter.tag_groups.is_empty() {
            store.universe()
        } else {
            store.with_tag_groups(&filter.tag_groups)
        };

        let by_states = filter
            .tristates
            .iter()
            .fold(store.universe(), |acc, (predicate, expected)| {
                acc.intersection(&store.with_state(*predicate, *expected, now))
            });

        let by_level = filter
            .maxlevel
            .map_or_else(|| store.universe(), |max| store.with_max_level(max));

        let result = by_source
            .intersection(&by_tags)
            .intersection(&by_states)
            .intersection(&by_level);

        trace!(
            by_source = by_source.len(),
            by_tags = by_tags.len(),
            by_states = by_states.len(),
            by_level = by_level.len(),
            matched = result.len(),
            "filter evaluated"
        );
        result
    }

    /// Returns the union of the incidents selected by each specification.
    ///
    /// No specifications select no incidents.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn matching_any<'a, I, S>(specs: I, store: &S, now: DateTime<Utc>) -> Result<IncidentSet>
    where
        I: IntoIterator<Item = &'a FilterSpecification>,
        S: IncidentStore + ?Sized,
    {
        specs.into_iter().try_fold(IncidentSet::none(), |acc, spec| {
            Ok(acc.union(&Self::matching(spec, store, now)?))
        })
    }

    /// Returns true if a single incident is selected by `spec` at `now`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the specification is malformed.
    pub fn matches(spec: &FilterSpecification, incident: &Incident, now: DateTime<Utc>) -> Result<bool> {
        Ok(spec.compile()?.matches(incident, now))
    }
}
