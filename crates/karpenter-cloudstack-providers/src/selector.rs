//! Selector term resolution shared by every resource kind
//!
//! Terms are ORed. Within a term the ID is tried first, then the name, then
//! the tags (all keys must be present, `"*"` matches any value). A template
//! term's OS type narrows the candidates before tag matching. The union is
//! deduplicated by ID in first-seen order and then filtered for readiness.

use crate::error::{ProviderError, Result};
use karpenter_cloudstack_api::SelectorFields;
use std::collections::{BTreeMap, HashSet};

/// Value matching any tag value
pub const TAG_WILDCARD: &str = "*";

pub(crate) static NO_TAGS: BTreeMap<String, String> = BTreeMap::new();

/// A resource that selector terms can pick
pub trait Selectable: Clone {
    /// Singular resource kind used in error messages
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn tags(&self) -> &BTreeMap<String, String>;

    /// Whether the resource matches an OS type ID or name
    fn matches_os_type(&self, _os_type: &str) -> bool {
        false
    }

    /// Whether the resource can be used for launching
    fn is_usable(&self) -> bool {
        true
    }
}

/// Every key of `selector` is present in `tags` with an equal value, or any
/// non-empty value for the wildcard
pub fn matches_tags(tags: &BTreeMap<String, String>, selector: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(key, want)| {
        tags.get(key)
            .is_some_and(|have| (want == TAG_WILDCARD && !have.is_empty()) || have == want)
    })
}

/// Candidates picked by `terms`, before deduplication and readiness filtering
pub fn select<R, T>(candidates: &[R], terms: &[T]) -> Vec<R>
where
    R: Selectable,
    T: SelectorFields,
{
    let mut selected = Vec::new();

    for term in terms {
        if let Some(id) = term.id() {
            if let Some(found) = candidates.iter().find(|c| c.id() == id) {
                selected.push(found.clone());
                continue;
            }
        }

        if let Some(name) = term.name() {
            if let Some(found) = candidates.iter().find(|c| c.name() == name) {
                selected.push(found.clone());
                continue;
            }
        }

        let os_type = term.os_type();
        let pool = candidates
            .iter()
            .filter(|c| os_type.is_none_or(|os| c.matches_os_type(os)));

        if !term.tags().is_empty() {
            selected.extend(pool.filter(|c| matches_tags(c.tags(), term.tags())).cloned());
        } else if os_type.is_some() {
            selected.extend(pool.cloned());
        }
    }

    selected
}

/// Keep the first occurrence of every ID
pub fn dedup_by_id<R: Selectable>(resources: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::new();
    resources
        .into_iter()
        .filter(|r| seen.insert(r.id().to_string()))
        .collect()
}

/// Resolve `terms` against `candidates` in `zone`
///
/// Fails with [`ProviderError::NoSelectorMatch`] when no usable resource is
/// left.
pub fn resolve<R, T>(candidates: &[R], terms: &[T], zone: &str) -> Result<Vec<R>>
where
    R: Selectable,
    T: SelectorFields,
{
    let resolved: Vec<R> = dedup_by_id(select(candidates, terms))
        .into_iter()
        .filter(|r| r.is_usable())
        .collect();

    if resolved.is_empty() {
        return Err(ProviderError::NoSelectorMatch {
            kind: R::KIND,
            zone: zone.to_string(),
        });
    }

    tracing::debug!(
        "Resolved {} {}(s) in zone {} from {} term(s)",
        resolved.len(),
        R::KIND,
        zone,
        terms.len()
    );
    Ok(resolved)
}
