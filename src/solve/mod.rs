//! Dependency resolution.
//!
//! The solver turns a set of version-range requirements into a concrete
//! package set over a catalog. It deliberately does not backtrack: for
//! every name it keeps the intersection of all ranges seen so far and the
//! highest catalog version inside it. A later edge that would invalidate an
//! earlier selection is a hard failure rather than a re-selection.

use std::collections::{BTreeMap, VecDeque};

use crate::catalog::Catalog;
use crate::core::dependency::{Dependency, VersionRange};
use crate::core::package_id::PackageId;
use crate::error::{user_error, Errc, Result};
use crate::util::dym::{did_you_mean, dym_suffix};

/// One requirement on the worklist, remembering who asked for it.
struct Edge {
    dep: Dependency,
    requirer: String,
}

struct NameState {
    range: VersionRange,
    requirer: String,
    selected: PackageId,
}

/// Resolve `roots` against `catalog` into the transitive closure of
/// concrete package IDs, leaves first. Deterministic for a fixed catalog
/// and input.
pub fn solve(roots: &[Dependency], catalog: &Catalog) -> Result<Vec<PackageId>> {
    let mut states: BTreeMap<String, NameState> = BTreeMap::new();
    let mut worklist: VecDeque<Edge> = roots
        .iter()
        .map(|dep| Edge {
            dep: dep.clone(),
            requirer: "the root requirements".to_string(),
        })
        .collect();

    while let Some(Edge { dep, requirer }) = worklist.pop_front() {
        if let Some(state) = states.get_mut(&dep.name) {
            let Some(narrowed) = state.range.intersection(&dep.range) else {
                return Err(user_error(
                    Errc::DependencyResolveFailure,
                    format!(
                        "conflicting requirements for '{}': {} requires {}, {} requires {}",
                        dep.name, state.requirer, state.range, requirer, dep.range
                    ),
                ));
            };
            if !narrowed.contains(&state.selected.version) {
                // Narrowed below the prior selection. No re-selection.
                return Err(user_error(
                    Errc::DependencyResolveFailure,
                    format!(
                        "requirement {} from {} excludes the already-selected {} \
                         (selected for {})",
                        dep.range, requirer, state.selected, state.requirer
                    ),
                ));
            }
            state.range = narrowed;
            continue;
        }

        let narrowed = dep.range.clone();
        let selected = pick_highest(catalog, &dep.name, &narrowed, &requirer)?;
        tracing::debug!("selected {} (required by {})", selected, requirer);

        for child in catalog.dependencies_of(&selected)? {
            worklist.push_back(Edge {
                dep: child,
                requirer: selected.to_string(),
            });
        }

        states.insert(
            dep.name.clone(),
            NameState {
                range: narrowed,
                requirer,
                selected,
            },
        );
    }

    topological_order(catalog, states)
}

/// The highest catalog version of `name` inside `range`.
fn pick_highest(
    catalog: &Catalog,
    name: &str,
    range: &VersionRange,
    requirer: &str,
) -> Result<PackageId> {
    let candidates = catalog.by_name(name)?;
    if candidates.is_empty() {
        let names: std::collections::BTreeSet<String> = catalog
            .all()?
            .into_iter()
            .map(|id| id.name)
            .collect();
        let dym = did_you_mean(name, names.iter().map(String::as_str));
        return Err(user_error(
            Errc::NoSuchCatalogPackage,
            format!(
                "no package '{}' in the catalog (required by {}){}",
                name,
                requirer,
                dym_suffix(&dym)
            ),
        ));
    }

    candidates
        .into_iter()
        .filter(|id| range.contains(&id.version))
        .max()
        .ok_or_else(|| {
            user_error(
                Errc::NoSuchCatalogPackage,
                format!(
                    "no version of '{}' in the catalog satisfies {} (required by {})",
                    name, range, requirer
                ),
            )
        })
}

/// Order the selected set leaves-first. Ties are broken by package ID, so
/// the output is stable for a fixed input.
fn topological_order(
    catalog: &Catalog,
    states: BTreeMap<String, NameState>,
) -> Result<Vec<PackageId>> {
    let mut remaining: BTreeMap<String, PackageId> = states
        .into_iter()
        .map(|(name, state)| (name, state.selected))
        .collect();

    let mut deps_of: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, id) in &remaining {
        let dep_names = catalog
            .dependencies_of(id)?
            .into_iter()
            .map(|d| d.name)
            .filter(|n| remaining.contains_key(n))
            .collect();
        deps_of.insert(name.clone(), dep_names);
    }

    let mut out = Vec::with_capacity(remaining.len());
    let mut emitted: std::collections::BTreeSet<String> = Default::default();

    while !remaining.is_empty() {
        let ready: Vec<String> = remaining
            .keys()
            .filter(|name| deps_of[*name].iter().all(|d| emitted.contains(d)))
            .cloned()
            .collect();

        // A dependency cycle in the catalog would stall the sort; emit the
        // smallest remaining name to keep making progress.
        let batch = if ready.is_empty() {
            vec![remaining.keys().next().expect("non-empty").clone()]
        } else {
            ready
        };

        for name in batch {
            let id = remaining.remove(&name).expect("still remaining");
            emitted.insert(name);
            out.push(id);
        }
    }

    Ok(out)
}
