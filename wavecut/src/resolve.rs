// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Name Resolution
//! Turns user supplied instance names and gating signal fragments into names that exist in the
//! trace. When a name is not exact and several candidates fit, a [`Resolver`] picks.

use crate::hierarchy::Hierarchy;
use crate::signals::SignalStore;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("[resolve] no instance matches `{0}`")]
    UnknownInstance(String),
    #[error("[resolve] `{query}` is ambiguous, candidates are: {candidates:?}")]
    AmbiguousSignalMatch {
        query: String,
        candidates: Vec<String>,
    },
    #[error("[resolve] no signal contains `{0}`")]
    NoSignalMatch(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Answer of a [`Resolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Take every candidate.
    All,
    /// Take the candidates at these (zero based) positions.
    Indices(Vec<usize>),
    /// Take none. The name stays unresolved.
    Reject,
}

/// Chooses among candidates for a name that did not match exactly.
pub trait Resolver {
    fn resolve(&mut self, query: &str, candidates: &[String]) -> Selection;
}

impl<F> Resolver for F
where
    F: FnMut(&str, &[String]) -> Selection,
{
    fn resolve(&mut self, query: &str, candidates: &[String]) -> Selection {
        self(query, candidates)
    }
}

/// Accepts every candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectAll;

impl Resolver for SelectAll {
    fn resolve(&mut self, _query: &str, _candidates: &[String]) -> Selection {
        Selection::All
    }
}

/// Refuses to guess. Ambiguous names turn into errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct Strict;

impl Resolver for Strict {
    fn resolve(&mut self, _query: &str, _candidates: &[String]) -> Selection {
        Selection::Reject
    }
}

fn apply(
    resolver: &mut dyn Resolver,
    query: &str,
    candidates: Vec<String>,
    out: &mut Vec<String>,
) -> Result<()> {
    match resolver.resolve(query, &candidates) {
        Selection::All => out.extend(candidates),
        Selection::Indices(indices) => {
            for index in indices {
                match candidates.get(index) {
                    Some(c) => out.push(c.clone()),
                    None => warn!(query, index, "ignoring out of range selection"),
                }
            }
        }
        Selection::Reject => {
            return Err(ResolveError::AmbiguousSignalMatch {
                query: query.to_string(),
                candidates,
            })
        }
    }
    Ok(())
}

/// Validates instance names against the instances of `hierarchy`.
///
/// A name equal to an existing instance path is taken as is. Otherwise every instance path
/// that contains the name is a candidate for the `resolver`.
pub fn resolve_instances(
    hierarchy: &Hierarchy,
    queries: &[String],
    resolver: &mut dyn Resolver,
) -> Result<Vec<String>> {
    let available = hierarchy.instances();
    let mut out = Vec::new();
    for query in queries {
        if available.contains(query) {
            out.push(query.clone());
            continue;
        }
        let candidates: Vec<String> = available
            .iter()
            .filter(|a| a.contains(query.as_str()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(ResolveError::UnknownInstance(query.clone()));
        }
        debug!(query = query.as_str(), candidates = candidates.len(), "instance is not exact");
        apply(resolver, query, candidates, &mut out)?;
    }
    if out.is_empty() && !queries.is_empty() {
        return Err(ResolveError::UnknownInstance(queries.join(" ")));
    }
    Ok(dedup_in_order(out))
}

/// Drops repeated names, keeping the first occurrence of each.
fn dedup_in_order(names: Vec<String>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    names
        .into_iter()
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// Finds the gating signals named by `fragments`.
///
/// A fragment equal to a full signal name, or contained in exactly one, selects that signal.
/// Several containing signals are handed to the `resolver`.
pub fn resolve_gating_signals(
    store: &SignalStore,
    fragments: &[String],
    resolver: &mut dyn Resolver,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for fragment in fragments {
        if store.lookup(fragment).is_some() {
            out.push(fragment.clone());
            continue;
        }
        let mut candidates: Vec<String> = store
            .matching(fragment)
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        match candidates.len() {
            0 => return Err(ResolveError::NoSignalMatch(fragment.clone())),
            1 => out.append(&mut candidates),
            _ => apply(resolver, fragment, candidates, &mut out)?,
        }
    }
    Ok(out)
}
