//! Batch expansion of node name and address patterns.
//!
//! A placeholder `{n}` or `{start-end}` in the name (or, failing that, the
//! address) defines an index range. Every placeholder in both strings is
//! replaced by each index in turn, so `Sensor{1-3}` with `ns=2;s=S{1-3}`
//! yields three nodes.

use super::{NodeDomainError, NodeSpec};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Largest number of nodes a single pattern may expand to.
pub const MAX_BATCH_NODES: u64 = 100;

#[expect(clippy::expect_used, reason = "the pattern is a compile-time constant")]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+)(?:-(\d+))?\}").expect("placeholder pattern compiles"));

/// Expands a name/address pair into one pair per placeholder index.
///
/// Strings without placeholders are returned unchanged as a single pair.
///
/// # Errors
///
/// Returns [`NodeDomainError::InvalidPattern`] for an inverted or unparseable
/// range and [`NodeDomainError::PatternTooLarge`] when the range exceeds
/// [`MAX_BATCH_NODES`].
pub fn expand_pattern(name: &str, address: &str) -> Result<Vec<(String, String)>, NodeDomainError> {
    let Some(captures) = PLACEHOLDER
        .captures(name)
        .or_else(|| PLACEHOLDER.captures(address))
    else {
        return Ok(vec![(name.to_owned(), address.to_owned())]);
    };

    let (start, end) = range_of(&captures)?;
    let count = end - start + 1;
    if count > MAX_BATCH_NODES {
        return Err(NodeDomainError::PatternTooLarge {
            count,
            limit: MAX_BATCH_NODES,
        });
    }

    Ok((start..=end)
        .map(|index| {
            let text = index.to_string();
            (
                PLACEHOLDER.replace_all(name, text.as_str()).into_owned(),
                PLACEHOLDER.replace_all(address, text.as_str()).into_owned(),
            )
        })
        .collect())
}

/// Expands a node input into one input per placeholder index.
///
/// # Errors
///
/// See [`expand_pattern`].
pub fn expand_spec(spec: &NodeSpec) -> Result<Vec<NodeSpec>, NodeDomainError> {
    Ok(expand_pattern(&spec.name, &spec.node_id)?
        .into_iter()
        .map(|(name, node_id)| NodeSpec {
            name,
            node_id,
            ..spec.clone()
        })
        .collect())
}

fn range_of(captures: &Captures<'_>) -> Result<(u64, u64), NodeDomainError> {
    let whole = captures.get(0).map_or("", |matched| matched.as_str());
    let invalid = || NodeDomainError::InvalidPattern(whole.to_owned());

    let start = captures
        .get(1)
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .ok_or_else(invalid)?;
    let end = captures.get(2).map_or(Ok(start), |digits| {
        digits.as_str().parse::<u64>().map_err(|_| invalid())
    })?;
    if end < start || end == u64::MAX {
        return Err(invalid());
    }
    Ok((start, end))
}
