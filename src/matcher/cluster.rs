/// Single-linkage duration clustering
use serde::{Deserialize, Serialize};

use crate::chapters::Chapter;

/// How close two consecutive chapter durations must be to chain together
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    /// Absolute difference in seconds
    Seconds(f64),
    /// Percentage of the previous chapter's duration
    Percent(f64),
}

impl Tolerance {
    pub fn within(&self, previous: f64, current: f64) -> bool {
        let diff = (current - previous).abs();
        match *self {
            Tolerance::Seconds(seconds) => diff <= seconds,
            Tolerance::Percent(percent) => diff <= previous * percent / 100.0,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Seconds(2.0)
    }
}

/// Group already-sorted chapters into chains.
///
/// A chapter joins the open chain when `linked(last_member, chapter)` holds,
/// otherwise it starts a new chain.
pub(crate) fn chain_by<F>(chapters: Vec<Chapter>, linked: F) -> Vec<Vec<Chapter>>
where
    F: Fn(&Chapter, &Chapter) -> bool,
{
    let mut chains: Vec<Vec<Chapter>> = Vec::new();

    for chapter in chapters {
        match chains.last_mut() {
            Some(current) if current.last().is_some_and(|last| linked(last, &chapter)) => {
                current.push(chapter)
            }
            _ => chains.push(vec![chapter]),
        }
    }

    chains
}

/// Cluster chapters by duration.
///
/// Chapters are stably sorted by ascending duration and chained: each one is
/// compared with the last chapter added to the open cluster, never with the
/// cluster's first member or mean. Equal durations keep their input order.
pub fn cluster_by_duration(mut chapters: Vec<Chapter>, tolerance: Tolerance) -> Vec<Vec<Chapter>> {
    chapters.sort_by(|a, b| a.duration().total_cmp(&b.duration()));
    chain_by(chapters, |last, next| tolerance.within(last.duration(), next.duration()))
}
