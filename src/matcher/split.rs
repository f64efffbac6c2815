/// Refinement of duration clusters: duplicate-episode and contiguity splits
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::cluster::chain_by;
use crate::chapters::{Chapter, EpisodeInfo};

/// Start-time proximity for the temporal fallback split
pub const TEMPORAL_TOLERANCE_SECS: f64 = 120.0;

/// Largest episode-number step still considered contiguous within a season
pub const MAX_EPISODE_GAP: u32 = 3;

#[derive(PartialEq, Eq, Hash)]
enum IdentityKey<'a> {
    Episode(EpisodeInfo),
    File(&'a Path),
}

fn identity_key(chapter: &Chapter) -> IdentityKey<'_> {
    match chapter.episode() {
        Some(episode) => IdentityKey::Episode(episode),
        None => IdentityKey::File(chapter.source_file()),
    }
}

fn has_duplicate_identities(cluster: &[Chapter]) -> bool {
    let mut seen = HashSet::with_capacity(cluster.len());
    !cluster.iter().all(|c| seen.insert(identity_key(c)))
}

/// Group chapters by exact title, groups in first-seen order.
/// Untitled chapters share one group.
fn group_by_title(cluster: Vec<Chapter>) -> Vec<Vec<Chapter>> {
    let mut groups: Vec<Vec<Chapter>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for chapter in cluster {
        let key = chapter.title().unwrap_or_default().to_string();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(chapter);
    }

    groups
}

/// Split a cluster so that an episode (or, without episode info, a source
/// file) appears in it only once.
///
/// Clusters without repeats come back unchanged. Otherwise chapters are split
/// by title, and when every chapter shares one title, by start time using a
/// chain with [`TEMPORAL_TOLERANCE_SECS`]. The resulting sub-clusters are not
/// checked again.
pub fn split_duplicate_episodes(cluster: Vec<Chapter>) -> Vec<Vec<Chapter>> {
    if cluster.is_empty() {
        return Vec::new();
    }
    if !has_duplicate_identities(&cluster) {
        return vec![cluster];
    }

    let mut groups = group_by_title(cluster);
    if groups.len() > 1 {
        return groups;
    }

    let mut chapters = groups.pop().unwrap_or_default();
    chapters.sort_by(|a, b| a.start().total_cmp(&b.start()));
    chain_by(chapters, |last, next| {
        (next.start() - last.start()).abs() <= TEMPORAL_TOLERANCE_SECS
    })
}

/// Whether two episodes, in ascending order, belong to the same run
fn episodes_adjacent(previous: EpisodeInfo, next: EpisodeInfo) -> bool {
    if previous.season == next.season {
        next.episode.abs_diff(previous.episode) <= MAX_EPISODE_GAP
    } else {
        // Season finale followed by the next premiere
        next.season.abs_diff(previous.season) == 1
    }
}

/// Split a cluster into runs of contiguous episodes.
///
/// A cluster containing any chapter without episode info is returned as is.
pub fn split_by_contiguity(mut cluster: Vec<Chapter>) -> Vec<Vec<Chapter>> {
    if cluster.is_empty() {
        return Vec::new();
    }
    if cluster.iter().any(|c| c.episode().is_none()) {
        return vec![cluster];
    }

    cluster.sort_by_key(Chapter::episode);
    chain_by(cluster, |last, next| match (last.episode(), next.episode()) {
        (Some(previous), Some(current)) => episodes_adjacent(previous, current),
        _ => false,
    })
}
