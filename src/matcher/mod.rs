/// Pattern matching over chapters collected from many files
///
/// Stages run strictly forward: filter, duration clustering, duplicate-episode
/// split, contiguity split, then the minimum-occurrence threshold.

pub mod cluster;
pub mod filter;
pub mod split;

pub use cluster::{cluster_by_duration, Tolerance};
pub use filter::{filter_chapters, matches_chapter_name, CHAPTER_NAME_KEYWORDS};
pub use split::{split_by_contiguity, split_duplicate_episodes};

use tracing::debug;

use crate::chapters::Chapter;
use crate::config::MatchingConfig;

/// Group filtered chapters into final clusters.
///
/// With `min_occurrences == 0` clustering is skipped and every chapter becomes
/// its own cluster.
pub fn group_chapters(chapters: Vec<Chapter>, config: &MatchingConfig) -> Vec<Vec<Chapter>> {
    if config.min_occurrences == 0 {
        return chapters.into_iter().map(|c| vec![c]).collect();
    }

    let clusters = cluster_by_duration(chapters, config.tolerance);
    debug!("Duration clustering produced {} clusters", clusters.len());

    let mut clusters: Vec<Vec<Chapter>> = clusters
        .into_iter()
        .flat_map(split_duplicate_episodes)
        .collect();
    debug!("{} clusters after duplicate-episode split", clusters.len());

    if config.episode_parsing {
        clusters = clusters.into_iter().flat_map(split_by_contiguity).collect();
        debug!("{} clusters after contiguity split", clusters.len());
    }

    clusters.retain(|c| c.len() >= config.min_occurrences);
    debug!(
        "{} clusters meet the minimum of {} occurrences",
        clusters.len(),
        config.min_occurrences
    );

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::EpisodeInfo;

    fn ep(season: u32, episode: u32, title: &str, start: f64, duration: f64) -> Chapter {
        Chapter::new(
            start,
            start + duration,
            Some(title.to_string()),
            format!("/fake/Show S{season:02}E{episode:02}.mkv"),
        )
        .unwrap()
        .with_episode(EpisodeInfo::new(season, episode))
    }

    fn config(min_occurrences: usize) -> MatchingConfig {
        MatchingConfig {
            min_occurrences,
            ..MatchingConfig::default()
        }
    }

    #[test]
    fn test_zero_min_occurrences_gives_singletons() {
        let chapters = vec![ep(1, 1, "Opening", 0.0, 90.0), ep(1, 2, "Opening", 0.0, 90.0)];
        let clusters = group_chapters(chapters, &config(0));
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_opening_and_ending_separate() {
        let mut chapters = Vec::new();
        for e in 1..=6 {
            chapters.push(ep(1, e, "Opening", 0.0, 90.0));
            chapters.push(ep(1, e, "Episode", 90.0, 1200.0 + 10.0 * e as f64));
            chapters.push(ep(1, e, "Ending", 1290.0, 91.0));
        }

        let clusters = group_chapters(chapters, &config(5));
        assert_eq!(clusters.len(), 2);
        let titles: Vec<Option<&str>> = clusters.iter().map(|c| c[0].title()).collect();
        assert_eq!(titles, vec![Some("Opening"), Some("Ending")]);
    }

    #[test]
    fn test_threshold_drops_small_clusters() {
        let chapters: Vec<Chapter> = (1..=4).map(|e| ep(1, e, "Opening", 0.0, 90.0)).collect();
        assert!(group_chapters(chapters.clone(), &config(5)).is_empty());
        assert_eq!(group_chapters(chapters, &config(4)).len(), 1);
    }

    #[test]
    fn test_contiguity_only_with_episode_parsing() {
        let chapters: Vec<Chapter> = [1, 2, 20, 21]
            .into_iter()
            .map(|e| ep(1, e, "Opening", 0.0, 90.0))
            .collect();

        assert_eq!(group_chapters(chapters.clone(), &config(2)).len(), 2);

        let no_parsing = MatchingConfig {
            episode_parsing: false,
            ..config(2)
        };
        assert_eq!(group_chapters(chapters, &no_parsing).len(), 1);
    }
}
