/// Duration-window and chapter-name filtering
use once_cell::sync::Lazy;
use regex::Regex;

use crate::chapters::Chapter;

/// Title keywords that mark a chapter as a recurring segment
pub const CHAPTER_NAME_KEYWORDS: &[&str] = &[
    "opening", "intro", "op",
    "ending", "outro", "ed",
    "credits", "preview", "recap",
    "prologue", "epilogue",
];

// A keyword must start at a word boundary: "OP1" matches, "STOP" does not.
static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = CHAPTER_NAME_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})", alternatives)).unwrap()
});

/// Check if a title matches any chapter name keyword
pub fn matches_chapter_name(title: &str) -> bool {
    KEYWORD_RE.is_match(title)
}

/// Filter chapters by duration range and/or chapter names, preserving order.
///
/// Both filters are combined with AND. Untitled chapters never pass the name filter.
pub fn filter_chapters(
    chapters: Vec<Chapter>,
    duration_range: Option<(f64, f64)>,
    chapter_names: bool,
) -> Vec<Chapter> {
    chapters
        .into_iter()
        .filter(|c| match duration_range {
            Some((min, max)) => min <= c.duration() && c.duration() <= max,
            None => true,
        })
        .filter(|c| !chapter_names || c.title().is_some_and(matches_chapter_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::EpisodeInfo;

    fn ch(duration: f64, title: Option<&str>) -> Chapter {
        Chapter::new(0.0, duration, title.map(String::from), "/fake/Show S01E01.mkv")
            .unwrap()
            .with_episode(EpisodeInfo::new(1, 1))
    }

    fn titles(chapters: &[Chapter]) -> Vec<&str> {
        chapters.iter().filter_map(|c| c.title()).collect()
    }

    #[test]
    fn test_filter_by_duration_range() {
        let chapters = vec![ch(60.0, None), ch(90.0, None), ch(120.0, None), ch(180.0, None), ch(300.0, None)];
        let result = filter_chapters(chapters, Some((90.0, 180.0)), false);
        let durations: Vec<f64> = result.iter().map(|c| c.duration()).collect();
        assert_eq!(durations, vec![90.0, 120.0, 180.0]);
    }

    #[test]
    fn test_filter_by_chapter_names() {
        let chapters = vec![
            ch(90.0, Some("Opening")),
            ch(90.0, Some("Episode")),
            ch(90.0, Some("ED")),
            ch(90.0, Some("Recap")),
            ch(90.0, None),
        ];
        let result = filter_chapters(chapters, None, true);
        assert_eq!(titles(&result), vec!["Opening", "ED", "Recap"]);
    }

    #[test]
    fn test_filter_combined_and() {
        let chapters = vec![
            ch(90.0, Some("Opening")),
            ch(300.0, Some("Opening")),
            ch(90.0, Some("Episode")),
            ch(90.0, None),
        ];
        let result = filter_chapters(chapters, Some((60.0, 120.0)), true);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title(), Some("Opening"));
        assert_eq!(result[0].duration(), 90.0);
    }

    #[test]
    fn test_filter_no_filters() {
        let chapters = vec![ch(60.0, None), ch(90.0, Some("Opening")), ch(300.0, None)];
        assert_eq!(filter_chapters(chapters, None, false).len(), 3);
    }

    #[test]
    fn test_filter_word_boundary() {
        let chapters = vec![
            ch(90.0, Some("Opening Theme")),
            ch(90.0, Some("OP1")),
            ch(90.0, Some("STOP")),
        ];
        let result = filter_chapters(chapters, None, true);
        assert_eq!(titles(&result), vec!["Opening Theme", "OP1"]);
    }

    #[test]
    fn test_filter_case_insensitive() {
        let chapters = vec![ch(90.0, Some("opening")), ch(90.0, Some("INTRO")), ch(90.0, Some("Ending"))];
        assert_eq!(filter_chapters(chapters, None, true).len(), 3);
    }
}
