/// Episode tag parsing from filenames
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::chapters::EpisodeInfo;

static EPISODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)S([0-9]{2,})E([0-9]{2,})").unwrap());

/// Parse the first `SxxEyy` tag from the file name component of `path`.
///
/// Numbers that do not fit in a `u32` are treated as no match.
pub fn parse_episode(path: impl AsRef<Path>) -> Option<EpisodeInfo> {
    let name = path.as_ref().file_name()?.to_string_lossy();
    let caps = EPISODE_RE.captures(&name)?;
    let season = caps.get(1)?.as_str().parse().ok()?;
    let episode = caps.get(2)?.as_str().parse().ok()?;

    Some(EpisodeInfo::new(season, episode))
}
