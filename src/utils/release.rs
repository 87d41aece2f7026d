//! Release-token parsing for media filenames
//!
//! Derives the query fingerprint a provider search needs (title, season,
//! episode, year, release tokens) from a media file path, plus the OSDb
//! content hash used as the strongest match signal.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Chunk size at each end of the file for the OSDb hash
const HASH_CHUNK_SIZE: u64 = 64 * 1024;

static SEASON_EPISODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bS(\d{1,2})E(\d{1,3})\b").expect("valid regex"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid regex"));

static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(2160p|1080p|720p|480p)\b").expect("valid regex"));

static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(BluRay|Blu-Ray|BDRip|BRRip|WEB-DL|WEBDL|WEBRip|WEB|HDTV|DVDRip)\b")
        .expect("valid regex")
});

static AUDIO_CODEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(FLAC|EAC3|E-AC-3|AC3|AAC|DTS-HD|DTS|TrueHD|OPUS)\b").expect("valid regex")
});

// Fansub-style "[Group] Title - 01" prefix or scene-style "-GROUP" suffix
static BRACKET_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]").expect("valid regex"));

static SUFFIX_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([A-Za-z0-9]+)$").expect("valid regex"));

/// Tokens recognisable from a release filename
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseTokens {
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u32>,
    pub resolution: Option<String>,
    pub source: Option<String>,
    pub audio_codec: Option<String>,
    pub release_group: Option<String>,
}

/// Parse release tokens from a media file path
pub fn parse_release_tokens(path: &str) -> ReleaseTokens {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut tokens = ReleaseTokens::default();

    if let Some(caps) = SEASON_EPISODE_RE.captures(stem) {
        tokens.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        tokens.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
    }
    if let Some(caps) = YEAR_RE.captures(stem) {
        tokens.year = caps.get(1).and_then(|m| m.as_str().parse().ok());
    }
    if let Some(m) = RESOLUTION_RE.find(stem) {
        tokens.resolution = Some(m.as_str().to_lowercase());
    }
    if let Some(m) = SOURCE_RE.find(stem) {
        tokens.source = Some(normalise_source(m.as_str()));
    }
    if let Some(m) = AUDIO_CODEC_RE.find(stem) {
        tokens.audio_codec = Some(m.as_str().to_uppercase());
    }
    if let Some(caps) = BRACKET_GROUP_RE.captures(stem) {
        tokens.release_group = caps.get(1).map(|m| m.as_str().to_string());
    } else if let Some(caps) = SUFFIX_GROUP_RE.captures(stem) {
        // A bare year or resolution suffix is not a group name
        let candidate = caps.get(1).map(|m| m.as_str().to_string());
        if let Some(c) = candidate
            && !YEAR_RE.is_match(&c)
            && !RESOLUTION_RE.is_match(&c)
        {
            tokens.release_group = Some(c);
        }
    }

    tokens.title = extract_title(stem);
    tokens
}

/// Title guess: everything before the season/episode or year marker,
/// with separators normalised and the group prefix stripped
fn extract_title(stem: &str) -> String {
    let without_group = BRACKET_GROUP_RE.replace(stem, "");
    let without_group = without_group.as_ref();
    let cut_at = SEASON_EPISODE_RE
        .find(without_group)
        .map(|m| m.start())
        .or_else(|| YEAR_RE.find(without_group).map(|m| m.start()))
        .unwrap_or(without_group.len());

    without_group[..cut_at]
        .replace(['.', '_'], " ")
        .trim()
        .trim_end_matches(['-', '(', '['])
        .trim()
        .to_string()
}

fn normalise_source(raw: &str) -> String {
    match raw.to_lowercase().replace('-', "").as_str() {
        "bluray" | "bdrip" | "brrip" => "bluray".to_string(),
        "webdl" | "webrip" | "web" => "web".to_string(),
        "hdtv" => "hdtv".to_string(),
        "dvdrip" => "dvd".to_string(),
        other => other.to_string(),
    }
}

/// OSDb-style content hash: file size plus 64-bit word sums of the first
/// and last 64 KiB, rendered as 16 hex digits.
///
/// Returns `None` for unreadable or very small files.
pub fn compute_file_hash(path: &str) -> Option<String> {
    let mut file = std::fs::File::open(path).ok()?;
    let size = file.metadata().ok()?.len();
    if size < HASH_CHUNK_SIZE {
        return None;
    }

    let mut hash = size;
    hash = hash.wrapping_add(sum_chunk(&mut file, 0).ok()?);
    hash = hash.wrapping_add(sum_chunk(&mut file, size - HASH_CHUNK_SIZE).ok()?);
    Some(format!("{hash:016x}"))
}

fn sum_chunk(file: &mut std::fs::File, offset: u64) -> std::io::Result<u64> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE as usize];
    file.read_exact(&mut buffer)?;

    let mut sum: u64 = 0;
    for word in buffer.chunks_exact(8) {
        sum = sum.wrapping_add(u64::from_le_bytes(word.try_into().expect("8-byte chunk")));
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_scene_episode_release() {
        let tokens =
            parse_release_tokens("/tv/Show Name/Show.Name.S02E05.1080p.WEB-DL.AAC-NTb.mkv");
        assert_eq!(tokens.title, "Show Name");
        assert_eq!(tokens.season, Some(2));
        assert_eq!(tokens.episode, Some(5));
        assert_eq!(tokens.resolution.as_deref(), Some("1080p"));
        assert_eq!(tokens.source.as_deref(), Some("web"));
        assert_eq!(tokens.audio_codec.as_deref(), Some("AAC"));
        assert_eq!(tokens.release_group.as_deref(), Some("NTb"));
    }

    #[test]
    fn parses_fansub_release() {
        let tokens = parse_release_tokens("/anime/[SubGroup] Some Show - S01E01 [1080p].mkv");
        assert_eq!(tokens.release_group.as_deref(), Some("SubGroup"));
        assert_eq!(tokens.season, Some(1));
        assert_eq!(tokens.episode, Some(1));
        assert_eq!(tokens.title, "Some Show");
    }

    #[test]
    fn parses_movie_with_year() {
        let tokens = parse_release_tokens("/movies/Great.Movie.2019.2160p.BluRay.DTS.mkv");
        assert_eq!(tokens.title, "Great Movie");
        assert_eq!(tokens.year, Some(2019));
        assert_eq!(tokens.season, None);
        assert_eq!(tokens.source.as_deref(), Some("bluray"));
        assert_eq!(tokens.resolution.as_deref(), Some("2160p"));
    }

    #[test]
    fn file_hash_requires_minimum_size() {
        let mut small = tempfile::NamedTempFile::new().unwrap();
        small.write_all(b"tiny").unwrap();
        assert_eq!(compute_file_hash(small.path().to_str().unwrap()), None);

        let mut big = tempfile::NamedTempFile::new().unwrap();
        big.write_all(&vec![7u8; 256 * 1024]).unwrap();
        let hash = compute_file_hash(big.path().to_str().unwrap()).unwrap();
        assert_eq!(hash.len(), 16);
        // Deterministic for identical content
        assert_eq!(
            compute_file_hash(big.path().to_str().unwrap()).unwrap(),
            hash
        );
    }
}
