//! Candidate scoring
//!
//! Each candidate gets a raw score from a per-kind weight table; missing
//! signals contribute zero. The effective score adds the user-configured
//! per-provider modifier. Weight overrides stored in the database are
//! merged over these defaults.

use std::collections::BTreeMap;

use crate::models::{MediaKind, SearchQuery, SubtitleCandidate, SubtitleFormat};
use crate::utils::release::parse_release_tokens;

/// Default weights for episode matching
pub fn default_episode_weights() -> BTreeMap<String, i32> {
    BTreeMap::from([
        ("hash".to_string(), 359),
        ("series".to_string(), 180),
        ("year".to_string(), 90),
        ("season".to_string(), 30),
        ("episode".to_string(), 30),
        ("release_group".to_string(), 14),
        ("source".to_string(), 7),
        ("audio_codec".to_string(), 3),
        ("resolution".to_string(), 2),
        ("hearing_impaired".to_string(), 1),
        ("format_bonus".to_string(), 50),
    ])
}

/// Default weights for movie matching
pub fn default_movie_weights() -> BTreeMap<String, i32> {
    BTreeMap::from([
        ("hash".to_string(), 119),
        ("title".to_string(), 60),
        ("year".to_string(), 30),
        ("release_group".to_string(), 13),
        ("source".to_string(), 7),
        ("audio_codec".to_string(), 3),
        ("resolution".to_string(), 2),
        ("hearing_impaired".to_string(), 1),
        ("format_bonus".to_string(), 50),
    ])
}

/// Weight tables with user overrides applied
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    episode: BTreeMap<String, i32>,
    movie: BTreeMap<String, i32>,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(BTreeMap::new(), BTreeMap::new())
    }
}

impl ScoringEngine {
    /// Build the engine from database overrides merged over the defaults
    pub fn new(
        episode_overrides: BTreeMap<String, i32>,
        movie_overrides: BTreeMap<String, i32>,
    ) -> Self {
        let mut episode = default_episode_weights();
        episode.extend(episode_overrides);
        let mut movie = default_movie_weights();
        movie.extend(movie_overrides);
        Self { episode, movie }
    }

    fn weights(&self, kind: MediaKind) -> &BTreeMap<String, i32> {
        match kind {
            MediaKind::Episode => &self.episode,
            MediaKind::Movie => &self.movie,
        }
    }

    /// Raw score of a candidate against the query fingerprint
    pub fn score(&self, query: &SearchQuery, candidate: &SubtitleCandidate) -> i32 {
        let kind = query.kind.unwrap_or(MediaKind::Movie);
        let weights = self.weights(kind);
        let weight = |key: &str| weights.get(key).copied().unwrap_or(0);

        // Candidate-side tokens come from whichever string is richer
        let candidate_name = if candidate.release_info.len() > candidate.filename.len() {
            &candidate.release_info
        } else {
            &candidate.filename
        };
        let tokens = parse_release_tokens(candidate_name);

        let mut score = 0;

        if candidate.hash_match {
            score += weight("hash");
        }

        let title_key = match kind {
            MediaKind::Episode => "series",
            MediaKind::Movie => "title",
        };
        let query_title = query.series_title.as_deref().unwrap_or(&query.title);
        if titles_match(query_title, &tokens.title)
            || titles_match(query_title, candidate_name)
        {
            score += weight(title_key);
        }

        if let (Some(query_year), Some(candidate_year)) = (query.year, tokens.year)
            && query_year == candidate_year
        {
            score += weight("year");
        }

        if kind == MediaKind::Episode {
            if let (Some(qs), Some(cs)) = (query.season, tokens.season)
                && qs == cs
            {
                score += weight("season");
            }
            if let (Some(qe), Some(ce)) = (query.episode, tokens.episode)
                && qe == ce
            {
                score += weight("episode");
            }
        }

        if let (Some(qg), Some(cg)) = (&query.release_group, &tokens.release_group)
            && qg.eq_ignore_ascii_case(cg)
        {
            score += weight("release_group");
        }

        if let (Some(qs), Some(cs)) = (&query.source, &tokens.source)
            && qs == cs
        {
            score += weight("source");
        }

        if let (Some(qa), Some(ca)) = (&query.audio_codec, &tokens.audio_codec)
            && qa.eq_ignore_ascii_case(ca)
        {
            score += weight("audio_codec");
        }

        if let (Some(qr), Some(cr)) = (&query.resolution, &tokens.resolution)
            && qr == cr
        {
            score += weight("resolution");
        }

        if !candidate.hearing_impaired {
            score += weight("hearing_impaired");
        }

        if matches!(candidate.format, SubtitleFormat::Ass | SubtitleFormat::Ssa) {
            score += weight("format_bonus");
        }

        score
    }
}

/// Case- and separator-insensitive containment check between titles
fn titles_match(query_title: &str, candidate_text: &str) -> bool {
    let normalised_query = normalise_title(query_title);
    if normalised_query.is_empty() {
        return false;
    }
    normalise_title(candidate_text).contains(&normalised_query)
}

fn normalise_title(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubtitleKind;

    fn episode_query() -> SearchQuery {
        SearchQuery {
            kind: Some(MediaKind::Episode),
            media_file_path: "/tv/Show Name/Show.Name.S02E05.1080p.WEB-DL.mkv".to_string(),
            title: "Show Name".to_string(),
            series_title: Some("Show Name".to_string()),
            season: Some(2),
            episode: Some(5),
            year: None,
            language: "en".to_string(),
            subtitle_kind: Some(SubtitleKind::Full),
            file_hash: None,
            release_group: Some("NTb".to_string()),
            source: Some("web".to_string()),
            resolution: Some("1080p".to_string()),
            audio_codec: None,
        }
    }

    fn candidate(filename: &str, format: SubtitleFormat, hash_match: bool) -> SubtitleCandidate {
        SubtitleCandidate {
            provider_name: "test".to_string(),
            external_id: "1".to_string(),
            language: "en".to_string(),
            format,
            filename: filename.to_string(),
            release_info: String::new(),
            download_url: None,
            hearing_impaired: false,
            hash_match,
            metadata: Default::default(),
        }
    }

    #[test]
    fn hash_match_dominates() {
        let engine = ScoringEngine::default();
        let query = episode_query();

        let hashed = candidate("random-name.srt", SubtitleFormat::Srt, true);
        let exact = candidate(
            "Show.Name.S02E05.1080p.WEB-DL-NTb.srt",
            SubtitleFormat::Srt,
            false,
        );

        let hashed_score = engine.score(&query, &hashed);
        let exact_score = engine.score(&query, &exact);
        assert!(hashed_score > exact_score);
    }

    #[test]
    fn matching_signals_accumulate() {
        let engine = ScoringEngine::default();
        let query = episode_query();

        let full_match = candidate(
            "Show.Name.S02E05.1080p.WEB-DL-NTb.ass",
            SubtitleFormat::Ass,
            false,
        );
        // series 180 + season 30 + episode 30 + group 14 + source 7 +
        // resolution 2 + non-HI 1 + format bonus 50
        assert_eq!(engine.score(&query, &full_match), 314);
    }

    #[test]
    fn missing_signals_contribute_zero() {
        let engine = ScoringEngine::default();
        let query = episode_query();
        let unrelated = candidate("Totally.Different.Show.srt", SubtitleFormat::Srt, false);
        // Only the non-hearing-impaired point applies
        assert_eq!(engine.score(&query, &unrelated), 1);
    }

    #[test]
    fn overrides_replace_default_weights() {
        let engine = ScoringEngine::new(
            BTreeMap::from([("series".to_string(), 500)]),
            BTreeMap::new(),
        );
        let query = episode_query();
        let named = candidate("Show.Name.S09E09.srt", SubtitleFormat::Srt, false);
        // series 500 + non-HI 1 (season/episode mismatch)
        assert_eq!(engine.score(&query, &named), 501);
    }

    #[test]
    fn movie_scoring_uses_title_and_year() {
        let engine = ScoringEngine::default();
        let query = SearchQuery {
            kind: Some(MediaKind::Movie),
            title: "Great Movie".to_string(),
            year: Some(2019),
            language: "en".to_string(),
            ..Default::default()
        };
        let matching = candidate("Great.Movie.2019.1080p.BluRay.srt", SubtitleFormat::Srt, false);
        // title 60 + year 30 + non-HI 1
        assert_eq!(engine.score(&query, &matching), 91);
    }
}
