//! Multi-signal forced/signs subtitle detection
//!
//! Classifies a subtitle (provider candidate or existing embedded track) as
//! full, forced or signs with a confidence in [0, 1]. Signals in priority
//! order: container disposition bit, filename patterns, stream title
//! keywords, stylistic analysis of parsed content. When two or more signals
//! agree on a kind, that kind wins with the maximum confidence among the
//! agreeing signals; otherwise the single highest-confidence signal does.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{SubtitleCandidate, SubtitleKind};

static SIGNS_SONGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsigns?\s*[&+]\s*songs?\b").expect("valid regex"));

static SIGNS_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsigns?\s*only\b").expect("valid regex"));

static FORCED_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bforced\b").expect("valid regex"));

/// Result of stylistic analysis of parsed subtitle content
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleAnalysis {
    pub has_dialogue_styles: bool,
    pub has_signs_styles: bool,
}

/// Everything the classifier can look at; all fields optional
#[derive(Debug, Clone, Default)]
pub struct DetectionInput<'a> {
    /// Container-level forced disposition bit (e.g. from stream probing)
    pub disposition_forced: bool,
    pub file_name: Option<&'a str>,
    pub stream_title: Option<&'a str>,
    pub style_analysis: Option<StyleAnalysis>,
}

/// Classify a subtitle as full/forced/signs with a confidence score
pub fn detect_subtitle_kind(input: &DetectionInput<'_>) -> (SubtitleKind, f64) {
    let mut signals: Vec<(SubtitleKind, f64)> = Vec::new();

    // Signal 1: disposition bit (highest confidence)
    if input.disposition_forced {
        signals.push((SubtitleKind::Forced, 1.0));
    }

    // Signal 2: filename patterns
    if let Some(name) = input.file_name {
        let name = name.to_ascii_lowercase();
        if name.contains(".forced.") || name.contains(".foreign.") {
            signals.push((SubtitleKind::Forced, 0.9));
        }
        if name.contains(".signs.") || name.contains(".sign.") {
            signals.push((SubtitleKind::Signs, 0.9));
        }
    }

    // Signal 3: stream title keywords
    if let Some(title) = input.stream_title {
        let title = title.to_ascii_lowercase();
        if title.contains("forced") || title.contains("foreign") {
            signals.push((SubtitleKind::Forced, 0.8));
        }
        if title.contains("sign") || title.contains("song") {
            signals.push((SubtitleKind::Signs, 0.8));
        }
    }

    // Signal 4: only signs styles and no dialogue
    if let Some(styles) = input.style_analysis
        && styles.has_signs_styles
        && !styles.has_dialogue_styles
    {
        signals.push((SubtitleKind::Signs, 0.7));
    }

    if signals.is_empty() {
        return (SubtitleKind::Full, 1.0);
    }

    // Multi-signal agreement: 2+ votes for a kind take precedence
    for kind in [SubtitleKind::Forced, SubtitleKind::Signs] {
        let agreeing: Vec<f64> = signals
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, c)| *c)
            .collect();
        if agreeing.len() >= 2 {
            let confidence = agreeing.iter().cloned().fold(0.0, f64::max);
            return (kind, confidence);
        }
    }

    // Single signals: highest confidence wins
    signals
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .expect("signals not empty")
}

/// Classify a provider search result.
///
/// Consults provider metadata first (`foreign_parts_only`), then falls back
/// to filename patterns including fansub-style release markers like
/// "(Signs & Songs)".
pub fn classify_candidate(candidate: &SubtitleCandidate) -> (SubtitleKind, f64) {
    let foreign_parts_only = candidate
        .metadata
        .get("foreign_parts_only")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let base = detect_subtitle_kind(&DetectionInput {
        disposition_forced: foreign_parts_only,
        file_name: Some(&candidate.filename),
        stream_title: None,
        style_analysis: None,
    });
    if base.0 != SubtitleKind::Full {
        return base;
    }

    // Fansub release markers that the dotted patterns miss
    let name = if candidate.release_info.is_empty() {
        &candidate.filename
    } else {
        &candidate.release_info
    };
    if SIGNS_SONGS_RE.is_match(name) || SIGNS_ONLY_RE.is_match(name) {
        return (SubtitleKind::Signs, 0.9);
    }
    if FORCED_WORD_RE.is_match(name) {
        return (SubtitleKind::Forced, 0.8);
    }

    (SubtitleKind::Full, 1.0)
}

/// Fast filename-only check for external subtitle files during scans
pub fn is_forced_or_signs_filename(file_name: &str) -> bool {
    static FORCED_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\.(?:forced|signs?|foreign)\.(?:ass|ssa|srt|vtt)$").expect("valid regex")
    });
    FORCED_FILENAME_RE.is_match(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::models::SubtitleFormat;

    fn candidate(filename: &str, metadata: BTreeMap<String, String>) -> SubtitleCandidate {
        SubtitleCandidate {
            provider_name: "test".to_string(),
            external_id: "1".to_string(),
            language: "en".to_string(),
            format: SubtitleFormat::Ass,
            filename: filename.to_string(),
            release_info: String::new(),
            download_url: None,
            hearing_impaired: false,
            hash_match: false,
            metadata,
        }
    }

    #[test]
    fn disposition_bit_wins_with_full_confidence() {
        let input = DetectionInput {
            disposition_forced: true,
            ..Default::default()
        };
        assert_eq!(detect_subtitle_kind(&input), (SubtitleKind::Forced, 1.0));
    }

    #[test]
    fn filename_patterns_classify() {
        let forced = DetectionInput {
            file_name: Some("Show.S01E01.de.forced.ass"),
            ..Default::default()
        };
        assert_eq!(detect_subtitle_kind(&forced), (SubtitleKind::Forced, 0.9));

        let signs = DetectionInput {
            file_name: Some("Show.S01E01.de.signs.ass"),
            ..Default::default()
        };
        assert_eq!(detect_subtitle_kind(&signs), (SubtitleKind::Signs, 0.9));
    }

    #[test]
    fn stream_title_keywords_classify() {
        let input = DetectionInput {
            stream_title: Some("Signs / Songs"),
            ..Default::default()
        };
        assert_eq!(detect_subtitle_kind(&input), (SubtitleKind::Signs, 0.8));
    }

    #[test]
    fn style_analysis_flags_signs_only_tracks() {
        let input = DetectionInput {
            style_analysis: Some(StyleAnalysis {
                has_dialogue_styles: false,
                has_signs_styles: true,
            }),
            ..Default::default()
        };
        assert_eq!(detect_subtitle_kind(&input), (SubtitleKind::Signs, 0.7));

        // Dialogue present means no signs signal
        let mixed = DetectionInput {
            style_analysis: Some(StyleAnalysis {
                has_dialogue_styles: true,
                has_signs_styles: true,
            }),
            ..Default::default()
        };
        assert_eq!(detect_subtitle_kind(&mixed), (SubtitleKind::Full, 1.0));
    }

    #[test]
    fn agreeing_signals_take_their_max_confidence() {
        let input = DetectionInput {
            file_name: Some("Show.S01E01.signs.ass"),
            stream_title: Some("Signs & Songs"),
            ..Default::default()
        };
        // Two signs signals (0.9 and 0.8) agree; max confidence wins
        assert_eq!(detect_subtitle_kind(&input), (SubtitleKind::Signs, 0.9));
    }

    #[test]
    fn disagreeing_signals_fall_back_to_highest_confidence() {
        let input = DetectionInput {
            file_name: Some("Show.S01E01.forced.ass"),
            stream_title: Some("Songs"),
            ..Default::default()
        };
        // forced@0.9 vs signs@0.8: single highest-confidence signal wins
        assert_eq!(detect_subtitle_kind(&input), (SubtitleKind::Forced, 0.9));
    }

    #[test]
    fn no_signal_means_full() {
        let input = DetectionInput {
            file_name: Some("Show.S01E01.de.ass"),
            ..Default::default()
        };
        assert_eq!(detect_subtitle_kind(&input), (SubtitleKind::Full, 1.0));
    }

    #[test]
    fn provider_metadata_marks_forced() {
        let c = candidate(
            "whatever.ass",
            BTreeMap::from([("foreign_parts_only".to_string(), "true".to_string())]),
        );
        assert_eq!(classify_candidate(&c), (SubtitleKind::Forced, 1.0));
    }

    #[test]
    fn fansub_signs_and_songs_marker() {
        let c = candidate("[Group] Show - 01 (Signs & Songs).ass", BTreeMap::new());
        assert_eq!(classify_candidate(&c), (SubtitleKind::Signs, 0.9));
    }

    #[test]
    fn external_filename_check() {
        assert!(is_forced_or_signs_filename("movie.de.forced.srt"));
        assert!(is_forced_or_signs_filename("movie.en.signs.ass"));
        assert!(!is_forced_or_signs_filename("movie.en.ass"));
    }
}
