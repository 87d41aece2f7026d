//! Upgrade decision engine
//!
//! Pure logic over (existing, candidate, policy): decides whether a found
//! candidate is worth replacing an already-installed subtitle. Installation
//! and history bookkeeping are the caller's responsibility.

use std::path::Path;

use serde::Serialize;
use utoipa::ToSchema;

use crate::config::UpgradeConfig;
use crate::models::SubtitleFormat;

/// The already-installed subtitle under consideration
#[derive(Debug, Clone, Copy)]
pub struct ExistingSubtitle {
    pub format: SubtitleFormat,
    pub score: i32,
    /// Age of the installed file in days
    pub age_days: f64,
}

/// Outcome of an upgrade decision
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpgradeDecision {
    pub upgrade: bool,
    pub reason: String,
}

/// Decide whether `candidate` should replace `existing`.
///
/// Rules, in order:
/// 1. Never downgrade ASS to SRT.
/// 2. SRT to ASS upgrades whenever `prefer_ass` is set.
/// 3. Otherwise the score delta must reach the effective threshold:
///    `min_score_delta`, doubled while the existing file is younger than
///    `window_days`.
pub fn decide(
    existing: ExistingSubtitle,
    candidate_format: SubtitleFormat,
    candidate_score: i32,
    policy: &UpgradeConfig,
) -> UpgradeDecision {
    if existing.format == SubtitleFormat::Ass && candidate_format == SubtitleFormat::Srt {
        return UpgradeDecision {
            upgrade: false,
            reason: "would downgrade ASS to SRT".to_string(),
        };
    }

    if existing.format == SubtitleFormat::Srt
        && candidate_format == SubtitleFormat::Ass
        && policy.prefer_ass
    {
        return UpgradeDecision {
            upgrade: true,
            reason: format!(
                "SRT to ASS format upgrade (score {} to {candidate_score})",
                existing.score
            ),
        };
    }

    let mut effective_delta = policy.min_score_delta;
    if policy.window_days > 0 && existing.age_days < policy.window_days as f64 {
        effective_delta *= 2;
    }

    let delta = candidate_score - existing.score;
    if delta >= effective_delta {
        UpgradeDecision {
            upgrade: true,
            reason: format!("score improvement +{delta} (>= {effective_delta} threshold)"),
        }
    } else {
        UpgradeDecision {
            upgrade: false,
            reason: format!("score delta {delta} below threshold {effective_delta}"),
        }
    }
}

/// Format base scores; ASS ranks highest for styled subtitles
fn format_base_score(format: SubtitleFormat) -> i32 {
    match format {
        SubtitleFormat::Ass => 300,
        SubtitleFormat::Ssa => 280,
        SubtitleFormat::Srt => 150,
        _ => 100,
    }
}

/// Size thresholds with their score bonus; larger files tend to carry
/// styling and song lyrics
const SIZE_BONUS_THRESHOLDS: [(u64, i32); 3] = [(50_000, 20), (100_000, 30), (200_000, 40)];

/// Score an installed subtitle file from its format and size.
///
/// Returns `(format, score, age_days)`; a missing file scores zero.
pub fn score_existing_subtitle(path: &Path) -> Option<ExistingSubtitle> {
    let metadata = std::fs::metadata(path).ok()?;

    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(SubtitleFormat::parse)
        .unwrap_or(SubtitleFormat::Unknown);

    let mut score = format_base_score(format);
    for (threshold, bonus) in SIZE_BONUS_THRESHOLDS {
        if metadata.len() >= threshold {
            score = format_base_score(format) + bonus;
        }
    }

    let age_days = metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.elapsed().ok())
        .map(|elapsed| elapsed.as_secs_f64() / 86_400.0)
        .unwrap_or(f64::MAX);

    Some(ExistingSubtitle {
        format,
        score,
        age_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn policy() -> UpgradeConfig {
        UpgradeConfig {
            min_score_delta: 50,
            window_days: 7,
            prefer_ass: true,
        }
    }

    fn existing(format: SubtitleFormat, score: i32, age_days: f64) -> ExistingSubtitle {
        ExistingSubtitle {
            format,
            score,
            age_days,
        }
    }

    #[test]
    fn never_downgrades_ass_to_srt() {
        let decision = decide(
            existing(SubtitleFormat::Ass, 100, 30.0),
            SubtitleFormat::Srt,
            9_999,
            &policy(),
        );
        assert!(!decision.upgrade);
        assert!(decision.reason.contains("downgrade"));
    }

    #[test]
    fn srt_to_ass_upgrades_when_preferred() {
        let decision = decide(
            existing(SubtitleFormat::Srt, 150, 2.0),
            SubtitleFormat::Ass,
            170,
            &policy(),
        );
        assert!(decision.upgrade);

        let mut no_pref = policy();
        no_pref.prefer_ass = false;
        // Without the preference the score rule applies (delta 20 < 100)
        let decision = decide(
            existing(SubtitleFormat::Srt, 150, 2.0),
            SubtitleFormat::Ass,
            170,
            &no_pref,
        );
        assert!(!decision.upgrade);
    }

    #[test]
    fn recent_installs_require_double_delta() {
        // Inside the window: effective delta is 100
        let decision = decide(
            existing(SubtitleFormat::Srt, 150, 2.0),
            SubtitleFormat::Srt,
            170,
            &policy(),
        );
        assert!(!decision.upgrade);

        let decision = decide(
            existing(SubtitleFormat::Srt, 150, 2.0),
            SubtitleFormat::Srt,
            260,
            &policy(),
        );
        assert!(decision.upgrade);

        // Outside the window the plain delta applies
        let decision = decide(
            existing(SubtitleFormat::Srt, 150, 10.0),
            SubtitleFormat::Srt,
            205,
            &policy(),
        );
        assert!(decision.upgrade);
    }

    #[test]
    fn decision_is_deterministic() {
        let a = decide(
            existing(SubtitleFormat::Srt, 150, 2.0),
            SubtitleFormat::Srt,
            260,
            &policy(),
        );
        let b = decide(
            existing(SubtitleFormat::Srt, 150, 2.0),
            SubtitleFormat::Srt,
            260,
            &policy(),
        );
        assert_eq!(a.upgrade, b.upgrade);
        assert_eq!(a.reason, b.reason);
    }

    #[test]
    fn existing_scorer_uses_format_and_size() {
        let dir = tempfile::tempdir().unwrap();

        let small_srt = dir.path().join("a.srt");
        std::fs::File::create(&small_srt)
            .unwrap()
            .write_all(b"1\n00:00:01,000 --> 00:00:02,000\nhi\n")
            .unwrap();
        let scored = score_existing_subtitle(&small_srt).unwrap();
        assert_eq!(scored.format, SubtitleFormat::Srt);
        assert_eq!(scored.score, 150);

        let big_ass = dir.path().join("b.ass");
        std::fs::File::create(&big_ass)
            .unwrap()
            .write_all(&vec![b' '; 120_000])
            .unwrap();
        let scored = score_existing_subtitle(&big_ass).unwrap();
        assert_eq!(scored.format, SubtitleFormat::Ass);
        assert_eq!(scored.score, 330);

        assert!(score_existing_subtitle(&dir.path().join("missing.srt")).is_none());
    }
}
