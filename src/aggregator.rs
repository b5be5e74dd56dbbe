use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::{AnalysisConfig, LevelThresholds};
use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{AssessmentAnalysisResult, GapEntry, QuestionResponse, SkillLevel, SkillScoreEntry};

/// Turns the graded responses of one assignment into per-skill scores,
/// levels and a gap list.
///
/// Unlinked responses (no `skill_id`) contribute to `overall_score` but to
/// no skill. `overall_score` is weighted by question count, not by skill.
pub fn analyze(
    responses: &[QuestionResponse],
    config: &AnalysisConfig,
) -> AnalysisResult<AssessmentAnalysisResult> {
    config.validate()?;

    if responses.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    for response in responses {
        validate_response(response)?;
    }

    let mut groups: BTreeMap<&str, (usize, i64)> = BTreeMap::new();
    let mut unlinked_question_count = 0usize;
    let mut total_hundredths = 0i64;

    for response in responses {
        let hundredths = to_hundredths(response.score);
        total_hundredths += hundredths;

        match response.skill_id.as_deref() {
            Some(skill_id) => {
                let entry = groups.entry(skill_id).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += hundredths;
            }
            None => unlinked_question_count += 1,
        }
    }

    let skill_scores: BTreeMap<String, SkillScoreEntry> = groups
        .into_iter()
        .map(|(skill_id, (count, sum))| {
            let average_score = half_up_mean(sum, count);
            let entry = SkillScoreEntry {
                skill_id: skill_id.to_string(),
                question_count: count,
                average_score,
                level: classify_level(average_score, &config.levels),
            };
            (skill_id.to_string(), entry)
        })
        .collect();

    let overall_score = half_up_mean(total_hundredths, responses.len());
    let gaps = find_gaps(&skill_scores, config.gap_threshold);

    if unlinked_question_count > 0 {
        warn!(
            unlinked = unlinked_question_count,
            total = responses.len(),
            "responses without a linked skill were excluded from skill scores"
        );
    }
    debug!(
        responses = responses.len(),
        skills = skill_scores.len(),
        gaps = gaps.len(),
        overall_score,
        "assessment analyzed"
    );

    Ok(AssessmentAnalysisResult {
        overall_score,
        skill_scores,
        gaps,
        unlinked_question_count,
    })
}

fn validate_response(response: &QuestionResponse) -> AnalysisResult<()> {
    if response.question_id.trim().is_empty() {
        return Err(AnalysisError::invalid_response(
            response.question_id.clone(),
            "question id is empty",
        ));
    }

    if let Some(skill_id) = &response.skill_id {
        if skill_id.trim().is_empty() {
            return Err(AnalysisError::invalid_response(
                response.question_id.clone(),
                "skill id is present but empty",
            ));
        }
    }

    if !response.score.is_finite() {
        return Err(AnalysisError::invalid_response(
            response.question_id.clone(),
            format!("score {} is not a number", response.score),
        ));
    }

    if !(0.0..=100.0).contains(&response.score) {
        return Err(AnalysisError::invalid_response(
            response.question_id.clone(),
            format!("score {} is outside 0-100", response.score),
        ));
    }

    Ok(())
}

/// Upper side of each band is inclusive: `average == high` is `High`.
pub fn classify_level(average_score: u8, thresholds: &LevelThresholds) -> SkillLevel {
    let score = f64::from(average_score);
    if score >= thresholds.high {
        SkillLevel::High
    } else if score >= thresholds.medium {
        SkillLevel::Medium
    } else {
        SkillLevel::Low
    }
}

/// Scores are summed as whole hundredths of a point so that a mean landing
/// exactly on `.5` is not lost to binary floating point.
pub fn to_hundredths(score: f64) -> i64 {
    (score * 100.0).round() as i64
}

/// Mean of `count` scores whose sum is given in hundredths, rounded half up
/// to a whole percentage.
pub fn half_up_mean(sum_hundredths: i64, count: usize) -> u8 {
    if count == 0 {
        return 0;
    }
    let divisor = 100 * count as i64;
    let mean = (2 * sum_hundredths + divisor) / (2 * divisor);
    mean.clamp(0, 100) as u8
}

fn find_gaps(skill_scores: &BTreeMap<String, SkillScoreEntry>, gap_threshold: f64) -> Vec<GapEntry> {
    let mut gaps: Vec<GapEntry> = skill_scores
        .values()
        .filter(|entry| f64::from(entry.average_score) < gap_threshold)
        .map(GapEntry::from)
        .collect();

    gaps.sort_by(|a, b| {
        a.average_score
            .cmp(&b.average_score)
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    gaps
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Scores as whole hundredths in 0..=10000, skills drawn from a small pool
    /// so groups share questions.
    fn responses_strategy() -> impl Strategy<Value = Vec<QuestionResponse>> {
        prop::collection::vec((prop::option::of(0_usize..5), 0_i64..=10_000), 1..40).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (skill, hundredths))| QuestionResponse {
                    question_id: format!("q{i}"),
                    skill_id: skill.map(|k| format!("S{k}")),
                    score: hundredths as f64 / 100.0,
                })
                .collect()
        })
    }

    fn sum_hundredths(responses: &[QuestionResponse]) -> i64 {
        responses.iter().map(|r| (r.score * 100.0).round() as i64).sum()
    }

    proptest! {
        /// Overall score is the half-up mean of every score, linked or not.
        #[test]
        fn prop_overall_is_half_up_mean(responses in responses_strategy()) {
            let result = analyze(&responses, &AnalysisConfig::default()).unwrap();
            let n = responses.len() as i64;
            let sum = sum_hundredths(&responses);
            let overall = i64::from(result.overall_score);

            // overall - 0.5 <= sum / (100n) < overall + 0.5
            prop_assert!(100 * n * (2 * overall - 1) <= 2 * sum);
            prop_assert!(2 * sum < 100 * n * (2 * overall + 1));
        }

        /// Every response lands in exactly one skill group or the unlinked count.
        #[test]
        fn prop_partition_is_complete(responses in responses_strategy()) {
            let result = analyze(&responses, &AnalysisConfig::default()).unwrap();
            let linked: usize = result.skill_scores.values().map(|e| e.question_count).sum();

            prop_assert_eq!(linked + result.unlinked_question_count, responses.len());
            prop_assert_eq!(
                result.unlinked_question_count,
                responses.iter().filter(|r| r.skill_id.is_none()).count()
            );
            prop_assert!(result.skill_scores.values().all(|e| e.question_count >= 1));
        }

        /// Gaps are exactly the sub-threshold skills, once each, worst first.
        #[test]
        fn prop_gaps_are_sorted_subset(
            responses in responses_strategy(),
            gap_threshold in 0.0_f64..=100.0
        ) {
            let config = AnalysisConfig::new(gap_threshold, 80.0, 50.0);
            let result = analyze(&responses, &config).unwrap();

            let mut expected: Vec<&str> = result
                .skill_scores
                .values()
                .filter(|e| f64::from(e.average_score) < gap_threshold)
                .map(|e| e.skill_id.as_str())
                .collect();
            let mut actual: Vec<&str> = result.gaps.iter().map(|g| g.skill_id.as_str()).collect();
            expected.sort_unstable();
            actual.sort_unstable();
            prop_assert_eq!(expected, actual);

            for gap in &result.gaps {
                prop_assert_eq!(gap.average_score, result.skill_scores[&gap.skill_id].average_score);
            }
            for pair in result.gaps.windows(2) {
                let ordered = (pair[0].average_score, &pair[0].skill_id)
                    < (pair[1].average_score, &pair[1].skill_id);
                prop_assert!(ordered);
            }
        }

        /// Identical input and config give identical output.
        #[test]
        fn prop_analysis_is_deterministic(responses in responses_strategy()) {
            let config = AnalysisConfig::default();
            let first = analyze(&responses, &config).unwrap();
            let second = analyze(&responses, &config).unwrap();

            prop_assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
            prop_assert_eq!(first, second);
        }
    }
}
