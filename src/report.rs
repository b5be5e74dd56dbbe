use std::collections::HashMap;
use std::fmt::Write;

use crate::config::AnalysisConfig;
use crate::models::{AssessmentAnalysisResult, LevelSummary, SkillLevel};

pub fn summarize_levels(result: &AssessmentAnalysisResult) -> Vec<LevelSummary> {
    [SkillLevel::High, SkillLevel::Medium, SkillLevel::Low]
        .into_iter()
        .map(|level| LevelSummary {
            level,
            skill_count: result
                .skill_scores
                .values()
                .filter(|entry| entry.level == level)
                .count(),
        })
        .collect()
}

/// Falls back to the raw id when no display name is known.
fn skill_label<'a>(skill_id: &'a str, skill_names: &'a HashMap<String, String>) -> &'a str {
    skill_names.get(skill_id).map(String::as_str).unwrap_or(skill_id)
}

pub fn build_report(
    label: Option<&str>,
    result: &AssessmentAnalysisResult,
    config: &AnalysisConfig,
    skill_names: &HashMap<String, String>,
) -> String {
    let summaries = summarize_levels(result);
    let mut output = String::new();
    let label = label.unwrap_or("unnamed assignment");

    let _ = writeln!(output, "# Skill Gap Report");
    let _ = writeln!(
        output,
        "Generated for {} (gap threshold {}, levels high >= {}, medium >= {})",
        label, config.gap_threshold, config.levels.high, config.levels.medium
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Overall score: {}% across {} questions",
        result.overall_score,
        result.total_responses()
    );

    if result.unlinked_question_count > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> Warning: {} question(s) are not linked to a skill. They count toward the overall score but not toward any skill.",
            result.unlinked_question_count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Level Mix");
    for summary in &summaries {
        let _ = writeln!(output, "- {}: {} skills", summary.level, summary.skill_count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Skill Scores");

    if result.skill_scores.is_empty() {
        let _ = writeln!(output, "No linked skills in this assessment.");
    } else {
        let _ = writeln!(output, "| Skill | Questions | Average | Level |");
        let _ = writeln!(output, "| --- | --- | --- | --- |");
        for entry in result.skill_scores.values() {
            let _ = writeln!(
                output,
                "| {} | {} | {}% | {} |",
                skill_label(&entry.skill_id, skill_names),
                entry.question_count,
                entry.average_score,
                entry.level
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Training Gaps");

    if result.gaps.is_empty() {
        let _ = writeln!(output, "No skills below the gap threshold.");
    } else {
        for gap in &result.gaps {
            let _ = writeln!(
                output,
                "- {}: {}%",
                skill_label(&gap.skill_id, skill_names),
                gap.average_score
            );
        }
    }

    output
}
