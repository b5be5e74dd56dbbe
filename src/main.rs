use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use skill_gap_analyzer::config::{DEFAULT_GAP_THRESHOLD, DEFAULT_LEVEL_HIGH, DEFAULT_LEVEL_MEDIUM};
use skill_gap_analyzer::models::AssessmentAnalysisResult;
use skill_gap_analyzer::{analyze, db, report, AnalysisConfig};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "skill-gap-analyzer")]
#[command(about = "Skill gap analysis for completed training assessments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct ThresholdArgs {
    /// Skills averaging below this score are reported as gaps
    #[arg(long, env = "GAP_THRESHOLD", default_value_t = DEFAULT_GAP_THRESHOLD)]
    gap_threshold: f64,
    /// Lowest average classified as `high`
    #[arg(long, env = "LEVEL_HIGH", default_value_t = DEFAULT_LEVEL_HIGH)]
    level_high: f64,
    /// Lowest average classified as `medium`
    #[arg(long, env = "LEVEL_MEDIUM", default_value_t = DEFAULT_LEVEL_MEDIUM)]
    level_medium: f64,
}

impl From<ThresholdArgs> for AnalysisConfig {
    fn from(args: ThresholdArgs) -> Self {
        AnalysisConfig::new(args.gap_threshold, args.level_high, args.level_medium)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo skills, questions and graded assignments
    Seed,
    /// Import graded responses from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute skill scores and gaps for one assignment
    Analyze {
        #[arg(long)]
        assignment: Uuid,
        /// Persist the analysis (at most once per assignment)
        #[arg(long)]
        save: bool,
        /// Print the analysis as JSON instead of a summary
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Generate a markdown skill gap report for one assignment
    Report {
        #[arg(long)]
        assignment: Uuid,
        #[arg(long, default_value = "skill-gap-report.md")]
        out: PathBuf,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// List questions that are not linked to any skill
    Diagnose {
        #[arg(long)]
        test: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_summary(result: &AssessmentAnalysisResult, names: &HashMap<String, String>) {
    println!("Overall score: {}%", result.overall_score);

    for entry in result.skill_scores.values() {
        let name = names.get(&entry.skill_id).unwrap_or(&entry.skill_id);
        println!(
            "- {} {}% ({}, {} questions)",
            name, entry.average_score, entry.level, entry.question_count
        );
    }

    if result.gaps.is_empty() {
        println!("No skills below the gap threshold.");
    } else {
        println!("Gaps (worst first):");
        for gap in &result.gaps {
            let name = names.get(&gap.skill_id).unwrap_or(&gap.skill_id);
            println!("- {} {}%", name, gap.average_score);
        }
    }

    if result.unlinked_question_count > 0 {
        println!(
            "Warning: {} question(s) have no linked skill; run `diagnose` for details.",
            result.unlinked_question_count
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} responses from {}.", csv.display());
        }
        Commands::Analyze {
            assignment,
            save,
            json,
            thresholds,
        } => {
            let config = AnalysisConfig::from(thresholds);
            let responses = db::fetch_responses(&pool, assignment).await?;
            let result = analyze(&responses, &config)
                .with_context(|| format!("analysis unavailable for assignment {assignment}"))?;
            let names = db::fetch_skill_names(&pool).await?;

            if json {
                let output = serde_json::json!({
                    "assignment_id": assignment,
                    "config": config,
                    "analysis": result,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_summary(&result, &names);
            }

            if save {
                if db::store_analysis(&pool, assignment, &result, &config).await? {
                    println!("Analysis saved.");
                } else {
                    println!("An analysis already exists for this assignment; nothing written.");
                }
            }
        }
        Commands::Report {
            assignment,
            out,
            thresholds,
        } => {
            let config = AnalysisConfig::from(thresholds);
            let record = db::fetch_assignment(&pool, assignment).await?;
            let responses = db::fetch_responses(&pool, record.id).await?;
            let result = analyze(&responses, &config)
                .with_context(|| format!("analysis unavailable for assignment {assignment}"))?;
            let names = db::fetch_skill_names(&pool).await?;
            let label = format!(
                "{} / {} ({})",
                record.employee_email, record.test_name, record.completed_at
            );
            let report = report::build_report(Some(&label), &result, &config, &names);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Diagnose { test } => {
            let questions = db::fetch_unlinked_questions(&pool, test.as_deref()).await?;

            if questions.is_empty() {
                println!("Every question is linked to a skill.");
                return Ok(());
            }

            println!("Questions without a linked skill:");
            for question in &questions {
                println!(
                    "- [{}] {} ({}): {} ({} responses)",
                    question.test_name,
                    question.question_key,
                    question.question_id,
                    question.prompt,
                    question.response_count
                );
            }
        }
    }

    Ok(())
}
