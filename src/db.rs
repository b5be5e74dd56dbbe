use anyhow::Context;
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::models::{AssessmentAnalysisResult, AssignmentRecord, QuestionResponse, UnlinkedQuestion};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_skill(tx: &mut Transaction<'_, Postgres>, name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO skill_gap.skills (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(&mut **tx)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_question(
    tx: &mut Transaction<'_, Postgres>,
    test_name: &str,
    question_key: &str,
    prompt: &str,
    skill_id: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO skill_gap.questions (id, test_name, question_key, prompt, skill_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (question_key) DO UPDATE
        SET test_name = EXCLUDED.test_name,
            prompt = EXCLUDED.prompt,
            skill_id = EXCLUDED.skill_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(test_name)
    .bind(question_key)
    .bind(prompt)
    .bind(skill_id)
    .fetch_one(&mut **tx)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_assignment(
    tx: &mut Transaction<'_, Postgres>,
    employee_email: &str,
    test_name: &str,
    completed_at: NaiveDate,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO skill_gap.assignments (id, employee_email, test_name, completed_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (employee_email, test_name, completed_at) DO UPDATE
        SET employee_email = EXCLUDED.employee_email
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(employee_email.trim().to_lowercase())
    .bind(test_name)
    .bind(completed_at)
    .fetch_one(&mut **tx)
    .await?
    .get("id");
    Ok(id)
}

async fn insert_response(
    tx: &mut Transaction<'_, Postgres>,
    assignment_id: Uuid,
    question_id: Uuid,
    score: f64,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO skill_gap.responses (id, assignment_id, question_id, score, source_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(assignment_id)
    .bind(question_id)
    .bind(score)
    .bind(source_key)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let questions = vec![
        ("seed-sql-1", "Data Foundations", "Write a query joining two tables", Some("SQL")),
        ("seed-sql-2", "Data Foundations", "Explain an index scan", Some("SQL")),
        ("seed-xls-1", "Data Foundations", "Build a pivot table", Some("Excel")),
        ("seed-pres-1", "Data Foundations", "Summarize findings for leadership", Some("Presentation Skills")),
        ("seed-gen-1", "Data Foundations", "Describe your current role", None),
    ];

    let responses = vec![
        ("avery.lee@example.com", 2026, 2, 2, [45.0, 55.0, 90.0, 62.0, 70.0]),
        ("jules.moreno@example.com", 2026, 1, 30, [85.0, 95.0, 40.0, 35.0, 50.0]),
    ];

    let mut tx = pool.begin().await?;
    let mut question_ids = Vec::new();

    for (key, test_name, prompt, skill) in &questions {
        let skill_id = match skill {
            Some(name) => Some(upsert_skill(&mut tx, name).await?),
            None => None,
        };
        question_ids.push(upsert_question(&mut tx, test_name, key, prompt, skill_id).await?);
    }

    for (email, year, month, day, scores) in responses {
        let completed_at = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;
        let assignment_id = upsert_assignment(&mut tx, email, "Data Foundations", completed_at).await?;

        for ((question_id, (key, ..)), score) in question_ids.iter().zip(&questions).zip(scores) {
            let source_key = format!("seed-{email}-{key}");
            insert_response(&mut tx, assignment_id, *question_id, score, &source_key).await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        employee_email: String,
        test_name: String,
        question_key: String,
        question_text: String,
        skill: Option<String>,
        score: f64,
        completed_at: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;

        let skill_id = match row.skill.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(upsert_skill(&mut tx, name).await?),
            _ => None,
        };
        let question_id = upsert_question(
            &mut tx,
            &row.test_name,
            &row.question_key,
            &row.question_text,
            skill_id,
        )
        .await?;
        let assignment_id =
            upsert_assignment(&mut tx, &row.employee_email, &row.test_name, row.completed_at).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_response(&mut tx, assignment_id, question_id, row.score, &source_key).await? {
            inserted += 1;
        }
    }

    tx.commit().await?;
    info!(inserted, path = %csv_path.display(), "imported graded responses");
    Ok(inserted)
}

pub async fn fetch_assignment(pool: &PgPool, assignment_id: Uuid) -> anyhow::Result<AssignmentRecord> {
    let row = sqlx::query(
        "SELECT id, employee_email, test_name, completed_at \
         FROM skill_gap.assignments WHERE id = $1",
    )
    .bind(assignment_id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("assignment {assignment_id} not found"))?;

    Ok(AssignmentRecord {
        id: row.get("id"),
        employee_email: row.get("employee_email"),
        test_name: row.get("test_name"),
        completed_at: row.get("completed_at"),
    })
}

pub async fn fetch_responses(pool: &PgPool, assignment_id: Uuid) -> anyhow::Result<Vec<QuestionResponse>> {
    let records = sqlx::query(
        "SELECT q.id AS question_id, q.skill_id, r.score \
         FROM skill_gap.responses r \
         JOIN skill_gap.questions q ON q.id = r.question_id \
         WHERE r.assignment_id = $1 \
         ORDER BY q.question_key",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await?;

    let mut responses = Vec::with_capacity(records.len());
    for row in records {
        let question_id: Uuid = row.get("question_id");
        let skill_id: Option<Uuid> = row.get("skill_id");
        responses.push(QuestionResponse {
            question_id: question_id.to_string(),
            skill_id: skill_id.map(|id| id.to_string()),
            score: row.get("score"),
        });
    }

    debug!(%assignment_id, count = responses.len(), "fetched graded responses");
    Ok(responses)
}

/// Skill ids are stored as UUIDs; this maps them back to names for display.
pub async fn fetch_skill_names(pool: &PgPool) -> anyhow::Result<std::collections::HashMap<String, String>> {
    let records = sqlx::query("SELECT id, name FROM skill_gap.skills")
        .fetch_all(pool)
        .await?;

    Ok(records
        .into_iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            (id.to_string(), row.get("name"))
        })
        .collect())
}

/// Writes the analysis for an assignment together with the thresholds that
/// produced it. Existing analyses are never overwritten; returns `false` when
/// one is already stored.
pub async fn store_analysis(
    pool: &PgPool,
    assignment_id: Uuid,
    result: &AssessmentAnalysisResult,
    config: &AnalysisConfig,
) -> anyhow::Result<bool> {
    let unlinked = i32::try_from(result.unlinked_question_count)
        .context("unlinked question count exceeds column range")?;

    let outcome = sqlx::query(
        r#"
        INSERT INTO skill_gap.assessment_analyses
        (id, assignment_id, overall_score, skill_scores, gaps, unlinked_question_count, config)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (assignment_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(assignment_id)
    .bind(i16::from(result.overall_score))
    .bind(Json(&result.skill_scores))
    .bind(Json(&result.gaps))
    .bind(unlinked)
    .bind(Json(config))
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

pub async fn fetch_unlinked_questions(
    pool: &PgPool,
    test_name: Option<&str>,
) -> anyhow::Result<Vec<UnlinkedQuestion>> {
    let mut query = String::from(
        "SELECT q.id, q.question_key, q.test_name, q.prompt, COUNT(r.id) AS response_count \
         FROM skill_gap.questions q \
         LEFT JOIN skill_gap.responses r ON r.question_id = q.id \
         WHERE q.skill_id IS NULL",
    );

    if test_name.is_some() {
        query.push_str(" AND q.test_name = $1");
    }
    query.push_str(" GROUP BY q.id, q.question_key, q.test_name, q.prompt ORDER BY q.test_name, q.question_key");

    let mut rows = sqlx::query(&query);
    if let Some(value) = test_name {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut questions = Vec::new();

    for row in records {
        questions.push(UnlinkedQuestion {
            question_id: row.get("id"),
            question_key: row.get("question_key"),
            test_name: row.get("test_name"),
            prompt: row.get("prompt"),
            response_count: row.get("response_count"),
        });
    }

    Ok(questions)
}
