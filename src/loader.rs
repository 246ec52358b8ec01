//! Reads saved dashboard query responses from disk.
//!
//! Each file may hold the bare payload, the payload under its query field
//! (`{"flatSummary": ...}`), or a full GraphQL envelope
//! (`{"data": {"flatSummary": ...}}`).

use std::path::Path;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{FlatSummary, FlatSummaryResponse, PloLink, QuizResult};

pub fn load_flat_summary(path: &Path) -> anyhow::Result<FlatSummary> {
    let response: FlatSummaryResponse = read_payload(path, "flatSummary")?;
    let summary = parse_flat_summary(response)?;
    info!(
        students = summary.students.len(),
        questions = summary.questions.len(),
        "loaded flat summary from {}",
        path.display()
    );
    Ok(summary)
}

pub fn load_plo_links(path: &Path) -> anyhow::Result<Vec<PloLink>> {
    let links: Vec<PloLink> = read_payload(path, "ploSummary")?;
    info!(links = links.len(), "loaded PLO links from {}", path.display());
    Ok(links)
}

pub fn load_quiz_results(path: &Path) -> anyhow::Result<Vec<QuizResult>> {
    let quizzes: Vec<QuizResult> = read_payload(path, "quizResults")?;
    for quiz in &quizzes {
        if quiz.max_score <= 0.0 {
            warn!(quiz = %quiz.quiz_name, "quiz has no positive max score; its scores read as 0");
        }
    }
    info!(quizzes = quizzes.len(), "loaded quiz results from {}", path.display());
    Ok(quizzes)
}

/// Checks the numeric fields of a response and converts it to aggregator input.
pub fn parse_flat_summary(response: FlatSummaryResponse) -> anyhow::Result<FlatSummary> {
    for question in &response.questions {
        if !question.max_score.is_finite() || question.max_score < 0.0 {
            bail!(
                "question `{}` has invalid max score {}",
                question.title,
                question.max_score
            );
        }
        if question.max_score == 0.0 {
            warn!(question = %question.title, "question has zero max score; its results count as 0");
        }
    }

    for lo in &response.los {
        if lo.id.contains(',') {
            bail!("LO id `{}` must not contain a comma", lo.id);
        }
        if lo.levels.is_empty() {
            warn!(lo = %lo.id, "LO has no levels; it will score 0");
        }
    }

    Ok(FlatSummary::from(response))
}

fn read_payload<T: DeserializeOwned>(path: &Path, field: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_payload(&content, field).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_payload<T: DeserializeOwned>(content: &str, field: &str) -> anyhow::Result<T> {
    let mut value: Value = serde_json::from_str(content)?;

    if let Some(data) = value.get_mut("data").map(Value::take) {
        debug!("unwrapping GraphQL data envelope");
        value = data;
    }
    if let Some(inner) = value.get_mut(field).map(Value::take) {
        value = inner;
    }

    serde_json::from_value(value).with_context(|| format!("unexpected `{field}` shape"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FLAT: &str = include_str!("../fixtures/flat_summary.json");
    const LINKS: &str = include_str!("../fixtures/plo_summary.json");
    const QUIZZES: &str = include_str!("../fixtures/quiz_results.json");

    #[test]
    fn fixtures_parse() {
        let response: FlatSummaryResponse = parse_payload(FLAT, "flatSummary").unwrap();
        let summary = parse_flat_summary(response).unwrap();
        assert_eq!(summary.students.len(), 3);

        let links: Vec<PloLink> = parse_payload(LINKS, "ploSummary").unwrap();
        assert!(!links.is_empty());

        let quizzes: Vec<QuizResult> = parse_payload(QUIZZES, "quizResults").unwrap();
        assert!(!quizzes.is_empty());
    }

    #[test]
    fn accepts_bare_and_wrapped_payloads() {
        let bare = r#"[{"ploID": "p1", "loID": ["lo1"]}]"#;
        let field = r#"{"ploSummary": [{"ploID": "p1", "loID": ["lo1"]}]}"#;
        let envelope = r#"{"data": {"ploSummary": [{"ploID": "p1", "loID": ["lo1"]}]}}"#;

        for content in [bare, field, envelope] {
            let links: Vec<PloLink> = parse_payload(content, "ploSummary").unwrap();
            assert_eq!(links[0].plo_id, "p1");
            assert_eq!(links[0].lo_ids, vec!["lo1"]);
        }
    }

    #[test]
    fn rejects_negative_max_score() {
        let content = r#"{"questions": [{"title": "Q1", "maxScore": -5, "linkedLOs": []}]}"#;
        let response: FlatSummaryResponse = parse_payload(content, "flatSummary").unwrap();
        assert!(parse_flat_summary(response).is_err());
    }

    #[test]
    fn absent_max_score_reads_as_zero() {
        let content = r#"{"questions": [{"title": "Q", "linkedLOs": [], "results": []}]}"#;
        let response: FlatSummaryResponse = parse_payload(content, "flatSummary").unwrap();

        let summary = parse_flat_summary(response).unwrap();

        assert_eq!(summary.questions[0].max_score, 0.0);
    }

    #[test]
    fn rejects_lo_ids_with_commas() {
        let content = r#"{"los": [{"id": "a,b", "title": "Broken", "levels": []}]}"#;
        let response: FlatSummaryResponse = parse_payload(content, "flatSummary").unwrap();
        assert!(parse_flat_summary(response).is_err());
    }

    #[test]
    fn load_reports_the_failing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = load_plo_links(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(QUIZZES.as_bytes()).unwrap();

        let quizzes = load_quiz_results(file.path()).unwrap();
        assert_eq!(quizzes[0].quiz_name, "Midterm Exam");
    }
}
