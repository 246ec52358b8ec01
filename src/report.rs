use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{OutcomeScores, ScoreTable};
use crate::outcome::{round_score, safe_divide};
use crate::table::column_averages;

/// LO scores below this are listed under "Needs Attention".
pub const ATTENTION_THRESHOLD: i64 = 50;

#[derive(Debug, Clone)]
pub struct StudentStanding {
    pub student_id: String,
    pub student_name: String,
    pub mean_score: f64,
}

#[derive(Debug, Clone)]
pub struct ReportOptions<'a> {
    pub title: &'a str,
    pub generated_at: DateTime<Utc>,
    pub top_students: usize,
}

/// Students ordered by their mean PLO score, highest first.
pub fn rank_students(plo: &ScoreTable) -> Vec<StudentStanding> {
    let mut standings: Vec<StudentStanding> = plo
        .rows
        .iter()
        .map(|row| {
            let linked: Vec<i64> = row
                .scores
                .iter()
                .enumerate()
                .filter(|(column, _)| !plo.is_unlinked(*column))
                .map(|(_, &score)| score)
                .collect();
            StudentStanding {
                student_id: row.student_id.clone(),
                student_name: row.student_name.clone(),
                mean_score: safe_divide(linked.iter().sum::<i64>() as f64, linked.len() as f64),
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.mean_score
            .partial_cmp(&a.mean_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    standings
}

/// Students with at least one LO below `threshold`, with those LO titles.
pub fn needs_attention(lo: &ScoreTable, threshold: i64) -> Vec<(String, Vec<String>)> {
    lo.rows
        .iter()
        .filter_map(|row| {
            let weak: Vec<String> = lo
                .columns()
                .iter()
                .zip(&row.scores)
                .filter(|(_, &score)| score < threshold)
                .map(|(name, score)| format!("{name} ({score}%)"))
                .collect();
            if weak.is_empty() {
                None
            } else {
                Some((row.student_name.clone(), weak))
            }
        })
        .collect()
}

pub fn build_report(
    options: &ReportOptions<'_>,
    outcomes: &OutcomeScores,
    quizzes: Option<&ScoreTable>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", options.title);
    let _ = writeln!(
        output,
        "Generated {} for {} students",
        options.generated_at.format("%Y-%m-%d %H:%M UTC"),
        outcomes.lo.rows.len()
    );

    write_averages(&mut output, "LO Averages", &outcomes.lo);
    write_averages(&mut output, "PLO Averages", &outcomes.plo);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Students by PLO");
    let standings = rank_students(&outcomes.plo);
    if standings.is_empty() {
        let _ = writeln!(output, "No data.");
    } else {
        for standing in standings.iter().take(options.top_students) {
            let _ = writeln!(
                output,
                "- {} ({}) mean PLO score {}%",
                standing.student_name,
                standing.student_id,
                round_score(standing.mean_score)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");
    let flagged = needs_attention(&outcomes.lo, ATTENTION_THRESHOLD);
    if flagged.is_empty() {
        let _ = writeln!(output, "No students below {ATTENTION_THRESHOLD}% on any LO.");
    } else {
        for (name, weak) in flagged {
            let _ = writeln!(output, "- {}: {}", name, weak.join(", "));
        }
    }

    if let Some(quizzes) = quizzes {
        write_averages(&mut output, "Quiz Averages", quizzes);
    }

    output
}

fn write_averages(output: &mut String, heading: &str, table: &ScoreTable) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");

    let averages = column_averages(table);
    if averages.is_empty() {
        let _ = writeln!(output, "No data.");
        return;
    }

    for (column, point) in averages.into_iter().enumerate() {
        if table.is_unlinked(column) {
            let _ = writeln!(output, "- {}: no linked outcomes", point.name);
        } else {
            let _ = writeln!(output, "- {}: {}%", point.name, point.score);
        }
    }
}
