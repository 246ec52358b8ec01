//! Views over score tables: single-student selection, comparison and the
//! `{name, score}` series the dashboard charts consume.

use std::fmt::Write;

use crate::models::{ChartPoint, ScoreRow, ScoreTable};
use crate::outcome::{round_score, safe_divide, UNLINKED_PLO_SCORE};

impl ScoreTable {
    /// Score column titles, without the fixed student columns.
    pub fn columns(&self) -> &[String] {
        self.headers.get(2..).unwrap_or(&[])
    }

    pub fn student(&self, student_id: &str) -> Option<&ScoreRow> {
        self.rows.iter().find(|row| row.student_id == student_id)
    }

    /// True for a PLO column with no linked LOs.
    pub fn is_unlinked(&self, column: usize) -> bool {
        self.unlinked_columns.contains(&column)
    }

    /// The student's row, followed by the comparison student's row when given.
    pub fn compare(&self, student_id: &str, other: Option<&str>) -> Option<ScoreTable> {
        let mut rows = vec![self.student(student_id)?.clone()];
        if let Some(other) = other {
            rows.push(self.student(other)?.clone());
        }

        Some(ScoreTable {
            headers: self.headers.clone(),
            rows,
            unlinked_columns: self.unlinked_columns.clone(),
        })
    }
}

/// Mean of every score column across students.
///
/// An unlinked PLO column reports [`UNLINKED_PLO_SCORE`]. Every other column
/// averages all of its cells, including real scores of -1.
pub fn column_averages(table: &ScoreTable) -> Vec<ChartPoint> {
    if table.rows.is_empty() {
        return Vec::new();
    }

    table
        .columns()
        .iter()
        .enumerate()
        .map(|(column, name)| {
            let score = if table.is_unlinked(column) {
                UNLINKED_PLO_SCORE
            } else {
                let values: Vec<i64> = table
                    .rows
                    .iter()
                    .filter_map(|row| row.scores.get(column).copied())
                    .collect();
                let total: i64 = values.iter().sum();
                round_score(safe_divide(total as f64, values.len() as f64))
            };

            ChartPoint {
                name: name.clone(),
                score,
            }
        })
        .collect()
}

pub fn student_series(table: &ScoreTable, row: &ScoreRow) -> Vec<ChartPoint> {
    table
        .columns()
        .iter()
        .zip(&row.scores)
        .map(|(name, &score)| ChartPoint {
            name: name.clone(),
            score,
        })
        .collect()
}

/// Renders a table as plain aligned text for the terminal.
pub fn render_text(table: &ScoreTable) -> String {
    let mut cells: Vec<Vec<String>> = vec![table.headers.clone()];
    for row in &table.rows {
        let mut line = vec![row.student_id.clone(), row.student_name.clone()];
        line.extend(row.scores.iter().map(|score| score.to_string()));
        cells.push(line);
    }

    let widths: Vec<usize> = (0..table.headers.len())
        .map(|column| {
            cells
                .iter()
                .filter_map(|line| line.get(column))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    for line in &cells {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(output, "{}", padded.join("  ").trim_end());
    }

    if table.rows.is_empty() {
        let _ = writeln!(output, "No data.");
    }

    output
}
