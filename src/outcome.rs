//! LO and PLO score aggregation.
//!
//! Question results are averaged per LO level, level averages are rolled up
//! into one score per LO, and LO scores are rolled up into PLO scores through
//! the PLO link table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{FlatSummary, OutcomeScores, Plo, PloLink, ScoreRow, ScoreTable, Student};

pub const STUDENT_ID_HEADER: &str = "Student ID";
pub const STUDENT_NAME_HEADER: &str = "Student Name";

/// Score reported for a PLO with no linked LOs. Not a percentage.
pub const UNLINKED_PLO_SCORE: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("invalid LO level key `{key}` (expected `loID,level` with level >= 1)")]
    InvalidLevelKey { key: String },
    #[error("LO `{lo_id}` is referenced but not defined in the summary")]
    UnknownLo { lo_id: String },
    #[error("LO `{lo_id}` has no level {level}")]
    UnknownLevel { lo_id: String, level: u32 },
    #[error("PLO `{plo_id}` links to unknown LO `{lo_id}`")]
    UnknownPloLo { plo_id: String, lo_id: String },
    #[error("PLO link table names unknown PLO `{plo_id}`")]
    UnknownPlo { plo_id: String },
}

/// How LO scores are reduced to a PLO score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PloRollup {
    /// `round(sum / n)`.
    #[default]
    Mean,
    /// `round(sum / (n + 1)) - 1`, as older dashboards reported it.
    Legacy,
}

impl PloRollup {
    pub fn rollup(self, sum: f64, linked: usize) -> i64 {
        if linked == 0 {
            return UNLINKED_PLO_SCORE;
        }
        match self {
            PloRollup::Mean => round_score(safe_divide(sum, linked as f64)),
            PloRollup::Legacy => round_score(safe_divide(sum, linked as f64 + 1.0)) - 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub plo_rollup: PloRollup,
    /// LO titles are cut to this many characters in table headers.
    pub lo_header_width: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            plo_rollup: PloRollup::Mean,
            lo_header_width: 4,
        }
    }
}

/// Returns 0 instead of NaN or infinity.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let quotient = numerator / denominator;
    if quotient.is_finite() {
        quotient
    } else {
        0.0
    }
}

/// Rounds half away from zero.
pub fn round_score(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}

pub fn truncate_title(title: &str, width: usize) -> String {
    title.chars().take(width).collect()
}

pub fn score_headers(columns: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut headers = vec![
        STUDENT_ID_HEADER.to_string(),
        STUDENT_NAME_HEADER.to_string(),
    ];
    headers.extend(columns);
    headers
}

/// A parsed flat LO key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoKey {
    Outcome(String),
    Level { lo_id: String, level: u32 },
}

impl LoKey {
    pub fn parse(key: &str) -> Result<Self, AggregateError> {
        let Some((lo_id, level)) = key.split_once(',') else {
            return Ok(LoKey::Outcome(key.to_string()));
        };

        let invalid = || AggregateError::InvalidLevelKey {
            key: key.to_string(),
        };
        let level: u32 = level.trim().parse().map_err(|_| invalid())?;
        if lo_id.is_empty() || level == 0 {
            return Err(invalid());
        }

        Ok(LoKey::Level {
            lo_id: lo_id.to_string(),
            level,
        })
    }
}

#[derive(Debug, Clone)]
struct IndexedLo {
    id: String,
    title: String,
    /// Ascending level numbers; a level's column is its position here.
    levels: Vec<u32>,
}

#[derive(Debug)]
struct OutcomeIndex {
    los: Vec<IndexedLo>,
    lo_positions: HashMap<String, usize>,
    plos: Vec<Plo>,
    plo_positions: HashMap<String, usize>,
}

impl OutcomeIndex {
    fn build(summary: &FlatSummary) -> Result<Self, AggregateError> {
        let mut los: Vec<IndexedLo> = Vec::new();
        let mut level_entries: Vec<(String, u32)> = Vec::new();

        for entry in &summary.los {
            match LoKey::parse(&entry.key)? {
                LoKey::Outcome(id) => los.push(IndexedLo {
                    id,
                    title: entry.text.clone(),
                    levels: Vec::new(),
                }),
                LoKey::Level { lo_id, level } => level_entries.push((lo_id, level)),
            }
        }

        los.sort_by_key(|lo| lo.title.to_lowercase());
        let lo_positions: HashMap<String, usize> = los
            .iter()
            .enumerate()
            .map(|(i, lo)| (lo.id.clone(), i))
            .collect();

        for (lo_id, level) in level_entries {
            let position = *lo_positions
                .get(&lo_id)
                .ok_or(AggregateError::UnknownLo { lo_id })?;
            los[position].levels.push(level);
        }
        for lo in los.iter_mut() {
            lo.levels.sort_unstable();
            lo.levels.dedup();
        }

        let mut plos = summary.plos.clone();
        plos.sort_by_key(|plo| plo.title.to_lowercase());
        let plo_positions = plos
            .iter()
            .enumerate()
            .map(|(i, plo)| (plo.id.clone(), i))
            .collect();

        debug!(
            los = los.len(),
            plos = plos.len(),
            "built outcome index"
        );

        Ok(Self {
            los,
            lo_positions,
            plos,
            plo_positions,
        })
    }

    /// Maps a `"loID,level"` key to its (LO column, level column).
    fn locate(&self, key: &str) -> Result<(usize, usize), AggregateError> {
        let LoKey::Level { lo_id, level } = LoKey::parse(key)? else {
            return Err(AggregateError::InvalidLevelKey {
                key: key.to_string(),
            });
        };
        let lo_idx = *self
            .lo_positions
            .get(&lo_id)
            .ok_or_else(|| AggregateError::UnknownLo {
                lo_id: lo_id.clone(),
            })?;
        let level_idx = self.los[lo_idx]
            .levels
            .binary_search(&level)
            .map_err(|_| AggregateError::UnknownLevel { lo_id, level })?;
        Ok((lo_idx, level_idx))
    }

    /// LO columns linked to each PLO, in PLO column order.
    fn plo_link_columns(&self, links: &[PloLink]) -> Result<Vec<Vec<usize>>, AggregateError> {
        let mut columns = vec![Vec::new(); self.plos.len()];

        for link in links {
            let plo_idx = *self
                .plo_positions
                .get(&link.plo_id)
                .ok_or_else(|| AggregateError::UnknownPlo {
                    plo_id: link.plo_id.clone(),
                })?;
            let linked = link
                .lo_ids
                .iter()
                .map(|lo_id| {
                    self.lo_positions
                        .get(lo_id)
                        .copied()
                        .ok_or_else(|| AggregateError::UnknownPloLo {
                            plo_id: link.plo_id.clone(),
                            lo_id: lo_id.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            columns[plo_idx] = linked;
        }

        Ok(columns)
    }
}

/// Computes the LO and PLO score tables for every student on the roster.
///
/// Results from students who are not on the roster are ignored. An empty
/// roster or an empty question list produces tables with headers and no rows.
pub fn aggregate(
    summary: &FlatSummary,
    plo_links: &[PloLink],
    options: &AggregateOptions,
) -> Result<OutcomeScores, AggregateError> {
    let index = OutcomeIndex::build(summary)?;
    let link_columns = index.plo_link_columns(plo_links)?;

    let lo_headers = score_headers(
        index
            .los
            .iter()
            .map(|lo| truncate_title(&lo.title, options.lo_header_width)),
    );
    let plo_headers = score_headers(index.plos.iter().map(|plo| plo.title.clone()));

    let students: &[Student] = if summary.questions.is_empty() {
        &[]
    } else {
        &summary.students
    };

    let level_scores = score_levels(summary, &index, students)?;
    let lo_scores = rollup_los(&level_scores);
    let plo_scores = rollup_plos(&lo_scores, &link_columns, options.plo_rollup);
    let unlinked_columns = link_columns
        .iter()
        .enumerate()
        .filter(|(_, columns)| columns.is_empty())
        .map(|(column, _)| column)
        .collect();

    Ok(OutcomeScores {
        lo: ScoreTable {
            headers: lo_headers,
            rows: to_rows(students, lo_scores),
            unlinked_columns: Vec::new(),
        },
        plo: ScoreTable {
            headers: plo_headers,
            rows: to_rows(students, plo_scores),
            unlinked_columns,
        },
        level_scores,
    })
}

fn score_levels(
    summary: &FlatSummary,
    index: &OutcomeIndex,
    students: &[Student],
) -> Result<Vec<Vec<Vec<f64>>>, AggregateError> {
    let student_positions: HashMap<&str, usize> = students
        .iter()
        .enumerate()
        .map(|(i, student)| (student.id.as_str(), i))
        .collect();

    let empty: Vec<Vec<f64>> = index
        .los
        .iter()
        .map(|lo| vec![0.0; lo.levels.len()])
        .collect();
    let mut sums = vec![empty.clone(); students.len()];
    let mut counts = vec![empty; students.len()];

    for question in &summary.questions {
        for key in &question.linked_los {
            let (lo_idx, level_idx) = index.locate(key)?;
            for result in &question.results {
                let Some(&student_idx) = student_positions.get(result.student_id.as_str()) else {
                    debug!(
                        student = %result.student_id,
                        question = %question.title,
                        "skipping result for student outside the roster"
                    );
                    continue;
                };
                let percent = safe_divide(result.student_score * 100.0, question.max_score);
                sums[student_idx][lo_idx][level_idx] += percent;
                counts[student_idx][lo_idx][level_idx] += 1.0;
            }
        }
    }

    for (student_sums, student_counts) in sums.iter_mut().zip(&counts) {
        for (lo_sums, lo_counts) in student_sums.iter_mut().zip(student_counts) {
            for (sum, count) in lo_sums.iter_mut().zip(lo_counts) {
                *sum = safe_divide(*sum, *count);
            }
        }
    }

    Ok(sums)
}

fn rollup_los(level_scores: &[Vec<Vec<f64>>]) -> Vec<Vec<i64>> {
    level_scores
        .iter()
        .map(|student| {
            student
                .iter()
                .map(|levels| {
                    let total: f64 = levels.iter().sum();
                    round_score(safe_divide(total, levels.len() as f64))
                })
                .collect()
        })
        .collect()
}

fn rollup_plos(
    lo_scores: &[Vec<i64>],
    link_columns: &[Vec<usize>],
    policy: PloRollup,
) -> Vec<Vec<i64>> {
    lo_scores
        .iter()
        .map(|student| {
            link_columns
                .iter()
                .map(|columns| {
                    let sum: f64 = columns.iter().map(|&c| student[c] as f64).sum();
                    policy.rollup(sum, columns.len())
                })
                .collect()
        })
        .collect()
}

fn to_rows(students: &[Student], scores: Vec<Vec<i64>>) -> Vec<ScoreRow> {
    students
        .iter()
        .zip(scores)
        .map(|(student, scores)| ScoreRow {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            scores,
        })
        .collect()
}
