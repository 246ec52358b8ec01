use serde::{Deserialize, Deserializer, Serialize};

/// `flatSummary` response for one course.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatSummaryResponse {
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub plos: Vec<PloRecord>,
    #[serde(default)]
    pub los: Vec<LoRecord>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub surname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PloRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub levels: Vec<LoLevelRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoLevelRecord {
    pub level: u32,
    #[serde(default)]
    pub description: String,
}

/// A question with the LO levels it assesses and every student's raw score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub max_score: f64,
    #[serde(rename = "linkedPLOs", default)]
    pub linked_plos: Vec<String>,
    /// Level keys in `"loID,level"` form.
    #[serde(rename = "linkedLOs", default)]
    pub linked_los: Vec<String>,
    #[serde(default)]
    pub results: Vec<QuestionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    #[serde(rename = "studentID")]
    pub student_id: String,
    #[serde(rename = "studentScore", default, deserialize_with = "null_as_zero")]
    pub student_score: f64,
}

/// One entry of the `ploSummary` response: a PLO and the LOs it aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PloLink {
    #[serde(rename = "ploID")]
    pub plo_id: String,
    #[serde(rename = "loID", default)]
    pub lo_ids: Vec<String>,
}

/// One quiz from the `quizResults` response. Scores are summed over the quiz's questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub quiz_name: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub max_score: f64,
    #[serde(default)]
    pub results: Vec<QuizStudentResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStudentResult {
    #[serde(rename = "studentID")]
    pub student_id: String,
    #[serde(rename = "studentName", default)]
    pub student_name: String,
    #[serde(rename = "studentScore", default, deserialize_with = "null_as_zero")]
    pub student_score: f64,
}

// Missing and null scores read as 0, like any other undefined score.
fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plo {
    pub id: String,
    pub title: String,
}

/// An entry of the flat LO map. `key` is either a bare LO id (`text` is the
/// LO title) or `"loID,level"` (`text` is the level description).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoEntry {
    pub key: String,
    pub text: String,
}

/// Aggregator input for one course. Every list is in roster/response order
/// and carries no duplicate ids.
#[derive(Debug, Clone, Default)]
pub struct FlatSummary {
    pub students: Vec<Student>,
    pub plos: Vec<Plo>,
    pub los: Vec<LoEntry>,
    pub questions: Vec<Question>,
}

impl From<FlatSummaryResponse> for FlatSummary {
    fn from(response: FlatSummaryResponse) -> Self {
        let mut summary = FlatSummary::default();

        for student in response.students {
            let name = format!("{} {}", student.name, student.surname)
                .trim()
                .to_string();
            upsert(
                &mut summary.students,
                |s| s.id == student.id,
                Student {
                    id: student.id.clone(),
                    name,
                },
            );
        }

        for plo in response.plos {
            upsert(
                &mut summary.plos,
                |p| p.id == plo.id,
                Plo {
                    id: plo.id.clone(),
                    title: plo.title,
                },
            );
        }

        for lo in response.los {
            upsert(
                &mut summary.los,
                |e| e.key == lo.id,
                LoEntry {
                    key: lo.id.clone(),
                    text: lo.title,
                },
            );
            for level in lo.levels {
                let key = format!("{},{}", lo.id, level.level);
                upsert(
                    &mut summary.los,
                    |e| e.key == key,
                    LoEntry {
                        key: key.clone(),
                        text: level.description,
                    },
                );
            }
        }

        summary.questions = response.questions;
        summary
    }
}

// A repeated id replaces the earlier value but keeps its position.
fn upsert<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool, value: T) {
    match items.iter_mut().find(|item| matches(item)) {
        Some(existing) => *existing = value,
        None => items.push(value),
    }
}

/// One table row: a student and their scores in header column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRow {
    #[serde(rename = "studentID")]
    pub student_id: String,
    pub student_name: String,
    pub scores: Vec<i64>,
}

/// Headers start with the fixed `Student ID` / `Student Name` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub headers: Vec<String>,
    pub rows: Vec<ScoreRow>,
    /// Score columns (counted after the student columns) of PLOs with no
    /// linked LOs. Their cells hold a marker, not a score.
    #[serde(rename = "unlinkedColumns", default, skip_serializing_if = "Vec::is_empty")]
    pub unlinked_columns: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub score: i64,
}

/// Everything the dashboard derives from a flat summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeScores {
    pub lo: ScoreTable,
    pub plo: ScoreTable,
    /// `[student][lo][level]` percentages, in the same order as `lo`.
    pub level_scores: Vec<Vec<Vec<f64>>>,
}
