use crate::models::{QuizResult, ScoreRow, ScoreTable, Student};
use crate::outcome::{round_score, safe_divide, score_headers, truncate_title};

/// Per-quiz percentage for every roster student. A missing result scores 0.
pub fn quiz_table(quizzes: &[QuizResult], roster: &[Student], header_width: usize) -> ScoreTable {
    let headers = score_headers(
        quizzes
            .iter()
            .map(|quiz| truncate_title(&quiz.quiz_name, header_width)),
    );

    let rows = roster
        .iter()
        .map(|student| ScoreRow {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            scores: quizzes
                .iter()
                .map(|quiz| quiz_percent(quiz, &student.id))
                .collect(),
        })
        .collect();

    ScoreTable {
        headers,
        rows,
        unlinked_columns: Vec::new(),
    }
}

pub fn quiz_percent(quiz: &QuizResult, student_id: &str) -> i64 {
    quiz.results
        .iter()
        .find(|result| result.student_id == student_id)
        .map(|result| round_score(safe_divide(result.student_score * 100.0, quiz.max_score)))
        .unwrap_or(0)
}

/// Students in the order they first appear across the quiz results.
pub fn roster_from_results(quizzes: &[QuizResult]) -> Vec<Student> {
    let mut roster: Vec<Student> = Vec::new();

    for result in quizzes.iter().flat_map(|quiz| quiz.results.iter()) {
        if !roster.iter().any(|s| s.id == result.student_id) {
            roster.push(Student {
                id: result.student_id.clone(),
                name: result.student_name.clone(),
            });
        }
    }

    roster
}
