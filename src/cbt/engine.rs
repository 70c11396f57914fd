// src/cbt/engine.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::OptionLabel;
use super::error::{CbtError, StoreError};
use super::store::{AttemptStatus, AttemptStore, CatalogStore, CbtQuestion, NewAnswer};

/// The caller's identity, passed explicitly into every operation. The engine
/// never reads session or other ambient state.
#[derive(Debug, Clone, Copy)]
pub struct StudentRef {
    pub student_id: i64,
    pub school_id: i64,
    pub class_id: i64,
}

/// Question view served to the student taking the test. The answer key is
/// deliberately absent.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub seq: i64,
}

impl From<CbtQuestion> for PublicQuestion {
    fn from(q: CbtQuestion) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text,
            option_a: q.option_a,
            option_b: q.option_b,
            option_c: q.option_c,
            option_d: q.option_d,
            seq: q.seq,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BeginOutcome {
    pub attempt_id: i64,
    pub remaining_seconds: i64,
    pub questions: Vec<PublicQuestion>,
    /// question id -> previously recorded selection.
    pub saved_answers: HashMap<i64, OptionLabel>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SubmitOutcome {
    pub score: i64,
    pub total_questions: i64,
}

/// The attempt state machine: NotStarted (no row) -> InProgress -> Submitted.
/// Submitted is terminal; every later call reports `AlreadySubmitted`.
pub struct LifecycleEngine<C, A> {
    catalog: C,
    attempts: A,
}

impl<C: CatalogStore, A: AttemptStore> LifecycleEngine<C, A> {
    pub fn new(catalog: C, attempts: A) -> Self {
        LifecycleEngine { catalog, attempts }
    }

    /// Opens a new attempt or resumes the existing one for (test, student).
    ///
    /// Never creates a second row for the pair and never rewinds
    /// `started_at`: the remaining time is computed server-side from the
    /// original start, so the client clock is irrelevant.
    pub async fn begin_or_resume(
        &self,
        test_id: i64,
        student: StudentRef,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome, CbtError> {
        let test = self
            .catalog
            .published_test(test_id, student.school_id, student.class_id)
            .await?
            .ok_or(CbtError::NotEligible)?;

        if let Some(starts_at) = test.starts_at {
            if now < starts_at {
                return Err(CbtError::NotStarted);
            }
        }
        if let Some(ends_at) = test.ends_at {
            if now > ends_at {
                return Err(CbtError::Closed);
            }
        }

        // Reject before touching attempt state so a closed or empty test
        // never leaves a row behind.
        let questions = self.catalog.questions(test_id).await?;
        if questions.is_empty() {
            return Err(CbtError::NoQuestions);
        }
        let total = questions.len() as i64;

        let attempt = match self.attempts.find(test_id, student.student_id).await? {
            Some(attempt) => attempt,
            None => match self
                .attempts
                .create(test_id, student.student_id, now, total)
                .await
            {
                Ok(attempt) => attempt,
                // Lost the creation race; the winner's row is authoritative.
                Err(StoreError::Duplicate) => self
                    .attempts
                    .find(test_id, student.student_id)
                    .await?
                    .ok_or_else(|| CbtError::Transient("attempt row vanished".to_string()))?,
                Err(err) => return Err(err.into()),
            },
        };

        if attempt.status == AttemptStatus::Submitted {
            return Err(CbtError::AlreadySubmitted);
        }

        if attempt.total_questions != total {
            self.attempts.refresh_total(attempt.id, total).await?;
        }

        let remaining = remaining_seconds(test.duration_minutes, attempt.started_at, now);
        if remaining <= 0 {
            // Hard stop. The attempt stays in_progress; finalization only
            // ever happens through an explicit submit.
            return Err(CbtError::TimeExpired);
        }

        let saved_answers = self.attempts.saved_answers(attempt.id).await?;

        Ok(BeginOutcome {
            attempt_id: attempt.id,
            remaining_seconds: remaining,
            questions: questions.into_iter().map(PublicQuestion::from).collect(),
            saved_answers,
        })
    }

    /// Scores and finalizes an in-progress attempt. Atomic: either the
    /// attempt flips to submitted with its full answer set, or nothing
    /// changes. Exactly one submit per attempt ever succeeds.
    ///
    /// An attempt begun inside the window may still be submitted after its
    /// time allowance has run out; the deadline gates starting and resuming,
    /// not handing in.
    pub async fn submit(
        &self,
        test_id: i64,
        attempt_id: i64,
        student: StudentRef,
        raw_answers: &HashMap<i64, String>,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, CbtError> {
        let test = self
            .catalog
            .published_test(test_id, student.school_id, student.class_id)
            .await?
            .ok_or(CbtError::NotEligible)?;

        if let Some(starts_at) = test.starts_at {
            if now < starts_at {
                return Err(CbtError::NotStarted);
            }
        }

        // The attempt must belong to exactly this (test, student, id)
        // triple; a forged attempt id from another student or test fails
        // here.
        let attempt = self
            .attempts
            .find(test_id, student.student_id)
            .await?
            .ok_or(CbtError::AttemptMismatch)?;
        if attempt.id != attempt_id {
            return Err(CbtError::AttemptMismatch);
        }
        if attempt.status == AttemptStatus::Submitted {
            return Err(CbtError::AlreadySubmitted);
        }

        let questions = self.catalog.questions(test_id).await?;
        if questions.is_empty() {
            return Err(CbtError::NoQuestions);
        }

        let (score, answers) = grade(&questions, raw_answers);
        let total = questions.len() as i64;

        let updated = self
            .attempts
            .finalize(attempt.id, score, total, now, &answers)
            .await?;
        if !updated {
            // A concurrent submit won the compare-and-set.
            return Err(CbtError::AlreadySubmitted);
        }

        Ok(SubmitOutcome {
            score,
            total_questions: total,
        })
    }
}

/// Seconds left on the attempt clock. Negative when the allowance is spent.
pub fn remaining_seconds(
    duration_minutes: i64,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    duration_minutes * 60 - (now - started_at).num_seconds()
}

/// Grades raw client selections against the question set.
///
/// A selection that is missing or does not parse as one of A-D produces no
/// answer row at all: unanswered, not wrong, never an error. Returns the
/// score and the answer rows to persist.
fn grade(questions: &[CbtQuestion], raw_answers: &HashMap<i64, String>) -> (i64, Vec<NewAnswer>) {
    let mut score = 0;
    let mut answers = Vec::new();

    for question in questions {
        let Some(selected) = raw_answers
            .get(&question.id)
            .and_then(|raw| OptionLabel::parse(raw))
        else {
            continue;
        };

        let is_correct = selected == question.correct_option;
        if is_correct {
            score += 1;
        }
        answers.push(NewAnswer {
            question_id: question.id,
            selected_option: selected,
            is_correct,
        });
    }

    (score, answers)
}

/// Percentage for downstream reporting, rounded to two decimals.
pub fn percentage(score: i64, total_questions: i64) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    (score as f64 / total_questions as f64 * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn question(id: i64, correct: OptionLabel) -> CbtQuestion {
        CbtQuestion {
            id,
            test_id: 1,
            question_text: format!("Question {}", id),
            option_a: "a".to_string(),
            option_b: "b".to_string(),
            option_c: "c".to_string(),
            option_d: "d".to_string(),
            correct_option: correct,
            seq: id,
        }
    }

    #[test]
    fn grade_counts_correct_answers_only() {
        let questions = vec![
            question(1, OptionLabel::A),
            question(2, OptionLabel::B),
            question(3, OptionLabel::C),
            question(4, OptionLabel::D),
        ];
        let mut raw = HashMap::new();
        raw.insert(1, "A".to_string());
        raw.insert(2, "b".to_string()); // case-insensitive
        raw.insert(3, "X".to_string()); // malformed -> unanswered
        raw.insert(4, "D".to_string());

        let (score, answers) = grade(&questions, &raw);
        assert_eq!(score, 3);
        // No row for the malformed selection.
        assert_eq!(answers.len(), 3);
        assert!(answers.iter().all(|a| a.question_id != 3));
        assert!(score <= questions.len() as i64);
    }

    #[test]
    fn grade_ignores_selections_for_unknown_questions() {
        let questions = vec![question(1, OptionLabel::A)];
        let mut raw = HashMap::new();
        raw.insert(1, "B".to_string());
        raw.insert(99, "A".to_string()); // not part of the test

        let (score, answers) = grade(&questions, &raw);
        assert_eq!(score, 0);
        assert_eq!(answers.len(), 1);
        assert!(!answers[0].is_correct);
    }

    #[test]
    fn grade_with_no_selections_scores_zero() {
        let questions = vec![question(1, OptionLabel::A), question(2, OptionLabel::B)];
        let (score, answers) = grade(&questions, &HashMap::new());
        assert_eq!(score, 0);
        assert!(answers.is_empty());
    }

    #[test]
    fn remaining_seconds_counts_down_from_started_at() {
        let started = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 4, 0).unwrap();
        assert_eq!(remaining_seconds(10, started, now), 360);

        let late = Utc.with_ymd_and_hms(2026, 3, 2, 9, 11, 0).unwrap();
        assert_eq!(remaining_seconds(10, started, late), -60);
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(4, 4), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
