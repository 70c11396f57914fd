// tests/cbt_lifecycle_tests.rs
//
// Drives the attempt lifecycle engine against the in-memory store with an
// explicit clock. No database required.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

use portal::cbt::{
    AttemptStatus, AttemptStore, CbtError, CbtQuestion, CbtTest, LifecycleEngine, OptionLabel,
    StudentRef, memory::MemoryStore,
};

const TEST_ID: i64 = 10;
const SCHOOL: i64 = 1;
const CLASS: i64 = 2;

fn student() -> StudentRef {
    StudentRef {
        student_id: 7,
        school_id: SCHOOL,
        class_id: CLASS,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn question(id: i64, correct: OptionLabel) -> CbtQuestion {
    CbtQuestion {
        id,
        test_id: TEST_ID,
        question_text: format!("Question {}", id),
        option_a: "Option A".to_string(),
        option_b: "Option B".to_string(),
        option_c: "Option C".to_string(),
        option_d: "Option D".to_string(),
        correct_option: correct,
        seq: id,
    }
}

/// Seeds a published 10-minute test with four questions keyed A, B, C, D.
fn seed_test(
    store: &MemoryStore,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) {
    store.put_test(
        SCHOOL,
        CLASS,
        true,
        CbtTest {
            id: TEST_ID,
            title: "First Term CBT".to_string(),
            duration_minutes: 10,
            starts_at,
            ends_at,
        },
    );
    store.put_questions(
        TEST_ID,
        vec![
            question(1, OptionLabel::A),
            question(2, OptionLabel::B),
            question(3, OptionLabel::C),
            question(4, OptionLabel::D),
        ],
    );
}

fn engine(store: &MemoryStore) -> LifecycleEngine<MemoryStore, MemoryStore> {
    LifecycleEngine::new(store.clone(), store.clone())
}

fn answers(pairs: &[(i64, &str)]) -> HashMap<i64, String> {
    pairs
        .iter()
        .map(|(id, raw)| (*id, raw.to_string()))
        .collect()
}

#[tokio::test]
async fn begin_creates_attempt_with_ordered_questions() {
    // Arrange
    let store = MemoryStore::new();
    seed_test(&store, None, None);

    // Act
    let outcome = engine(&store)
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .expect("begin failed");

    // Assert
    assert_eq!(outcome.remaining_seconds, 600);
    let ids: Vec<i64> = outcome.questions.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert!(outcome.saved_answers.is_empty());

    let attempt = store.find(TEST_ID, 7).await.unwrap().expect("no row");
    assert_eq!(attempt.id, outcome.attempt_id);
    assert_eq!(attempt.status, AttemptStatus::InProgress);
    assert_eq!(attempt.started_at, t0());
    assert_eq!(attempt.total_questions, 4);
}

#[tokio::test]
async fn repeated_begin_reuses_attempt_and_counts_down() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    let first = engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();
    let second = engine
        .begin_or_resume(TEST_ID, student(), t0() + Duration::seconds(60))
        .await
        .unwrap();
    let third = engine
        .begin_or_resume(TEST_ID, student(), t0() + Duration::seconds(60))
        .await
        .unwrap();

    // Same attempt row every time, never a second one.
    assert_eq!(first.attempt_id, second.attempt_id);
    assert_eq!(second.attempt_id, third.attempt_id);

    // The timer is computed from the original start: monotonically
    // non-increasing across calls, regardless of what the client claims.
    assert_eq!(first.remaining_seconds, 600);
    assert_eq!(second.remaining_seconds, 540);
    assert_eq!(third.remaining_seconds, 540);

    let attempt = store.find(TEST_ID, 7).await.unwrap().unwrap();
    assert_eq!(attempt.started_at, t0());
}

#[tokio::test]
async fn begin_before_window_opens_is_rejected() {
    let store = MemoryStore::new();
    seed_test(&store, Some(t0() + Duration::hours(1)), None);

    let err = engine(&store)
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap_err();

    assert_eq!(err, CbtError::NotStarted);
    assert!(store.find(TEST_ID, 7).await.unwrap().is_none());
}

#[tokio::test]
async fn begin_after_window_closes_creates_no_attempt() {
    let store = MemoryStore::new();
    seed_test(&store, None, Some(t0() - Duration::minutes(1)));

    let err = engine(&store)
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap_err();

    assert_eq!(err, CbtError::Closed);
    assert!(store.find(TEST_ID, 7).await.unwrap().is_none());
}

#[tokio::test]
async fn unpublished_test_and_wrong_class_are_not_eligible() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    store.set_published(TEST_ID, false);

    let err = engine(&store)
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap_err();
    assert_eq!(err, CbtError::NotEligible);

    store.set_published(TEST_ID, true);
    let wrong_class = StudentRef {
        student_id: 7,
        school_id: SCHOOL,
        class_id: 99,
    };
    let err = engine(&store)
        .begin_or_resume(TEST_ID, wrong_class, t0())
        .await
        .unwrap_err();
    assert_eq!(err, CbtError::NotEligible);
}

#[tokio::test]
async fn test_without_questions_is_rejected() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    store.put_questions(TEST_ID, vec![]);

    let err = engine(&store)
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap_err();

    assert_eq!(err, CbtError::NoQuestions);
    assert!(store.find(TEST_ID, 7).await.unwrap().is_none());
}

#[tokio::test]
async fn resume_after_time_allowance_is_rejected() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();

    // 11 minutes into a 10-minute test.
    let err = engine
        .begin_or_resume(TEST_ID, student(), t0() + Duration::minutes(11))
        .await
        .unwrap_err();

    assert_eq!(err, CbtError::TimeExpired);

    // No automatic finalization; the row stays in progress until an
    // explicit submit.
    let attempt = store.find(TEST_ID, 7).await.unwrap().unwrap();
    assert_eq!(attempt.status, AttemptStatus::InProgress);
}

#[tokio::test]
async fn submit_scores_answers_and_skips_malformed_selections() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    let begun = engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();

    // Correct keys are [A, B, C, D]; "X" is not a valid option.
    let outcome = engine
        .submit(
            TEST_ID,
            begun.attempt_id,
            student(),
            &answers(&[(1, "A"), (2, "b"), (3, "X"), (4, "D")]),
            t0() + Duration::minutes(5),
        )
        .await
        .expect("submit failed");

    assert_eq!(outcome.score, 3);
    assert_eq!(outcome.total_questions, 4);

    // The malformed selection produced no answer row: unanswered, not
    // wrong, and not an error.
    let stored = store.stored_answers(begun.attempt_id);
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|a| a.question_id != 3));
    let correct = stored.iter().filter(|a| a.is_correct).count() as i64;
    assert_eq!(correct, outcome.score);
    assert!(outcome.score <= outcome.total_questions);

    let attempt = store.find(TEST_ID, 7).await.unwrap().unwrap();
    assert_eq!(attempt.status, AttemptStatus::Submitted);
    assert_eq!(attempt.score, Some(3));
    assert_eq!(attempt.submitted_at, Some(t0() + Duration::minutes(5)));
}

#[tokio::test]
async fn second_submit_reports_already_submitted_and_keeps_score() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    let begun = engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();

    engine
        .submit(
            TEST_ID,
            begun.attempt_id,
            student(),
            &answers(&[(1, "A")]),
            t0() + Duration::minutes(2),
        )
        .await
        .unwrap();

    // A retry with better answers changes nothing.
    let err = engine
        .submit(
            TEST_ID,
            begun.attempt_id,
            student(),
            &answers(&[(1, "A"), (2, "B"), (3, "C"), (4, "D")]),
            t0() + Duration::minutes(3),
        )
        .await
        .unwrap_err();
    assert_eq!(err, CbtError::AlreadySubmitted);

    let attempt = store.find(TEST_ID, 7).await.unwrap().unwrap();
    assert_eq!(attempt.score, Some(1));
    assert_eq!(attempt.submitted_at, Some(t0() + Duration::minutes(2)));

    // Begin after submission never re-enters the in-progress state.
    let err = engine
        .begin_or_resume(TEST_ID, student(), t0() + Duration::minutes(4))
        .await
        .unwrap_err();
    assert_eq!(err, CbtError::AlreadySubmitted);
}

#[tokio::test]
async fn submit_after_expiry_still_scores() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    let begun = engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();

    // Resuming at 11 minutes is blocked...
    let err = engine
        .begin_or_resume(TEST_ID, student(), t0() + Duration::minutes(11))
        .await
        .unwrap_err();
    assert_eq!(err, CbtError::TimeExpired);

    // ...but handing in the existing attempt is still accepted and graded.
    // The deadline gates starting and resuming, not submission.
    let outcome = engine
        .submit(
            TEST_ID,
            begun.attempt_id,
            student(),
            &answers(&[(1, "A"), (2, "B")]),
            t0() + Duration::minutes(11),
        )
        .await
        .expect("late submit should score");

    assert_eq!(outcome.score, 2);
    assert_eq!(outcome.total_questions, 4);
}

#[tokio::test]
async fn submit_rejects_mismatched_attempt_student_or_test() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    let begun = engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();

    // Forged attempt id.
    let err = engine
        .submit(
            TEST_ID,
            begun.attempt_id + 999,
            student(),
            &answers(&[(1, "A")]),
            t0(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, CbtError::AttemptMismatch);

    // Another student trying to submit with a stolen attempt id.
    let intruder = StudentRef {
        student_id: 8,
        school_id: SCHOOL,
        class_id: CLASS,
    };
    let err = engine
        .submit(TEST_ID, begun.attempt_id, intruder, &answers(&[(1, "A")]), t0())
        .await
        .unwrap_err();
    assert_eq!(err, CbtError::AttemptMismatch);

    // The real owner is unaffected.
    let attempt = store.find(TEST_ID, 7).await.unwrap().unwrap();
    assert_eq!(attempt.status, AttemptStatus::InProgress);
}

#[tokio::test]
async fn concurrent_submits_resolve_to_one_winner() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    let begun = engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();

    let all_correct = answers(&[(1, "A"), (2, "B"), (3, "C"), (4, "D")]);
    let one_correct = answers(&[(1, "A"), (2, "A"), (3, "A"), (4, "A")]);

    let first = engine.submit(
        TEST_ID,
        begun.attempt_id,
        student(),
        &all_correct,
        t0() + Duration::minutes(5),
    );
    let second = engine.submit(
        TEST_ID,
        begun.attempt_id,
        student(),
        &one_correct,
        t0() + Duration::minutes(5),
    );
    let (first, second) = tokio::join!(first, second);

    // Exactly one winner; the loser observes the already-submitted state.
    let outcomes = [first, second];
    let wins: Vec<_> = outcomes.iter().filter(|r| r.is_ok()).collect();
    assert_eq!(wins.len(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| r.as_ref().err() == Some(&CbtError::AlreadySubmitted))
    );

    // The stored score reflects exactly one scoring pass.
    let winner_score = wins[0].as_ref().unwrap().score;
    let attempt = store.find(TEST_ID, 7).await.unwrap().unwrap();
    assert_eq!(attempt.score, Some(winner_score));
    let stored_correct = store
        .stored_answers(begun.attempt_id)
        .iter()
        .filter(|a| a.is_correct)
        .count() as i64;
    assert_eq!(stored_correct, winner_score);
}

#[tokio::test]
async fn question_set_edits_refresh_the_snapshot() {
    let store = MemoryStore::new();
    seed_test(&store, None, None);
    let engine = engine(&store);

    engine
        .begin_or_resume(TEST_ID, student(), t0())
        .await
        .unwrap();

    // An admin adds a fifth question while the attempt is in flight.
    store.put_questions(
        TEST_ID,
        vec![
            question(1, OptionLabel::A),
            question(2, OptionLabel::B),
            question(3, OptionLabel::C),
            question(4, OptionLabel::D),
            question(5, OptionLabel::A),
        ],
    );

    let resumed = engine
        .begin_or_resume(TEST_ID, student(), t0() + Duration::seconds(30))
        .await
        .unwrap();

    assert_eq!(resumed.questions.len(), 5);
    let attempt = store.find(TEST_ID, 7).await.unwrap().unwrap();
    assert_eq!(attempt.total_questions, 5);
}
