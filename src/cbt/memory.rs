// src/cbt/memory.rs
//
// In-memory implementation of the store contracts. Backs the lifecycle test
// suite and local development without a PostgreSQL instance. All state sits
// behind one mutex, which gives the same atomicity the Postgres store gets
// from transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::OptionLabel;
use super::error::StoreError;
use super::store::{
    AttemptRecord, AttemptStatus, AttemptStore, CatalogStore, CbtQuestion, CbtTest, NewAnswer,
};

struct StoredTest {
    test: CbtTest,
    school_id: i64,
    class_id: i64,
    published: bool,
}

#[derive(Default)]
struct Inner {
    tests: HashMap<i64, StoredTest>,
    questions: HashMap<i64, Vec<CbtQuestion>>,
    attempts: HashMap<i64, AttemptRecord>,
    pair_index: HashMap<(i64, i64), i64>,
    answers: HashMap<i64, Vec<NewAnswer>>,
    next_attempt_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn put_test(&self, school_id: i64, class_id: i64, published: bool, test: CbtTest) {
        let mut inner = self.inner.lock().unwrap();
        inner.tests.insert(
            test.id,
            StoredTest {
                test,
                school_id,
                class_id,
                published,
            },
        );
    }

    pub fn set_published(&self, test_id: i64, published: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.tests.get_mut(&test_id) {
            stored.published = published;
        }
    }

    /// Replaces the question set of a test, like an admin editing questions
    /// while attempts may be in flight.
    pub fn put_questions(&self, test_id: i64, questions: Vec<CbtQuestion>) {
        let mut inner = self.inner.lock().unwrap();
        inner.questions.insert(test_id, questions);
    }

    /// Persisted answer rows of an attempt, for assertions.
    pub fn stored_answers(&self, attempt_id: i64) -> Vec<NewAnswer> {
        let inner = self.inner.lock().unwrap();
        inner.answers.get(&attempt_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn published_test(
        &self,
        test_id: i64,
        school_id: i64,
        class_id: i64,
    ) -> Result<Option<CbtTest>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tests.get(&test_id).and_then(|stored| {
            if stored.published && stored.school_id == school_id && stored.class_id == class_id {
                Some(stored.test.clone())
            } else {
                None
            }
        }))
    }

    async fn questions(&self, test_id: i64) -> Result<Vec<CbtQuestion>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut questions = inner.questions.get(&test_id).cloned().unwrap_or_default();
        questions.sort_by_key(|q| (q.seq, q.id));
        Ok(questions)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn find(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<Option<AttemptRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .pair_index
            .get(&(test_id, student_id))
            .and_then(|id| inner.attempts.get(id))
            .cloned())
    }

    async fn create(
        &self,
        test_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
        total_questions: i64,
    ) -> Result<AttemptRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pair_index.contains_key(&(test_id, student_id)) {
            return Err(StoreError::Duplicate);
        }

        inner.next_attempt_id += 1;
        let id = inner.next_attempt_id;
        let record = AttemptRecord {
            id,
            test_id,
            student_id,
            status: AttemptStatus::InProgress,
            started_at,
            submitted_at: None,
            score: None,
            total_questions,
        };
        inner.attempts.insert(id, record.clone());
        inner.pair_index.insert((test_id, student_id), id);
        Ok(record)
    }

    async fn refresh_total(
        &self,
        attempt_id: i64,
        total_questions: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attempt) = inner.attempts.get_mut(&attempt_id) {
            if attempt.status == AttemptStatus::InProgress {
                attempt.total_questions = total_questions;
            }
        }
        Ok(())
    }

    async fn saved_answers(
        &self,
        attempt_id: i64,
    ) -> Result<HashMap<i64, OptionLabel>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .answers
            .get(&attempt_id)
            .map(|rows| {
                rows.iter()
                    .map(|a| (a.question_id, a.selected_option))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn finalize(
        &self,
        attempt_id: i64,
        score: i64,
        total_questions: i64,
        submitted_at: DateTime<Utc>,
        answers: &[NewAnswer],
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        // Compare-and-set under the lock, mirroring the conditional UPDATE
        // of the Postgres store.
        match inner.attempts.get_mut(&attempt_id) {
            Some(attempt) if attempt.status == AttemptStatus::InProgress => {
                attempt.status = AttemptStatus::Submitted;
                attempt.score = Some(score);
                attempt.total_questions = total_questions;
                attempt.submitted_at = Some(submitted_at);
            }
            Some(_) => return Ok(false),
            None => {
                return Err(StoreError::Unavailable(format!(
                    "attempt {} does not exist",
                    attempt_id
                )));
            }
        }

        inner.answers.insert(attempt_id, answers.to_vec());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn create_enforces_one_attempt_per_pair() {
        let store = MemoryStore::new();
        store.create(1, 7, now(), 4).await.unwrap();
        assert_eq!(store.create(1, 7, now(), 4).await, Err(StoreError::Duplicate));
        // A different pair is fine.
        store.create(1, 8, now(), 4).await.unwrap();
    }

    #[tokio::test]
    async fn finalize_is_compare_and_set() {
        let store = MemoryStore::new();
        let attempt = store.create(1, 7, now(), 4).await.unwrap();

        assert!(store.finalize(attempt.id, 3, 4, now(), &[]).await.unwrap());
        // Second finalization loses the status check and writes nothing.
        assert!(!store.finalize(attempt.id, 4, 4, now(), &[]).await.unwrap());

        let stored = store.find(1, 7).await.unwrap().unwrap();
        assert_eq!(stored.score, Some(3));
        assert_eq!(stored.status, AttemptStatus::Submitted);
    }
}
