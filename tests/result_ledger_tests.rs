use campus_portal::{
    AppError,
    auth::{Argon2Hasher, AuthUser, HasherState},
    identity::IdentityStore,
    models::{RecordResultRequest, RegisterAccountRequest},
    repository::{InMemoryRepository, RepositoryState},
    results::ResultLedger,
};
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    identity: IdentityStore,
    ledger: ResultLedger,
}

fn harness() -> Harness {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let hasher = Arc::new(Argon2Hasher::new(64).unwrap()) as HasherState;
    Harness {
        identity: IdentityStore::new(repo.clone(), hasher),
        ledger: ResultLedger::new(repo),
    }
}

impl Harness {
    async fn account(&self, username: &str, role: i64) -> AuthUser {
        let account = self
            .identity
            .register(RegisterAccountRequest {
                username: Some(username.to_string()),
                password: Some("pw".to_string()),
                email: Some(format!("{username}@college.edu")),
                role_level: Some(role),
            })
            .await
            .unwrap();
        AuthUser::from(&account)
    }
}

fn subjects(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("CS10{i}")).collect()
}

#[tokio::test]
async fn test_total_is_mean_of_marks() {
    let h = harness();
    let alice = h.account("alice", 1).await;

    let result = h
        .ledger
        .record(alice.id, 1, subjects(4), vec![60.0, 70.0, 80.0, 90.0])
        .await
        .unwrap();
    assert_eq!(result.total, 75.0);
    assert_eq!(result.subjects, subjects(4));
}

#[tokio::test]
async fn test_total_of_huge_marks_stays_finite() {
    let h = harness();
    let alice = h.account("alice", 1).await;

    let result = h
        .ledger
        .record(alice.id, 1, subjects(2), vec![1e308, 1e308])
        .await
        .unwrap();
    assert!(result.total.is_finite());
    assert_eq!(result.total, 1e308);
    assert_eq!(serde_json::to_value(&result).unwrap()["total"], 1e308);
}

#[tokio::test]
async fn test_reingestion_keeps_the_first_row() {
    let h = harness();
    let alice = h.account("alice", 1).await;
    h.ledger
        .record(alice.id, 3, subjects(2), vec![50.0, 70.0])
        .await
        .unwrap();

    let err = h
        .ledger
        .record(alice.id, 3, subjects(2), vec![100.0, 100.0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let rows = h.ledger.list(&alice).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total, 60.0);
}

#[tokio::test]
async fn test_mismatched_lengths_are_rejected() {
    let h = harness();
    let alice = h.account("alice", 1).await;

    let err = h
        .ledger
        .record(alice.id, 1, subjects(3), vec![40.0, 50.0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = h
        .ledger
        .record(alice.id, 1, vec![], vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(h.ledger.list(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let h = harness();
    let err = h
        .ledger
        .record(Uuid::new_v4(), 1, subjects(1), vec![88.0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_list_is_own_rows_by_semester() {
    let h = harness();
    let alice = h.account("alice", 1).await;
    let bob = h.account("bob", 1).await;

    for semester in [4, 1, 2] {
        h.ledger
            .record(alice.id, semester, subjects(1), vec![70.0])
            .await
            .unwrap();
    }
    h.ledger
        .record(bob.id, 1, subjects(1), vec![90.0])
        .await
        .unwrap();

    let semesters: Vec<i32> = h
        .ledger
        .list(&alice)
        .await
        .unwrap()
        .iter()
        .map(|r| r.semester)
        .collect();
    assert_eq!(semesters, vec![1, 2, 4]);
    assert!(h.ledger.list(&bob).await.unwrap().iter().all(|r| r.account_id == bob.id));
}

#[tokio::test]
async fn test_only_exam_cell_ingests() {
    let h = harness();
    let alice = h.account("alice", 1).await;
    let exam_cell = h.account("exam", 2).await;
    let admin = h.account("admin", 3).await;

    let payload = RecordResultRequest {
        account_id: Some(alice.id),
        semester: Some(5),
        subjects: subjects(2),
        marks: vec![80.0, 90.0],
    };

    for outsider in [&alice, &admin] {
        let err = h.ledger.ingest(outsider, payload.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::Permission(_)));
    }

    let recorded = h.ledger.ingest(&exam_cell, payload).await.unwrap();
    assert_eq!(recorded.total, 85.0);

    let err = h
        .ledger
        .ingest(&exam_cell, RecordResultRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "account_id is required"));
}
