//! Runs against a real Postgres. Start one, export DATABASE_URL, then
//! `cargo test --test repository_integration_tests -- --ignored`.

use campus_portal::{
    models::{
        NewAccount, NoticeDraft, ProfileChanges, RequestDraft, RequestState, ResultDraft,
        RoleLevel,
    },
    repository::{
        AccountRepository, NoticeRepository, PostgresRepository, RequestRepository,
        ResultRepository, StoreError,
    },
};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn repo() -> PostgresRepository {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for these tests");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .expect("Failed to connect to Postgres in tests");
    sqlx::migrate!().run(&pool).await.expect("migrations failed");
    PostgresRepository::new(pool)
}

fn new_account(role: RoleLevel) -> NewAccount {
    let tag = Uuid::new_v4().simple().to_string();
    NewAccount {
        username: format!("user_{tag}"),
        password_hash: "$argon2id$placeholder".to_string(),
        email: format!("{tag}@college.edu"),
        role_level: role,
    }
}

#[tokio::test]
#[ignore]
async fn test_unique_constraints_surface_as_conflict() {
    let repo = repo().await;
    let first = new_account(RoleLevel::Student);
    repo.insert_account(first.clone()).await.unwrap();

    let mut same_name = new_account(RoleLevel::Student);
    same_name.username = first.username.clone();
    assert_eq!(
        repo.insert_account(same_name).await.unwrap_err(),
        StoreError::Conflict("username".to_string())
    );

    let mut same_email = new_account(RoleLevel::Student);
    same_email.email = first.email.clone();
    assert_eq!(
        repo.insert_account(same_email).await.unwrap_err(),
        StoreError::Conflict("email".to_string())
    );
}

#[tokio::test]
#[ignore]
async fn test_profile_changes_only_touch_present_columns() {
    let repo = repo().await;
    let account = repo.insert_account(new_account(RoleLevel::Student)).await.unwrap();

    let updated = repo
        .update_account(
            account.id,
            ProfileChanges {
                branch: Some("CSE".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.branch.as_deref(), Some("CSE"));
    assert_eq!(updated.email, account.email);

    assert!(matches!(
        repo.update_account(Uuid::new_v4(), ProfileChanges::default()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore]
async fn test_stale_version_is_rejected() {
    let repo = repo().await;
    let owner = repo.insert_account(new_account(RoleLevel::Student)).await.unwrap();
    let request = repo
        .insert_request(RequestDraft {
            requester_id: owner.id,
            request_type: 3,
            title: "Bonafide".to_string(),
            content: String::new(),
            access_level: RoleLevel::InstitutionAdmin,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::Received);

    let first = repo
        .update_request_content(request.id, request.version, "A".into(), "".into(), Utc::now())
        .await
        .unwrap();
    assert_eq!(first.version, request.version + 1);

    let second = repo
        .update_request_content(request.id, request.version, "B".into(), "".into(), Utc::now())
        .await;
    assert_eq!(second.unwrap_err(), StoreError::Stale);

    let missing = repo
        .update_request_state(i64::MAX, 1, RequestState::Read, Utc::now(), None)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
#[ignore]
async fn test_queue_listing_filters_by_access_level() {
    let repo = repo().await;
    let owner = repo.insert_account(new_account(RoleLevel::Student)).await.unwrap();
    let draft = |level: i16| RequestDraft {
        requester_id: owner.id,
        request_type: level as i32,
        title: "Queue check".to_string(),
        content: String::new(),
        access_level: RoleLevel::try_from(level).unwrap(),
        created_at: Utc::now(),
    };
    let exam = repo.insert_request(draft(2)).await.unwrap();
    let dept = repo.insert_request(draft(4)).await.unwrap();

    let queue = repo
        .list_requests_by_access_level(RoleLevel::ExamCell)
        .await
        .unwrap();
    assert!(queue.iter().any(|r| r.id == exam.id));
    assert!(queue.iter().all(|r| r.id != dept.id));
    assert!(queue.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));
}

#[tokio::test]
#[ignore]
async fn test_notice_update_is_version_checked() {
    let repo = repo().await;
    let author = repo.insert_account(new_account(RoleLevel::ExamCell)).await.unwrap();
    let notice = repo
        .insert_notice(NoticeDraft {
            title: "Exams".to_string(),
            content: "Monday".to_string(),
            branch: format!("branch-{}", Uuid::new_v4()),
            creator_id: author.id,
            attachment: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let updated = repo
        .update_notice(notice.id, notice.version, "Exams".into(), "Tuesday".into(), Utc::now())
        .await
        .unwrap();
    assert_eq!(updated.content, "Tuesday");

    let listed = repo.list_notices_by_branch(&notice.branch).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_result_keeps_original_row() {
    let repo = repo().await;
    let student = repo.insert_account(new_account(RoleLevel::Student)).await.unwrap();
    let draft = |total: f64| ResultDraft {
        account_id: student.id,
        semester: 1,
        subjects: vec!["CS101".to_string()],
        marks: vec![total],
        total,
        created_at: Utc::now(),
    };

    repo.insert_result(draft(64.0)).await.unwrap();
    assert!(matches!(
        repo.insert_result(draft(99.0)).await,
        Err(StoreError::Conflict(_))
    ));

    let rows = repo.list_results_for_account(student.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total, 64.0);
}
