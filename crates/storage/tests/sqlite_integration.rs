use lesson_core::model::{
    AttemptStats, Bank, BankState, Lesson, LessonNumber, Question, QuestionDraft, QuestionId,
};
use lesson_core::time::fixed_now;
use storage::repository::{
    AttemptPersistence, BankRepository, LessonRepository, Storage, StorageError,
};
use storage::sqlite::SqliteRepository;

fn build_question(id: u32, difficulty: i64) -> Question {
    QuestionDraft {
        text: format!("What is item {id}?"),
        choices: vec![
            format!("right {id}"),
            "wrong a".into(),
            "wrong b".into(),
            "wrong c".into(),
        ],
        difficulty_percentage: difficulty,
    }
    .validate()
    .unwrap()
    .place(QuestionId::new(id), usize::try_from(id % 4).unwrap())
    .unwrap()
}

fn build_bank(document: &str, n: u32) -> Bank {
    let questions = (0..n)
        .map(|id| build_question(id, i64::from(id * 7 % 101)))
        .collect();
    Bank::new(document, questions, fixed_now()).unwrap()
}

fn lesson_of(bank: &Bank, number: u32, ids: &[usize]) -> Lesson {
    Lesson::new(
        bank.id(),
        LessonNumber::new(number),
        ids.iter().map(|&i| bank.questions()[i].clone()).collect(),
    )
    .unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!(
        "sqlite:file:memdb_{name}?mode=memory&cache=shared"
    ))
    .await
    .expect("connect");
    repo
}

#[tokio::test]
async fn sqlite_bank_roundtrip_keeps_order_and_answers() {
    let repo = connect("bank_roundtrip").await;
    let bank = build_bank("chapter-1.pdf", 20);
    repo.put_bank(&bank).await.unwrap();

    let fetched = repo.get_bank(bank.id()).await.expect("fetch");
    assert_eq!(fetched.document_id(), "chapter-1.pdf");
    assert_eq!(fetched.state(), BankState::Generated);
    assert_eq!(fetched.created_at(), fixed_now());
    assert_eq!(fetched.questions(), bank.questions());
    assert_eq!(fetched.questions()[5].correct_choice(), "right 5");
}

#[tokio::test]
async fn sqlite_missing_bank_is_not_found() {
    let repo = connect("missing_bank").await;
    let bank = build_bank("nowhere.pdf", 1);
    assert!(matches!(
        repo.get_bank(bank.id()).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.get_lesson(bank.id(), LessonNumber::DIAGNOSTIC).await,
        Err(StorageError::NotFound)
    ));
    assert!(repo.list_lessons(bank.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_rejects_bank_id_collision() {
    let repo = connect("collision").await;
    let bank = build_bank("doc-a.pdf", 2);
    repo.put_bank(&bank).await.unwrap();

    let impostor = Bank::from_persisted(
        bank.id(),
        "doc-b.pdf".into(),
        vec![build_question(0, 50)],
        BankState::Generated,
        fixed_now(),
    )
    .unwrap();
    assert!(matches!(
        repo.put_bank(&impostor).await,
        Err(StorageError::Conflict)
    ));

    let kept = repo.get_bank(bank.id()).await.unwrap();
    assert_eq!(kept.document_id(), "doc-a.pdf");
    assert_eq!(kept.len(), 2);
}

#[tokio::test]
async fn sqlite_regenerating_bank_replaces_questions_and_lessons() {
    let repo = connect("regenerate").await;
    let first = build_bank("doc.pdf", 6);
    repo.put_bank(&first).await.unwrap();
    repo.save_diagnostic(&lesson_of(&first, 0, &[0, 1]))
        .await
        .unwrap();

    let second = build_bank("doc.pdf", 3);
    repo.put_bank(&second).await.unwrap();

    let fetched = repo.get_bank(second.id()).await.unwrap();
    assert_eq!(fetched.len(), 3);
    assert_eq!(fetched.state(), BankState::Generated);
    assert!(repo.list_lessons(second.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_lessons_roundtrip_and_finalize_replaces_followups() {
    let repo = connect("lessons").await;
    let bank = build_bank("doc.pdf", 10);
    repo.put_bank(&bank).await.unwrap();

    let diagnostic = lesson_of(&bank, 0, &[4, 2, 7]);
    repo.save_diagnostic(&diagnostic).await.unwrap();
    assert_eq!(
        repo.get_bank(bank.id()).await.unwrap().state(),
        BankState::DiagnosticReady
    );

    let mut scored = bank.questions()[0].clone();
    scored.set_combined_difficulty(12.5);
    let followup = Lesson::new(bank.id(), LessonNumber::new(1), vec![scored]).unwrap();
    repo.replace_followup_lessons(
        bank.id(),
        &[followup, lesson_of(&bank, 2, &[1, 3])],
    )
    .await
    .unwrap();

    // Second finalize with fewer lessons leaves no stale lesson 2.
    repo.replace_followup_lessons(bank.id(), &[lesson_of(&bank, 1, &[0, 1, 3])])
        .await
        .unwrap();

    let lessons = repo.list_lessons(bank.id()).await.unwrap();
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0], diagnostic);
    assert_eq!(lessons[1].len(), 3);
    assert!(matches!(
        repo.get_lesson(bank.id(), LessonNumber::new(2)).await,
        Err(StorageError::NotFound)
    ));
    assert_eq!(
        repo.get_bank(bank.id()).await.unwrap().state(),
        BankState::Finalized
    );
}

#[tokio::test]
async fn sqlite_combined_difficulty_is_persisted() {
    let repo = connect("combined").await;
    let bank = build_bank("doc.pdf", 2);
    repo.put_bank(&bank).await.unwrap();
    repo.save_diagnostic(&lesson_of(&bank, 0, &[0])).await.unwrap();

    let mut q = bank.questions()[1].clone();
    q.set_combined_difficulty(33.25);
    let lesson = Lesson::new(bank.id(), LessonNumber::new(1), vec![q]).unwrap();
    repo.replace_followup_lessons(bank.id(), &[lesson]).await.unwrap();

    let fetched = repo
        .get_lesson(bank.id(), LessonNumber::new(1))
        .await
        .unwrap();
    assert_eq!(fetched.questions()[0].combined_difficulty(), Some(33.25));
}

#[tokio::test]
async fn sqlite_attempt_writes_through_to_bank() {
    let repo = connect("attempt").await;
    let bank = build_bank("doc.pdf", 5);
    repo.put_bank(&bank).await.unwrap();
    repo.save_diagnostic(&lesson_of(&bank, 0, &[3, 1])).await.unwrap();

    let mut lesson = repo
        .get_lesson(bank.id(), LessonNumber::DIAGNOSTIC)
        .await
        .unwrap();
    lesson
        .record_attempt(1, AttemptStats::new(4, 1).unwrap())
        .unwrap();
    repo.apply_attempt(&lesson, 1).await.unwrap();

    let stored = repo
        .get_lesson(bank.id(), LessonNumber::DIAGNOSTIC)
        .await
        .unwrap();
    assert_eq!(stored.questions()[1].stats(), AttemptStats::new(4, 1).unwrap());
    assert!(!stored.questions()[0].stats().is_attempted());

    let bank = repo.get_bank(bank.id()).await.unwrap();
    let master = bank.question(QuestionId::new(1)).unwrap();
    assert_eq!(master.stats().tries(), 4);
    assert_eq!(master.stats().correct_tries(), 1);
}

#[tokio::test]
async fn sqlite_generated_bank_and_diagnostic_are_written_together() {
    let repo = connect("generated").await;
    let bank = build_bank("doc.pdf", 6);
    repo.put_bank(&bank).await.unwrap();
    repo.replace_followup_lessons(bank.id(), &[lesson_of(&bank, 1, &[5])])
        .await
        .unwrap();

    let diagnostic = lesson_of(&bank, 0, &[0, 4]);
    repo.put_generated_bank(&bank, &diagnostic).await.unwrap();

    assert_eq!(
        repo.get_bank(bank.id()).await.unwrap().state(),
        BankState::DiagnosticReady
    );
    assert_eq!(repo.list_lessons(bank.id()).await.unwrap(), vec![diagnostic]);

    // a colliding document stores neither the bank nor its lesson
    let impostor = Bank::from_persisted(
        bank.id(),
        "doc-b.pdf".into(),
        vec![build_question(0, 50)],
        BankState::Generated,
        fixed_now(),
    )
    .unwrap();
    let impostor_lesson = lesson_of(&impostor, 0, &[0]);
    assert!(matches!(
        repo.put_generated_bank(&impostor, &impostor_lesson).await,
        Err(StorageError::Conflict)
    ));
    assert_eq!(repo.get_bank(bank.id()).await.unwrap().len(), 6);
    assert_eq!(repo.list_lessons(bank.id()).await.unwrap()[0].len(), 2);
}

#[tokio::test]
async fn sqlite_connect_migrates_once() {
    let repo = connect("migrations").await;
    assert_eq!(repo.schema_version().await.unwrap(), 2);
    repo.migrate().await.expect("migrations are idempotent");
    assert_eq!(repo.schema_version().await.unwrap(), 2);
}

#[tokio::test]
async fn sqlite_user_difficulty_column_tracks_attempts() {
    let repo = connect("user_difficulty").await;
    let bank = build_bank("doc.pdf", 3);
    repo.put_bank(&bank).await.unwrap();
    repo.save_diagnostic(&lesson_of(&bank, 0, &[2, 0])).await.unwrap();

    let mut lesson = repo
        .get_lesson(bank.id(), LessonNumber::DIAGNOSTIC)
        .await
        .unwrap();
    lesson
        .record_attempt(0, AttemptStats::new(4, 1).unwrap())
        .unwrap();
    repo.apply_attempt(&lesson, 0).await.unwrap();

    let lesson_values: Vec<f64> = sqlx::query_scalar(
        "SELECT user_difficulty FROM lesson_questions WHERE bank_id = ?1 ORDER BY position",
    )
    .bind(bank.id().to_hex())
    .fetch_all(repo.pool())
    .await
    .unwrap();
    assert_eq!(lesson_values, vec![0.75, 0.5]);

    let bank_value: f64 = sqlx::query_scalar(
        "SELECT user_difficulty FROM bank_questions WHERE bank_id = ?1 AND question_id = 2",
    )
    .bind(bank.id().to_hex())
    .fetch_one(repo.pool())
    .await
    .unwrap();
    assert_eq!(bank_value, 0.75);
}

#[tokio::test]
async fn sqlite_attempt_on_unknown_lesson_writes_nothing() {
    let repo = connect("attempt_missing").await;
    let bank = build_bank("doc.pdf", 3);
    repo.put_bank(&bank).await.unwrap();

    let mut ghost = lesson_of(&bank, 4, &[2]);
    ghost
        .record_attempt(0, AttemptStats::new(1, 1).unwrap())
        .unwrap();
    assert!(matches!(
        repo.apply_attempt(&ghost, 0).await,
        Err(StorageError::NotFound)
    ));

    let bank = repo.get_bank(bank.id()).await.unwrap();
    assert!(!bank.questions()[2].stats().is_attempted());
}

#[tokio::test]
async fn storage_facade_wires_sqlite_backend() {
    let storage = Storage::sqlite("sqlite:file:memdb_facade?mode=memory&cache=shared")
        .await
        .expect("storage");
    let bank = build_bank("facade.pdf", 1);
    storage.banks.put_bank(&bank).await.unwrap();
    storage
        .lessons
        .save_diagnostic(&lesson_of(&bank, 0, &[0]))
        .await
        .unwrap();
    assert_eq!(storage.lessons.list_lessons(bank.id()).await.unwrap().len(), 1);
}
