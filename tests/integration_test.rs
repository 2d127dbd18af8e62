//! End-to-end scenarios from SPEC_FULL.md §8, driven through the engine's
//! Rust API directly (bypassing HTTP), the same way the reference stack's
//! own integration test bypasses its WebSocket transport and calls its
//! handlers directly.

use chrono::{Duration, Utc};
use trivia_engine::config::EngineConfig;
use trivia_engine::domain::{AnswerOption, Difficulty, ParticipationStatus, Question, Trivia, TriviaQuestion, TriviaStatus};
use trivia_engine::engine::Engine;
use trivia_engine::error::EngineError;
use trivia_engine::hub::Hub;
use trivia_engine::ids::{OptionId, QuestionId, TriviaQuestionId, UserId};
use trivia_engine::repo::MemoryStore;

async fn new_engine() -> Engine {
    let store = MemoryStore::new();
    Engine::new(store.into_repositories(), Hub::new(), EngineConfig::from_env())
}

#[allow(dead_code)]
struct SeededQuestion {
    binding_id: TriviaQuestionId,
    correct: OptionId,
    wrong: OptionId,
}

async fn seed_question(
    engine: &Engine,
    trivia_id: trivia_engine::ids::TriviaId,
    admin: UserId,
    position: u32,
    difficulty: Difficulty,
    time_limit: u32,
) -> SeededQuestion {
    let question = Question {
        id: QuestionId::new(),
        text: format!("question {position}"),
        difficulty,
        creator_user_id: admin,
    };
    let question = engine.repos().questions.create(question).await.unwrap();
    let correct = engine
        .repos()
        .options
        .create(AnswerOption {
            id: OptionId::new(),
            question_id: question.id,
            text: "correct".into(),
            is_correct: true,
        })
        .await
        .unwrap();
    let wrong = engine
        .repos()
        .options
        .create(AnswerOption {
            id: OptionId::new(),
            question_id: question.id,
            text: "wrong".into(),
            is_correct: false,
        })
        .await
        .unwrap();
    let binding = engine
        .repos()
        .trivia_questions
        .create(TriviaQuestion {
            id: TriviaQuestionId::new(),
            trivia_id,
            question_id: question.id,
            position,
            time_limit_seconds: time_limit,
        })
        .await
        .unwrap();
    SeededQuestion {
        binding_id: binding.id,
        correct: correct.id,
        wrong: wrong.id,
    }
}

/// Scenario 1: happy path, two players, three questions.
#[tokio::test]
async fn happy_path_two_players_three_questions() {
    let engine = new_engine().await;
    let admin = UserId::new();
    let trivia = Trivia::new("general knowledge".into(), "d".into(), admin, Utc::now());
    let trivia_id = engine.repos().trivias.create(trivia).await.unwrap().id;

    let q1 = seed_question(&engine, trivia_id, admin, 0, Difficulty::Easy, 30).await;
    let q2 = seed_question(&engine, trivia_id, admin, 1, Difficulty::Medium, 30).await;
    let q3 = seed_question(&engine, trivia_id, admin, 2, Difficulty::Hard, 30).await;

    let alice = UserId::new();
    let bob = UserId::new();
    engine.join(trivia_id, alice).await.unwrap();
    engine.join(trivia_id, bob).await.unwrap();
    engine.start(trivia_id, admin).await.unwrap();

    let at = |secs: i64| Some(Utc::now() + Duration::seconds(secs));

    // Q1 (EASY): A correct, B wrong.
    let a1 = engine.submit(trivia_id, alice, q1.correct, at(5)).await.unwrap();
    assert_eq!(a1.earned_points, 1);
    let b1 = engine.submit(trivia_id, bob, q1.wrong, at(5)).await.unwrap();
    assert_eq!(b1.earned_points, 0);

    engine.advance(trivia_id, admin).await.unwrap();

    // Q2 (MEDIUM): both correct.
    let a2 = engine.submit(trivia_id, alice, q2.correct, at(5)).await.unwrap();
    assert_eq!(a2.earned_points, 2);
    let b2 = engine.submit(trivia_id, bob, q2.correct, at(5)).await.unwrap();
    assert_eq!(b2.earned_points, 2);

    engine.advance(trivia_id, admin).await.unwrap();

    // Q3 (HARD): A correct, B times out.
    let a3 = engine.submit(trivia_id, alice, q3.correct, at(5)).await.unwrap();
    assert_eq!(a3.earned_points, 3);
    let b3 = engine.submit(trivia_id, bob, q3.correct, at(31)).await.unwrap();
    assert_eq!(b3.earned_points, 0);
    assert!(!b3.is_correct);

    let last_advance = engine.advance(trivia_id, admin).await.unwrap();
    assert_eq!(last_advance.status, TriviaStatus::Finished);

    let ranking = engine.ranking(trivia_id).await.unwrap();
    assert_eq!(ranking.rows[0].user_id, alice);
    assert_eq!(ranking.rows[0].score, 6);
    assert_eq!(ranking.rows[1].user_id, bob);
    assert_eq!(ranking.rows[1].score, 2);
}

/// Scenario 2: duplicate submission returns the first outcome unchanged.
#[tokio::test]
async fn duplicate_submission_returns_first_outcome() {
    let engine = new_engine().await;
    let admin = UserId::new();
    let trivia = Trivia::new("t".into(), "d".into(), admin, Utc::now());
    let trivia_id = engine.repos().trivias.create(trivia).await.unwrap().id;
    let q = seed_question(&engine, trivia_id, admin, 0, Difficulty::Easy, 30).await;

    let player = UserId::new();
    engine.join(trivia_id, player).await.unwrap();
    engine.start(trivia_id, admin).await.unwrap();

    let at = |secs: i64| Some(Utc::now() + Duration::seconds(secs));
    let first = engine.submit(trivia_id, player, q.correct, at(5)).await.unwrap();
    assert!(first.is_correct);
    assert_eq!(first.earned_points, 1);

    let second = engine.submit(trivia_id, player, q.wrong, at(10)).await.unwrap();
    assert!(second.is_correct);
    assert_eq!(second.earned_points, 1);
    assert_eq!(second.total_score, 1);

    let participation = engine
        .repos()
        .participations
        .get_by_trivia_and_user(trivia_id, player)
        .await
        .unwrap()
        .unwrap();
    let answers = engine.repos().answers.list_by_participation(participation.id).await.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].selected_option_id, q.correct);
}

/// Scenario 3: timeout on the correct option still earns zero.
#[tokio::test]
async fn timeout_earns_zero_even_for_the_correct_option() {
    let engine = new_engine().await;
    let admin = UserId::new();
    let trivia = Trivia::new("t".into(), "d".into(), admin, Utc::now());
    let trivia_id = engine.repos().trivias.create(trivia).await.unwrap().id;
    let q = seed_question(&engine, trivia_id, admin, 0, Difficulty::Hard, 30).await;

    let player = UserId::new();
    engine.join(trivia_id, player).await.unwrap();
    engine.start(trivia_id, admin).await.unwrap();

    let late = Some(Utc::now() + Duration::seconds(31));
    let result = engine.submit(trivia_id, player, q.correct, late).await.unwrap();
    assert!(!result.is_correct);
    assert_eq!(result.earned_points, 0);
    assert_eq!(result.time_remaining_seconds, 0);
}

/// Scenario 4: Start is blocked when not everyone assigned is ready.
#[tokio::test]
async fn start_blocked_by_missing_ready() {
    let engine = new_engine().await;
    let admin = UserId::new();
    let trivia = Trivia::new("t".into(), "d".into(), admin, Utc::now());
    let trivia_id = engine.repos().trivias.create(trivia).await.unwrap().id;
    seed_question(&engine, trivia_id, admin, 0, Difficulty::Easy, 30).await;

    let ready_a = UserId::new();
    let ready_b = UserId::new();
    engine.join(trivia_id, ready_a).await.unwrap();
    engine.join(trivia_id, ready_b).await.unwrap();

    let joined_only = trivia_engine::domain::Participation::invited(trivia_id, UserId::new());
    engine.repos().participations.create(joined_only).await.unwrap();

    let result = engine.start(trivia_id, admin).await;
    assert!(matches!(result, Err(EngineError::Conflict(_))));

    let trivia = engine.repos().trivias.get(trivia_id).await.unwrap().unwrap();
    assert_eq!(trivia.status, TriviaStatus::Lobby);
}

/// Scenario 5: 50/50 then submit, second 50/50 is Conflict.
#[tokio::test]
async fn fifty_fifty_then_submit_then_second_use_conflicts() {
    let engine = new_engine().await;
    let admin = UserId::new();
    let trivia = Trivia::new("t".into(), "d".into(), admin, Utc::now());
    let trivia_id = engine.repos().trivias.create(trivia).await.unwrap().id;

    let question = Question {
        id: QuestionId::new(),
        text: "capital?".into(),
        difficulty: Difficulty::Medium,
        creator_user_id: admin,
    };
    let question = engine.repos().questions.create(question).await.unwrap();
    let mut option_ids = vec![];
    for (text, is_correct) in [("Paris", true), ("Lyon", false), ("Nice", false), ("Metz", false)] {
        let option = engine
            .repos()
            .options
            .create(AnswerOption {
                id: OptionId::new(),
                question_id: question.id,
                text: text.into(),
                is_correct,
            })
            .await
            .unwrap();
        option_ids.push((option.id, is_correct));
    }
    engine
        .repos()
        .trivia_questions
        .create(TriviaQuestion {
            id: TriviaQuestionId::new(),
            trivia_id,
            question_id: question.id,
            position: 0,
            time_limit_seconds: 30,
        })
        .await
        .unwrap();

    let player = UserId::new();
    engine.join(trivia_id, player).await.unwrap();
    engine.start(trivia_id, admin).await.unwrap();

    let lifeline = engine.use_fifty_fifty(trivia_id, question.id, player).await.unwrap();
    assert_eq!(lifeline.allowed_options.len(), 2);
    assert!(lifeline.fifty_fifty_used);

    let correct_id = option_ids.iter().find(|(_, is_correct)| *is_correct).unwrap().0;
    let submit = engine
        .submit(trivia_id, player, correct_id, Some(Utc::now() + Duration::seconds(5)))
        .await
        .unwrap();
    assert!(submit.is_correct);

    let second = engine.use_fifty_fifty(trivia_id, question.id, player).await;
    assert!(matches!(second, Err(EngineError::Conflict(_))));

    let participation = engine
        .repos()
        .participations
        .get_by_trivia_and_user(trivia_id, player)
        .await
        .unwrap()
        .unwrap();
    assert!(participation.fifty_fifty_used);
}

/// Scenario 6: Reset clears answers, scores, and lifeline flags.
#[tokio::test]
async fn reset_clears_everything() {
    let engine = new_engine().await;
    let admin = UserId::new();
    let trivia = Trivia::new("t".into(), "d".into(), admin, Utc::now());
    let trivia_id = engine.repos().trivias.create(trivia).await.unwrap().id;
    let q = seed_question(&engine, trivia_id, admin, 0, Difficulty::Easy, 30).await;

    let player = UserId::new();
    engine.join(trivia_id, player).await.unwrap();
    engine.start(trivia_id, admin).await.unwrap();
    engine
        .submit(trivia_id, player, q.correct, Some(Utc::now() + Duration::seconds(5)))
        .await
        .unwrap();

    engine.reset(trivia_id).await.unwrap();

    let trivia = engine.repos().trivias.get(trivia_id).await.unwrap().unwrap();
    assert_eq!(trivia.status, TriviaStatus::Lobby);
    assert_eq!(trivia.current_question_index, 0);
    assert!(trivia.question_started_at.is_none());
    assert!(trivia.started_at.is_none());
    assert!(trivia.finished_at.is_none());

    let participation = engine
        .repos()
        .participations
        .get_by_trivia_and_user(trivia_id, player)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(participation.score, 0);
    assert!(!participation.fifty_fifty_used);
    assert_eq!(participation.status, ParticipationStatus::Ready);

    let answers = engine.repos().answers.list_by_participation(participation.id).await.unwrap();
    assert!(answers.is_empty());
}

/// A subscriber connected before a command observes the resulting event;
/// nothing observes an event from a command that errors.
#[tokio::test]
async fn events_are_observable_after_commit_only() {
    let engine = new_engine().await;
    let admin = UserId::new();
    let trivia = Trivia::new("t".into(), "d".into(), admin, Utc::now());
    let trivia_id = engine.repos().trivias.create(trivia).await.unwrap().id;

    let mut subscriber = engine.hub().subscribe(trivia_id).await;

    let player = UserId::new();
    engine.join(trivia_id, player).await.unwrap();

    // join() on a DRAFT trivia flips it to LOBBY and broadcasts status_updated,
    // then broadcasts lobby_updated/admin_lobby_updated.
    let mut saw_status_updated = false;
    while let Ok(event) = subscriber.try_recv() {
        if event.frame_name() == "status_updated" {
            saw_status_updated = true;
        }
    }
    assert!(saw_status_updated);

    // A failing command (non-creator Start) emits nothing new.
    let result = engine.start(trivia_id, player).await;
    assert!(result.is_err());
    assert!(subscriber.try_recv().is_err());
}
