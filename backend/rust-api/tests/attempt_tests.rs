mod common;

use chrono::{Duration, Utc};
use common::{AssessmentSpec, OTHER_STANDARD_ID, STANDARD_ID};
use competency_api::{
    models::{AnswerValue, Attempt, AttemptResponses, AttemptStatus, Response, SubmitAnswerOutcome},
    store::AttemptStore,
    CoreError,
};

fn answer(question_id: &str, value: bool) -> Response {
    Response {
        question_id: question_id.to_string(),
        value: Some(AnswerValue::Bool(value)),
        time_spent: None,
    }
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) =
        common::seed_enrollment_with_assessment(&app, AssessmentSpec::default()).await;

    let first = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();
    let second = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.status, AttemptStatus::InProgress);
    assert_eq!(
        app.attempts
            .list_attempts(&enrollment.id, &assessment.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_quota_exceeded_after_allowed_terminal_attempts() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) = common::seed_enrollment_with_assessment(
        &app,
        AssessmentSpec {
            allowed_attempts: 2,
            ..AssessmentSpec::default()
        },
    )
    .await;

    for _ in 0..2 {
        let attempt = app
            .attempts
            .start_attempt(&enrollment.id, &assessment.id)
            .await
            .unwrap();
        app.attempts
            .submit_attempt(&attempt.id, vec![answer("q1", false)], None)
            .await
            .unwrap();
    }

    assert_eq!(
        app.attempts
            .remaining_attempts(&enrollment.id, &assessment.id)
            .await
            .unwrap(),
        0
    );

    let err = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CoreError::QuotaExceeded { allowed: 2, used: 2 }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_start_rejects_assessment_from_other_standard() {
    let app = common::create_test_app().await;
    let enrollment = common::enrollment(STANDARD_ID);
    let assessment = common::true_false_assessment(OTHER_STANDARD_ID, AssessmentSpec::default());
    app.store.insert_enrollment(enrollment.clone()).await;
    app.store.insert_assessment(assessment.clone()).await;

    let err = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DOMAIN_MISMATCH");
}

#[tokio::test]
async fn test_start_unknown_enrollment_is_not_found() {
    let app = common::create_test_app().await;
    let assessment = common::true_false_assessment(STANDARD_ID, AssessmentSpec::default());
    app.store.insert_assessment(assessment.clone()).await;

    let err = app
        .attempts
        .start_attempt("enr-missing", &assessment.id)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::NotFound { entity: "Enrollment", .. }));
}

#[tokio::test]
async fn test_submit_answer_last_write_wins() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) =
        common::seed_enrollment_with_assessment(&app, AssessmentSpec::default()).await;
    let attempt = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();

    let mut counts = Vec::new();
    for (question_id, value) in [("q1", false), ("q1", true), ("q2", true)] {
        match app
            .attempts
            .submit_answer(&attempt.id, question_id, Some(AnswerValue::Bool(value)), Some(5))
            .await
            .unwrap()
        {
            SubmitAnswerOutcome::Recorded {
                success,
                answered_count,
            } => {
                assert!(success);
                counts.push(answered_count);
            }
            other => panic!("expected Recorded, got {other:?}"),
        }
    }
    assert_eq!(counts, vec![1, 1, 2]);

    let stored = app.attempts.get_attempt_by_id(&attempt.id).await.unwrap();
    let mut pending = stored.pending_responses();
    pending.sort_by(|a, b| a.question_id.cmp(&b.question_id));
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].value, Some(AnswerValue::Bool(true)));
}

#[tokio::test]
async fn test_complete_grades_stored_responses() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) =
        common::seed_enrollment_with_assessment(&app, AssessmentSpec::default()).await;
    let attempt = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();

    for (question_id, value) in [("q1", true), ("q2", false)] {
        app.attempts
            .submit_answer(&attempt.id, question_id, Some(AnswerValue::Bool(value)), None)
            .await
            .unwrap();
    }

    let result = app
        .attempts
        .complete_attempt(&attempt.id, false)
        .await
        .unwrap();

    assert_eq!(result.status, AttemptStatus::Completed);
    assert_eq!(result.score, 10);
    assert_eq!(result.max_score, 20);
    assert_eq!(result.percentage, 50);
    assert!(!result.passed);
    let questions = result.questions.expect("results are shown");
    assert_eq!(questions.len(), 2);
    assert!(questions[0].is_correct);
    assert_eq!(questions[0].explanation.as_deref(), Some("q1 is true"));

    let stored = app.attempts.get_attempt_by_id(&attempt.id).await.unwrap();
    assert_eq!(stored.status, AttemptStatus::Completed);
    assert_eq!(stored.score, Some(50));
    assert_eq!(stored.passed, Some(false));
    assert!(stored.completed_at.is_some());
    assert!(matches!(stored.responses, AttemptResponses::Graded(ref r) if r.len() == 2));
    assert!(stored.pending_responses().is_empty());
}

#[tokio::test]
async fn test_hidden_results_omit_question_detail() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) = common::seed_enrollment_with_assessment(
        &app,
        AssessmentSpec {
            show_results: false,
            ..AssessmentSpec::default()
        },
    )
    .await;
    let attempt = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();

    let result = app
        .attempts
        .submit_attempt(&attempt.id, vec![answer("q1", true), answer("q2", true)], Some(42))
        .await
        .unwrap();

    assert!(result.questions.is_none());
    assert_eq!(result.percentage, 100);
    assert!(result.passed);
    assert_eq!(result.time_spent, 42);
}

#[tokio::test]
async fn test_submit_attempt_replaces_stored_answers() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) =
        common::seed_enrollment_with_assessment(&app, AssessmentSpec::default()).await;
    let attempt = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();

    app.attempts
        .submit_answer(&attempt.id, "q1", Some(AnswerValue::Bool(true)), None)
        .await
        .unwrap();

    // q1 is not in the final set, so it is graded as unanswered
    let result = app
        .attempts
        .submit_attempt(&attempt.id, vec![answer("q2", true)], None)
        .await
        .unwrap();

    assert_eq!(result.score, 10);
    assert_eq!(result.percentage, 50);
}

#[tokio::test]
async fn test_answer_after_time_limit_times_out_attempt() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) = common::seed_enrollment_with_assessment(
        &app,
        AssessmentSpec {
            time_limit: Some(60),
            ..AssessmentSpec::default()
        },
    )
    .await;

    let started_at = Utc::now() - Duration::seconds(120);
    let attempt = Attempt::start(&enrollment.id, &assessment.id, started_at);
    app.store.insert_attempt(attempt.clone()).await;

    let outcome = app
        .attempts
        .submit_answer(&attempt.id, "q1", Some(AnswerValue::Bool(true)), None)
        .await
        .unwrap();

    let result = match outcome {
        SubmitAnswerOutcome::TimedOut(result) => result,
        other => panic!("expected TimedOut, got {other:?}"),
    };
    assert_eq!(result.status, AttemptStatus::TimedOut);
    assert_eq!(result.score, 0);
    assert!(result.time_spent >= 120);

    let stored = app.attempts.get_attempt_by_id(&attempt.id).await.unwrap();
    assert_eq!(stored.status, AttemptStatus::TimedOut);
    match stored.responses {
        AttemptResponses::Graded(results) => assert!(results.iter().all(|r| !r.is_correct)),
        other => panic!("expected graded responses, got {other:?}"),
    }

    assert_eq!(
        app.attempts
            .remaining_attempts(&enrollment.id, &assessment.id)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_answer_just_past_time_limit_times_out() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) = common::seed_enrollment_with_assessment(
        &app,
        AssessmentSpec {
            time_limit: Some(60),
            ..AssessmentSpec::default()
        },
    )
    .await;

    let started_at = Utc::now() - Duration::milliseconds(60_800);
    let attempt = Attempt::start(&enrollment.id, &assessment.id, started_at);
    app.store.insert_attempt(attempt.clone()).await;

    let outcome = app
        .attempts
        .submit_answer(&attempt.id, "q1", Some(AnswerValue::Bool(true)), None)
        .await
        .unwrap();

    assert!(matches!(outcome, SubmitAnswerOutcome::TimedOut(_)));
    let stored = app.attempts.get_attempt_by_id(&attempt.id).await.unwrap();
    assert_eq!(stored.status, AttemptStatus::TimedOut);
}

#[tokio::test]
async fn test_answer_within_time_limit_is_recorded() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) = common::seed_enrollment_with_assessment(
        &app,
        AssessmentSpec {
            time_limit: Some(3600),
            ..AssessmentSpec::default()
        },
    )
    .await;
    let attempt = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();

    let outcome = app
        .attempts
        .submit_answer(&attempt.id, "q1", Some(AnswerValue::Bool(true)), None)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SubmitAnswerOutcome::Recorded {
            success: true,
            answered_count: 1
        }
    ));
}

#[tokio::test]
async fn test_terminal_attempts_are_immutable() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) =
        common::seed_enrollment_with_assessment(&app, AssessmentSpec::default()).await;
    let attempt = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();
    app.attempts
        .submit_attempt(&attempt.id, vec![answer("q1", true)], None)
        .await
        .unwrap();

    let err = app
        .attempts
        .submit_answer(&attempt.id, "q2", Some(AnswerValue::Bool(true)), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");

    let err = app
        .attempts
        .complete_attempt(&attempt.id, true)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");

    let err = app
        .attempts
        .submit_attempt(&attempt.id, vec![], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");

    let stored = app.attempts.get_attempt_by_id(&attempt.id).await.unwrap();
    assert_eq!(stored.status, AttemptStatus::Completed);
}

#[tokio::test]
async fn test_new_attempt_after_completion_lists_newest_first() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) =
        common::seed_enrollment_with_assessment(&app, AssessmentSpec::default()).await;

    let first = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();
    app.attempts.complete_attempt(&first.id, false).await.unwrap();

    let second = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();
    assert_ne!(first.id, second.id);

    let attempts = app
        .attempts
        .list_attempts(&enrollment.id, &assessment.id)
        .await
        .unwrap();
    let ids: Vec<_> = attempts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    assert_eq!(
        app.attempts
            .remaining_attempts(&enrollment.id, &assessment.id)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_unknown_attempt_is_not_found() {
    let app = common::create_test_app().await;

    let err = app.attempts.get_attempt_by_id("missing").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "Attempt", .. }));

    let err = app
        .attempts
        .submit_answer("missing", "q1", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_stale_open_copy_cannot_overwrite_completed_attempt() {
    let app = common::create_test_app().await;
    let (enrollment, assessment) =
        common::seed_enrollment_with_assessment(&app, AssessmentSpec::default()).await;

    let attempt = app
        .attempts
        .start_attempt(&enrollment.id, &assessment.id)
        .await
        .unwrap();
    let mut stale = app.attempts.get_attempt_by_id(&attempt.id).await.unwrap();

    app.attempts
        .submit_attempt(&attempt.id, vec![answer("q1", true), answer("q2", true)], None)
        .await
        .unwrap();

    stale.upsert_response(answer("q1", false));
    assert!(!app.store.update_open_attempt(&stale).await.unwrap());

    let stored = app.attempts.get_attempt_by_id(&attempt.id).await.unwrap();
    assert_eq!(stored.status, AttemptStatus::Completed);
    assert_eq!(stored.score, Some(100));
}
