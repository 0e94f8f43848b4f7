use std::sync::{Arc, Mutex};
use std::time::Duration;

use survey_spec::backend::{BackendCall, BackendError, InMemoryBackend};
use survey_spec::redirect::Navigator;
use survey_spec::store::{DraftStore, MemoryStorage};
use survey_spec::{
    AnswerValue, END_DESTINATION, LogicCondition, LogicRule, PlayerError, PlayerOptions,
    PlayerPhase, PlayerServices, ResponseData, SubmitOutcome, SurveyPlayer, SurveySpec,
};
use url::Url;

fn fixture(name: &str) -> &'static str {
    match name {
        "three_questions" => include_str!("../tests/fixtures/three_questions.json"),
        "feedback_survey" => include_str!("../tests/fixtures/feedback_survey.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn load(name: &str) -> Arc<SurveySpec> {
    Arc::new(serde_json::from_str(fixture(name)).expect("deserialize survey"))
}

#[derive(Default)]
struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn visited(&self) -> Vec<String> {
        self.visited.lock().expect("lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        self.visited.lock().expect("lock").push(url.to_string());
    }
}

struct Harness {
    backend: Arc<InMemoryBackend>,
    drafts: DraftStore,
    navigator: Arc<RecordingNavigator>,
}

impl Harness {
    fn new() -> Self {
        Self {
            backend: Arc::new(InMemoryBackend::new()),
            drafts: DraftStore::new(Arc::new(MemoryStorage::new())),
            navigator: Arc::new(RecordingNavigator::default()),
        }
    }

    fn services(&self) -> PlayerServices {
        PlayerServices::new(
            self.backend.clone(),
            self.drafts.clone(),
            self.navigator.clone(),
        )
    }

    async fn player(&self, survey: Arc<SurveySpec>, options: PlayerOptions) -> SurveyPlayer {
        let mut player = SurveyPlayer::new(survey, options, self.services()).expect("player");
        player.start().await.expect("start");
        player
    }
}

#[tokio::test(start_paused = true)]
async fn completes_three_question_survey_and_redirects() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;
    assert_eq!(player.phase(), PlayerPhase::Active);
    assert_eq!(player.state().current_question_id, "q1");
    assert!(player.is_first_question());

    let outcome = player.submit_raw(Some("Ada")).await.expect("submit q1");
    assert_eq!(
        outcome,
        SubmitOutcome::Advanced {
            question_id: "q2".into()
        }
    );
    assert!((player.progress() - 1.0 / 3.0).abs() < 1e-9);

    player.submit_raw(Some("4")).await.expect("submit q2");
    assert!(player.is_last_question());

    let outcome = player.submit_raw(Some("accepted")).await.expect("submit q3");
    let redirect = match outcome {
        SubmitOutcome::Finished { redirect } => redirect,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(
        redirect.as_ref().map(Url::as_str),
        Some("https://example.com/")
    );

    let state = player.state();
    assert!(state.finished);
    assert_eq!(state.progress, 1.0);
    assert_eq!(state.current_question_id, END_DESTINATION);
    assert_eq!(player.phase(), PlayerPhase::Finished);
    assert!(harness.drafts.get_all("onboarding").is_none());

    let responses = harness.backend.responses();
    assert_eq!(responses.len(), 1);
    let stored = &responses[0].payload;
    assert!(stored.finished);
    assert_eq!(stored.data["q1"], AnswerValue::from("Ada"));
    assert_eq!(stored.data["q2"], AnswerValue::Number(4.0));
    assert_eq!(stored.data["q3"], AnswerValue::from("accepted"));
    assert_eq!(harness.backend.responded_displays().len(), 1);

    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert!(harness.navigator.visited().is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.navigator.visited(), vec!["https://example.com/"]);
}

#[tokio::test]
async fn invalid_input_is_rejected_without_moving() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;

    assert_eq!(
        player.submit_raw(None).await.expect("submit"),
        SubmitOutcome::Rejected
    );
    player.submit_raw(Some("Ada")).await.expect("submit q1");
    assert_eq!(
        player.submit_raw(Some("9")).await.expect("submit q2"),
        SubmitOutcome::Rejected
    );
    assert_eq!(
        player
            .submit(AnswerValue::from("4"))
            .await
            .expect("typed submit"),
        SubmitOutcome::Rejected
    );
    assert_eq!(player.state().current_question_id, "q2");
    assert_eq!(harness.backend.responses()[0].payload.data.len(), 1);
}

#[tokio::test]
async fn dismissing_the_last_question_skips_the_redirect() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;
    player.submit_raw(Some("Ada")).await.expect("q1");
    player.submit(AnswerValue::Number(5.0)).await.expect("q2");
    let outcome = player.submit_raw(Some("dismissed")).await.expect("q3");
    assert_eq!(outcome, SubmitOutcome::Finished { redirect: None });
    assert!(player.pending_redirect().is_none());
}

#[tokio::test]
async fn resumes_from_draft() {
    let harness = Harness::new();
    harness.drafts.store(
        "onboarding",
        &ResponseData::from([("q1".to_string(), AnswerValue::from("Ada"))]),
    );

    let player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;
    assert_eq!(player.state().current_question_id, "q2");
    assert!((player.progress() - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(player.answers()["q1"], AnswerValue::from("Ada"));
}

#[tokio::test]
async fn draft_on_last_question_does_not_resume() {
    let harness = Harness::new();
    harness.drafts.store(
        "onboarding",
        &ResponseData::from([("q3".to_string(), AnswerValue::from("accepted"))]),
    );

    let player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;
    assert_eq!(player.state().current_question_id, "q1");
    assert!(player.answers().is_empty());
}

#[tokio::test]
async fn prefill_submits_the_first_question() {
    let harness = Harness::new();
    let options =
        PlayerOptions::from_url_str("https://app.example.com/s/onboarding?q1=Grace&q2=5")
            .expect("url");
    let player = harness.player(load("three_questions"), options).await;

    assert_eq!(player.state().current_question_id, "q2");
    assert_eq!(player.answers()["q1"], AnswerValue::from("Grace"));
    assert!(!player.answers().contains_key("q2"));
    let responses = harness.backend.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(
        responses[0].payload.meta.url.as_deref(),
        Some("https://app.example.com/s/onboarding?q1=Grace&q2=5")
    );
}

#[tokio::test]
async fn invalid_prefill_is_ignored() {
    let harness = Harness::new();
    let survey = load("three_questions");
    let mut options = PlayerOptions::default();
    options.prefill.insert("q1".into(), String::new());
    let player = harness.player(survey, options).await;
    assert_eq!(player.state().current_question_id, "q1");
    assert!(harness.backend.responses().is_empty());
}

#[tokio::test]
async fn preview_makes_no_remote_calls() {
    let harness = Harness::new();
    let options = PlayerOptions::default().preview(true);
    let mut player = harness.player(load("three_questions"), options).await;

    player.submit_raw(Some("Ada")).await.expect("q1");
    player.submit_raw(Some("3")).await.expect("q2");
    player.submit_raw(Some("accepted")).await.expect("q3");

    assert!(player.is_finished());
    assert!(harness.backend.calls().is_empty());
    assert!(player.person_id().is_none());
}

#[tokio::test]
async fn backend_failures_do_not_block_navigation() {
    let harness = Harness::new();
    harness
        .backend
        .fail_with(Some(BackendError::Unavailable("offline".into())));
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;

    player.submit_raw(Some("Ada")).await.expect("q1");
    assert_eq!(player.state().current_question_id, "q2");
    assert!(player.state().response_id.is_none());
    assert_eq!(
        harness.drafts.get_one("onboarding", "q1"),
        Some(AnswerValue::from("Ada"))
    );

    harness.backend.fail_with(None);
    player.submit_raw(Some("2")).await.expect("q2");
    assert_eq!(player.state().response_id.as_deref(), Some("response-1"));
    let calls = harness.backend.calls();
    assert!(matches!(
        calls.last(),
        Some(BackendCall::CreateResponse { finished: false, .. })
    ));
}

#[tokio::test]
async fn later_answers_update_the_created_response() {
    let harness = Harness::new();
    let options = PlayerOptions {
        user_id: Some("u-7".into()),
        ..PlayerOptions::default()
    };
    let mut player = harness.player(load("three_questions"), options).await;
    assert_eq!(player.person_id(), Some("person-u-7"));

    player.submit_raw(Some("Ada")).await.expect("q1");
    player.submit_raw(Some("5")).await.expect("q2");
    let response_id = player.state().response_id.clone().expect("response id");
    assert_eq!(
        harness.backend.calls().last(),
        Some(&BackendCall::UpdateResponse {
            response_id,
            finished: false,
        })
    );
    assert_eq!(harness.backend.responses()[0].payload.data.len(), 2);
}

#[tokio::test]
async fn branching_jumps_and_ends_early() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("feedback_survey"), PlayerOptions::default())
        .await;

    let outcome = player.submit_raw(Some("3")).await.expect("score");
    assert_eq!(
        outcome,
        SubmitOutcome::Advanced {
            question_id: "reason".into()
        }
    );

    player.restart();
    assert_eq!(player.state().current_question_id, "score");
    let outcome = player.submit_raw(Some("9")).await.expect("score");
    assert_eq!(
        outcome,
        SubmitOutcome::Advanced {
            question_id: "features".into()
        }
    );
    let outcome = player
        .submit_raw(Some("Reports,Dark mode"))
        .await
        .expect("features");
    assert!(matches!(outcome, SubmitOutcome::Finished { .. }));
    assert_eq!(
        player.answers()["features"],
        AnswerValue::List(vec!["Reports".into(), "Dark mode".into()])
    );
}

#[tokio::test]
async fn unknown_destination_is_a_structural_failure() {
    let mut survey: SurveySpec =
        serde_json::from_str(fixture("three_questions")).expect("deserialize survey");
    survey.questions[0].logic = vec![LogicRule::new(LogicCondition::Submitted, "missing")];

    let harness = Harness::new();
    let mut player = harness
        .player(Arc::new(survey), PlayerOptions::default())
        .await;
    let err = player
        .submit_raw(Some("Ada"))
        .await
        .expect_err("missing destination");
    assert_eq!(err, PlayerError::QuestionNotFound("missing".into()));
    assert_eq!(player.state().current_question_id, "q1");
}

#[tokio::test]
async fn empty_survey_cannot_be_played() {
    let mut survey: SurveySpec =
        serde_json::from_str(fixture("three_questions")).expect("deserialize survey");
    survey.questions.clear();
    let err = SurveyPlayer::new(
        Arc::new(survey),
        PlayerOptions::default(),
        PlayerServices::offline(),
    )
    .expect_err("empty survey");
    assert_eq!(err, PlayerError::EmptySurvey("onboarding".into()));
}

#[tokio::test]
async fn back_keeps_the_in_progress_answer() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;

    player.back(None).await.expect("back on first");
    assert_eq!(player.state().current_question_id, "q1");

    player.submit_raw(Some("Ada")).await.expect("q1");
    player
        .back(Some(AnswerValue::Number(2.0)))
        .await
        .expect("back");
    assert_eq!(player.state().current_question_id, "q1");
    assert_eq!(player.progress(), 0.0);
    assert_eq!(
        player.state().draft_value,
        Some(AnswerValue::from("Ada"))
    );
    assert_eq!(
        harness.drafts.get_one("onboarding", "q2"),
        Some(AnswerValue::Number(2.0))
    );

    let outcome = player
        .advance(AnswerValue::from("Ada Lovelace"))
        .await
        .expect("advance");
    assert_eq!(
        outcome,
        SubmitOutcome::Advanced {
            question_id: "q2".into()
        }
    );
    assert_eq!(player.state().draft_value, Some(AnswerValue::Number(2.0)));
    assert_eq!(player.answers()["q1"], AnswerValue::from("Ada"));
}

#[tokio::test]
async fn restart_cancels_redirect_and_keeps_the_response() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;
    player.submit_raw(Some("Ada")).await.expect("q1");
    player.submit_raw(Some("1")).await.expect("q2");
    player.submit_raw(Some("accepted")).await.expect("q3");
    assert!(player.pending_redirect().is_some());
    let response_id = player.state().response_id.clone();

    player.restart();
    assert!(player.pending_redirect().is_none());
    assert_eq!(player.phase(), PlayerPhase::Active);
    assert_eq!(player.state().current_question_id, "q1");
    assert!(!player.state().finished);
    assert_eq!(player.state().response_id, response_id);
}

#[tokio::test]
async fn finished_player_rejects_more_answers() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default().preview(true))
        .await;
    player.submit_raw(Some("Ada")).await.expect("q1");
    player.submit_raw(Some("1")).await.expect("q2");
    player.submit_raw(Some("accepted")).await.expect("q3");

    let err = player
        .submit_raw(Some("again"))
        .await
        .expect_err("finished");
    assert_eq!(err, PlayerError::NotActive("finished"));
}

#[tokio::test]
async fn advance_and_back_keep_only_fitting_answers() {
    let harness = Harness::new();
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;

    assert_eq!(
        player.advance(AnswerValue::from("")).await.expect("advance"),
        SubmitOutcome::Rejected
    );
    assert_eq!(player.state().current_question_id, "q1");
    assert!(harness.drafts.get_all("onboarding").is_none());

    player.advance(AnswerValue::from("Ada")).await.expect("q1");
    for wrong in [AnswerValue::from("banana"), AnswerValue::from("4")] {
        assert_eq!(
            player.advance(wrong).await.expect("advance"),
            SubmitOutcome::Rejected
        );
    }
    assert_eq!(player.state().current_question_id, "q2");

    player
        .back(Some(AnswerValue::from("banana")))
        .await
        .expect("back");
    assert_eq!(player.state().current_question_id, "q1");
    assert_eq!(
        harness.drafts.get_all("onboarding"),
        Some(ResponseData::from([("q1".to_string(), AnswerValue::from("Ada"))]))
    );
}

#[tokio::test]
async fn resume_drops_draft_answers_that_do_not_fit() {
    let harness = Harness::new();
    harness.drafts.store(
        "onboarding",
        &ResponseData::from([
            ("q1".to_string(), AnswerValue::from("Ada")),
            ("q2".to_string(), AnswerValue::from("banana")),
            ("q3".to_string(), AnswerValue::Number(1.0)),
        ]),
    );
    let mut player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;
    assert_eq!(player.state().current_question_id, "q2");
    assert!(player.state().draft_value.is_none());
    assert_eq!(player.answers().len(), 1);

    player.submit_raw(Some("4")).await.expect("q2");
    player.submit_raw(Some("accepted")).await.expect("q3");

    let responses = harness.backend.responses();
    assert_eq!(
        responses[0].payload.data,
        ResponseData::from([
            ("q1".to_string(), AnswerValue::from("Ada")),
            ("q2".to_string(), AnswerValue::Number(4.0)),
            ("q3".to_string(), AnswerValue::from("accepted")),
        ])
    );
}

#[tokio::test]
async fn unfitting_draft_means_a_fresh_start() {
    let harness = Harness::new();
    harness.drafts.store(
        "onboarding",
        &ResponseData::from([
            ("q1".to_string(), AnswerValue::from("")),
            ("q2".to_string(), AnswerValue::from("banana")),
        ]),
    );
    let player = harness
        .player(load("three_questions"), PlayerOptions::default())
        .await;
    assert_eq!(player.state().current_question_id, "q1");
    assert!(player.answers().is_empty());
}

fn optional_survey() -> Arc<SurveySpec> {
    Arc::new(
        serde_json::from_value(serde_json::json!({
            "id": "optional",
            "questions": [
                {
                    "id": "nps",
                    "type": "nps",
                    "headline": "How likely?",
                    "logic": [{ "condition": "skipped", "destination": "end" }]
                },
                {
                    "id": "tools",
                    "type": "multipleChoiceMulti",
                    "headline": "Tools?",
                    "choices": [
                        { "id": "a", "label": "Alpha" },
                        { "id": "other", "label": "Other" }
                    ],
                    "logic": [
                        { "condition": "skipped", "destination": "end" },
                        { "condition": "submitted", "destination": "why" }
                    ]
                },
                { "id": "extra", "type": "openText", "headline": "Anything else?" },
                { "id": "why", "type": "openText", "headline": "Why?" }
            ]
        }))
        .expect("deserialize survey"),
    )
}

#[tokio::test]
async fn skipping_an_optional_nps_follows_skipped_logic() {
    let harness = Harness::new();
    let mut player = harness
        .player(optional_survey(), PlayerOptions::default().preview(true))
        .await;

    assert_eq!(
        player.submit_raw(None).await.expect("skip nps"),
        SubmitOutcome::Finished { redirect: None }
    );
    assert_eq!(player.answers()["nps"], AnswerValue::from(""));
}

#[tokio::test]
async fn skipping_an_optional_multi_choice_stores_an_empty_list() {
    let harness = Harness::new();
    let mut player = harness
        .player(optional_survey(), PlayerOptions::default().preview(true))
        .await;
    player.submit_raw(Some("8")).await.expect("nps");
    assert_eq!(
        player.submit_raw(Some("")).await.expect("skip tools"),
        SubmitOutcome::Finished { redirect: None }
    );
    assert_eq!(player.answers()["tools"], AnswerValue::List(Vec::new()));

    let mut player = harness
        .player(optional_survey(), PlayerOptions::default().preview(true))
        .await;
    player.submit_raw(Some("8")).await.expect("nps");
    assert_eq!(
        player
            .submit(AnswerValue::List(vec!["Alpha".into()]))
            .await
            .expect("tools"),
        SubmitOutcome::Advanced {
            question_id: "why".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn redirect_uses_the_configured_delay_unless_cancelled() {
    let harness = Harness::new();
    let options = PlayerOptions::default().redirect_delay(Duration::from_secs(1));
    let mut player = harness.player(load("three_questions"), options.clone()).await;
    player.submit_raw(Some("Ada")).await.expect("q1");
    player.submit_raw(Some("1")).await.expect("q2");
    player.submit_raw(Some("accepted")).await.expect("q3");
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(harness.navigator.visited(), vec!["https://example.com/"]);

    let mut player = harness.player(load("three_questions"), options).await;
    player.submit_raw(Some("Grace")).await.expect("q1");
    player.submit_raw(Some("2")).await.expect("q2");
    player.submit_raw(Some("accepted")).await.expect("q3");
    assert_eq!(
        player.pending_redirect().map(|handle| handle.url().as_str()),
        Some("https://example.com/")
    );
    player.cancel_redirect();
    assert!(player.pending_redirect().is_none());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.navigator.visited().len(), 1);
}
