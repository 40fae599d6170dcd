use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use placement_core::model::{LeadRecord, PartnerId, UserId};
use placement_core::survey::{GOAL_OPTIONS, PAYMENT_OPTIONS, START_CHOICE_OPTIONS, SurveyStep};
use placement_core::time::fixed_clock;
use services::chat::{MenuAction, SURVEY_DONE};
use services::{AppServices, Catalog, ChatSettings, Incoming, Keyboard, Reply, Sender};
use storage::repository::{InMemoryRepository, LeadRepository, Storage, StorageError};

const ADMIN: u64 = 1;

fn services() -> AppServices {
    AppServices::in_memory(
        fixed_clock(),
        Catalog::embedded().unwrap(),
        ChatSettings {
            admin_id: Some(UserId::new(ADMIN)),
            seed: Some(7),
            ..ChatSettings::default()
        },
    )
}

fn sender(id: u64) -> Sender {
    Sender {
        id: UserId::new(id),
        username: Some(format!("user{id}")),
        first_name: format!("User {id}"),
    }
}

async fn say(app: &AppServices, id: u64, text: &str) -> Vec<Reply> {
    app.chat()
        .handle(Incoming::text(sender(id), text))
        .await
        .unwrap()
}

fn last(replies: &[Reply]) -> &Reply {
    replies.last().expect("at least one reply")
}

/// Extracts `?start=<code>` from the admin's link announcement.
fn code_from(reply: &Reply) -> String {
    let (_, rest) = reply.text.split_once("?start=").expect("link in reply");
    rest.split_whitespace().next().unwrap().to_string()
}

/// Answers every quiz question correctly, returning the replies to the last answer.
async fn pass_quiz(app: &AppServices, id: u64, mut replies: Vec<Reply>) -> Vec<Reply> {
    let bank = app.catalog().bank();
    loop {
        let prompt = last(&replies);
        let Some((_, question_text)) = prompt.text.split_once("\n\n") else {
            return replies;
        };
        let Some(question) = bank.questions().iter().find(|q| q.text() == question_text) else {
            return replies;
        };
        replies = say(app, id, question.correct_answer()).await;
    }
}

async fn create_link(app: &AppServices, partner: u64) -> String {
    let replies = say(app, ADMIN, &format!("/create_link tiktok crypto {partner}")).await;
    code_from(last(&replies))
}

#[tokio::test]
async fn referred_user_takes_quiz_and_completes_survey() {
    let app = services();
    let code = create_link(&app, 4521).await;
    assert!(code.starts_with("tiktok_4521_"));

    let greeting = say(&app, 42, &format!("/start {code}")).await;
    assert!(last(&greeting).text.contains("User 42"));
    assert_eq!(last(&greeting).keyboard.rows().len(), 4);

    let intro = say(&app, 42, MenuAction::LevelQuiz.label()).await;
    assert!(intro[1].text.starts_with("Питання 1/9"));
    assert!(matches!(intro[1].keyboard, Keyboard::Options { ref buttons, .. } if buttons.len() == 4));

    let after_quiz = pass_quiz(&app, 42, intro).await;
    assert!(after_quiz.iter().any(|r| r.text.contains("9/9 (100.0%)")));
    assert_eq!(last(&after_quiz).text, SurveyStep::Goal.prompt());

    for answer in [
        GOAL_OPTIONS[0],
        "4",
        "3-4 години",
        "300-500 грн",
        START_CHOICE_OPTIONS[0],
        PAYMENT_OPTIONS[1],
    ] {
        say(&app, 42, answer).await;
    }
    let done = app
        .chat()
        .handle(Incoming::contact(sender(42), "+380 67 123 45 67"))
        .await
        .unwrap();
    assert_eq!(last(&done).text, SURVEY_DONE);

    let leads = app.leads().recent(10).await.unwrap();
    assert_eq!(leads.len(), 1);
    let row = leads[0].sheet_row();
    assert_eq!(row[2], "@user42");
    assert_eq!(row[3], "9/9");
    assert!(row[5].starts_with("C2"));
    assert_eq!(row[13], "+380671234567");
    assert_eq!(row[14], code);

    let stats = app
        .referrals()
        .partner_stats(PartnerId::new(4521))
        .await
        .unwrap();
    assert_eq!(
        (stats.total_clicks, stats.total_starts, stats.total_completes),
        (1, 1, 1)
    );

    let report = say(&app, ADMIN, "/stats 4521").await;
    assert!(last(&report).text.contains("Всього кліків: 1"));
    assert!(last(&report).text.contains("TIKTOK"));
}

#[tokio::test]
async fn trial_lesson_skips_start_choice_and_payment() {
    let app = services();
    say(&app, 5, "/start").await;

    let first = say(&app, 5, MenuAction::TrialLesson.label()).await;
    assert_eq!(last(&first).text, SurveyStep::Goal.prompt());

    let mut replies = Vec::new();
    for answer in [GOAL_OPTIONS[1], "2", "1-2 години", "100-300 грн"] {
        replies = say(&app, 5, answer).await;
    }
    assert_eq!(last(&replies).text, SurveyStep::Phone.prompt());
    assert_eq!(last(&replies).keyboard, Keyboard::RequestContact);

    let bad = say(&app, 5, "call me maybe").await;
    assert_eq!(last(&bad).keyboard, Keyboard::RequestContact);

    let done = say(&app, 5, "0501234567").await;
    assert_eq!(last(&done).text, SURVEY_DONE);

    let leads = app.leads().recent(1).await.unwrap();
    assert_eq!(leads[0].quiz, None);
    assert_eq!(leads[0].answers.payment, None);
    assert_eq!(leads[0].referral_code, None);
}

#[tokio::test]
async fn invalid_answers_repeat_the_step() {
    let app = services();
    say(&app, 9, "/start").await;
    say(&app, 9, MenuAction::BuyCourse.label()).await;

    let replies = say(&app, 9, "because").await;
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1].text, SurveyStep::Goal.prompt());

    let next = say(&app, 9, GOAL_OPTIONS[2]).await;
    assert_eq!(last(&next).text, SurveyStep::Motivation.prompt());
}

#[tokio::test]
async fn quiz_rejects_answers_outside_the_options() {
    let app = services();
    say(&app, 11, "/start").await;
    let intro = say(&app, 11, MenuAction::LevelQuiz.label()).await;
    let question = intro[1].text.clone();

    let replies = say(&app, 11, "definitely not an option").await;
    assert_eq!(last(&replies).text, question);
}

#[tokio::test]
async fn cancel_returns_to_menu_from_the_quiz() {
    let app = services();
    say(&app, 12, "/start").await;
    say(&app, 12, MenuAction::LevelQuiz.label()).await;

    let cancelled = say(&app, 12, "/cancel").await;
    assert_eq!(last(&cancelled).keyboard.rows().len(), 4);

    let menu = say(&app, 12, MenuAction::ContactManager.label()).await;
    assert_eq!(menu.len(), 1);
}

#[tokio::test]
async fn admin_commands_are_ignored_for_other_users() {
    let app = services();
    assert!(say(&app, 77, "/stats").await.is_empty());
    assert!(say(&app, 77, "/create_link tiktok crypto").await.is_empty());
    assert_eq!(app.referrals().total_stats().await.unwrap().total_links, 0);

    let usage = say(&app, ADMIN, "/create_link tiktok").await;
    assert!(last(&usage).text.contains("/create_link platform theme"));

    let missing = say(&app, ADMIN, "/stats 9999").await;
    assert!(last(&missing).text.contains("9999"));
}

#[tokio::test]
async fn unknown_referral_code_does_not_attribute() {
    let app = services();
    let code = create_link(&app, 1000).await;

    say(&app, 20, "/start tiktok_1000_zzzzzz").await;
    // a later valid code still attributes: the first one never matched
    say(&app, 20, &format!("/start {code}")).await;
    // and a second valid /start does not double-attribute
    let other = create_link(&app, 2000).await;
    say(&app, 20, &format!("/start {other}")).await;

    let first = app
        .referrals()
        .partner_stats(PartnerId::new(1000))
        .await
        .unwrap();
    assert_eq!(first.total_clicks, 1);

    say(&app, 20, MenuAction::BuyCourse.label()).await;
    let first = app
        .referrals()
        .partner_stats(PartnerId::new(1000))
        .await
        .unwrap();
    let second = app
        .referrals()
        .partner_stats(PartnerId::new(2000))
        .await
        .unwrap();
    assert_eq!(first.total_starts, 1);
    assert_eq!(second.total_clicks, 1);
    assert_eq!(second.total_starts, 0);
}

#[tokio::test]
async fn sqlite_backend_serves_the_same_flow() {
    let app = AppServices::new_sqlite(
        "sqlite:file:memdb_chat_flow?mode=memory&cache=shared",
        fixed_clock(),
        Catalog::embedded().unwrap(),
        ChatSettings {
            admin_id: Some(UserId::new(ADMIN)),
            seed: Some(3),
            ..ChatSettings::default()
        },
    )
    .await
    .unwrap();

    let code = create_link(&app, 3000).await;
    say(&app, 8, &format!("/start {code}")).await;
    let totals = app.referrals().total_stats().await.unwrap();
    assert_eq!(totals.total_links, 1);
    assert_eq!(totals.total_conversions, 1);
}

/// Lead sheet whose first write fails.
struct FailingOnceLeads {
    inner: InMemoryRepository,
    failed: AtomicBool,
}

#[async_trait]
impl LeadRepository for FailingOnceLeads {
    async fn append_lead(&self, lead: &LeadRecord) -> Result<i64, StorageError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Connection("transient".into()));
        }
        self.inner.append_lead(lead).await
    }

    async fn list_leads(&self, limit: u32) -> Result<Vec<LeadRecord>, StorageError> {
        self.inner.list_leads(limit).await
    }
}

#[tokio::test]
async fn failed_lead_write_keeps_the_survey_for_a_retry() {
    let repo = InMemoryRepository::new();
    let mut storage = Storage::from_repository(repo.clone());
    storage.leads = Arc::new(FailingOnceLeads {
        inner: repo,
        failed: AtomicBool::new(false),
    });
    let app = AppServices::from_storage(
        &storage,
        fixed_clock(),
        Catalog::embedded().unwrap(),
        ChatSettings {
            seed: Some(5),
            ..ChatSettings::default()
        },
    );

    say(&app, 31, "/start").await;
    say(&app, 31, MenuAction::TrialLesson.label()).await;
    for answer in [GOAL_OPTIONS[1], "2", "1-2 години", "100-300 грн"] {
        say(&app, 31, answer).await;
    }

    let first = app
        .chat()
        .handle(Incoming::text(sender(31), "0501234567"))
        .await;
    assert!(first.is_err());
    assert!(app.leads().recent(10).await.unwrap().is_empty());

    let retry = say(&app, 31, "0501234567").await;
    assert_eq!(last(&retry).text, SURVEY_DONE);

    let leads = app.leads().recent(10).await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].answers.goal.as_deref(), Some(GOAL_OPTIONS[1]));
    assert_eq!(leads[0].answers.phone.as_deref(), Some("0501234567"));

    // back in the menu, nothing left to resubmit
    let menu = say(&app, 31, MenuAction::ContactManager.label()).await;
    assert_eq!(menu.len(), 1);
    assert_eq!(app.leads().recent(10).await.unwrap().len(), 1);
}
