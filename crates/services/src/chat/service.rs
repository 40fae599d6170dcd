use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use placement_core::Clock;
use placement_core::model::{ChatUser, ConversionKind, QuizOutcome, UserId};
use placement_core::survey::{StartFormat, Survey, SurveyError, SurveyProgress, SurveyStep};
use storage::repository::UserRepository;

use super::admin::{self, AdminCommand};
use super::menu::{self, MenuAction};
use super::reply::{Incoming, Keyboard, Reply, Sender};
use crate::error::{ChatError, QuizError, ReferralServiceError};
use crate::lead_service::LeadService;
use crate::quiz::{QuizService, QuizSession};
use crate::referral_service::ReferralService;

//
// ─── CONVERSATION STATE ────────────────────────────────────────────────────────
//

enum ChatState {
    Menu,
    Quiz(QuizSession),
    Survey(Survey),
}

/// Per-user conversation: where the user is and the RNG that drives their quiz.
struct Conversation {
    state: ChatState,
    rng: StdRng,
    /// Result of the last finished quiz, attached to the next lead.
    outcome: Option<QuizOutcome>,
}

impl Conversation {
    fn new(seed: u64) -> Self {
        Self {
            state: ChatState::Menu,
            rng: StdRng::seed_from_u64(seed),
            outcome: None,
        }
    }

    fn reset(&mut self) {
        self.state = ChatState::Menu;
        self.outcome = None;
    }

    fn is_idle(&self) -> bool {
        matches!(self.state, ChatState::Menu) && self.outcome.is_none()
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Transport-independent conversation engine.
///
/// Every inbound message produces zero or more replies. Conversations are
/// kept per user while a quiz or survey is in progress and dropped once the
/// user is back in the menu; messages of one user are handled one at a time.
pub struct ChatService {
    clock: Clock,
    admin_id: Option<UserId>,
    quiz: QuizService,
    leads: LeadService,
    referrals: ReferralService,
    users: Arc<dyn UserRepository>,
    conversations: Mutex<HashMap<UserId, Arc<Mutex<Conversation>>>>,
    master_rng: Mutex<StdRng>,
}

impl ChatService {
    /// `rng` seeds each new conversation's own RNG.
    #[must_use]
    pub fn new(
        clock: Clock,
        admin_id: Option<UserId>,
        quiz: QuizService,
        leads: LeadService,
        referrals: ReferralService,
        users: Arc<dyn UserRepository>,
        rng: StdRng,
    ) -> Self {
        Self {
            clock,
            admin_id,
            quiz,
            leads,
            referrals,
            users,
            conversations: Mutex::new(HashMap::new()),
            master_rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_id == Some(user_id)
    }

    /// Handles one inbound message.
    ///
    /// # Errors
    ///
    /// Returns `ChatError` on storage failures. User mistakes (unknown menu
    /// entries, invalid survey answers, malformed admin commands) are answered
    /// with a reply instead.
    pub async fn handle(&self, incoming: Incoming) -> Result<Vec<Reply>, ChatError> {
        let sender = &incoming.sender;
        let text = incoming.text.trim();
        tracing::debug!(user_id = %sender.id, text, "incoming message");

        let handle = self.conversation(sender.id).await;
        let mut guard = handle.lock().await;
        let conversation = &mut *guard;

        let result = if incoming.contact_phone.is_none() && text.starts_with('/') {
            self.on_command(conversation, sender, text).await
        } else {
            match conversation.state {
                ChatState::Menu => self.on_menu(conversation, sender, text).await,
                ChatState::Quiz(_) => self.on_quiz_answer(conversation, sender, text).await,
                ChatState::Survey(_) => {
                    let input = incoming.contact_phone.as_deref().unwrap_or(text);
                    self.on_survey_answer(conversation, sender, input).await
                }
            }
        };

        if conversation.is_idle() {
            self.forget(sender.id, &handle).await;
        }
        result
    }

    /// Drops an idle conversation so the map only holds users mid-quiz or
    /// mid-survey. Entries another message is waiting on are kept.
    async fn forget(&self, user_id: UserId, handle: &Arc<Mutex<Conversation>>) {
        let mut conversations = self.conversations.lock().await;
        // the map and `handle` are the only owners
        if Arc::strong_count(handle) == 2 {
            conversations.remove(&user_id);
        }
    }

    async fn conversation(&self, user_id: UserId) -> Arc<Mutex<Conversation>> {
        let mut conversations = self.conversations.lock().await;
        if let Some(existing) = conversations.get(&user_id) {
            return Arc::clone(existing);
        }
        let seed = self.master_rng.lock().await.random();
        let created = Arc::new(Mutex::new(Conversation::new(seed)));
        conversations.insert(user_id, Arc::clone(&created));
        created
    }

    /// Current user record, refreshed with the sender's profile.
    async fn load_user(&self, sender: &Sender) -> Result<ChatUser, ChatError> {
        let mut user = ChatUser::new(
            sender.id,
            sender.username.clone(),
            sender.first_name.clone(),
            self.clock.now(),
        );
        if let Some(existing) = self.users.get_user(sender.id).await? {
            user.created_at = existing.created_at;
            user.referral_code = existing.referral_code;
        }
        Ok(user)
    }

    //
    // ─── COMMANDS ──────────────────────────────────────────────────────────────
    //

    async fn on_command(
        &self,
        conversation: &mut Conversation,
        sender: &Sender,
        text: &str,
    ) -> Result<Vec<Reply>, ChatError> {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or_default();
        // `/start@my_bot` in group chats
        let command = command.split('@').next().unwrap_or(command);
        let args: Vec<&str> = parts.collect();

        match command {
            "/start" => self.on_start(conversation, sender, args.first().copied()).await,
            "/cancel" => {
                conversation.reset();
                Ok(vec![Reply::with_keyboard(menu::BACK_TO_MENU, menu::main_menu())])
            }
            _ => match AdminCommand::parse(command, &args) {
                Some(parsed) => {
                    if !self.is_admin(sender.id) {
                        tracing::debug!(user_id = %sender.id, command, "admin command ignored");
                        return Ok(Vec::new());
                    }
                    match parsed {
                        Ok(cmd) => self.on_admin(conversation, cmd).await,
                        Err(usage) => Ok(vec![Reply::text(usage.to_string())]),
                    }
                }
                None => Ok(vec![Reply::with_keyboard(
                    menu::UNKNOWN_COMMAND,
                    menu::main_menu(),
                )]),
            },
        }
    }

    async fn on_start(
        &self,
        conversation: &mut Conversation,
        sender: &Sender,
        code: Option<&str>,
    ) -> Result<Vec<Reply>, ChatError> {
        let mut user = self.load_user(sender).await?;
        if let Some(code) = code {
            self.referrals.register_start(&mut user, code).await?;
        }
        self.users.upsert_user(&user).await?;
        conversation.reset();
        tracing::info!(user_id = %user.id, referred = user.referral_code.is_some(), "user started");

        Ok(vec![Reply::with_keyboard(
            menu::greeting(&user.first_name),
            menu::main_menu(),
        )])
    }

    async fn on_admin(
        &self,
        conversation: &mut Conversation,
        command: AdminCommand,
    ) -> Result<Vec<Reply>, ChatError> {
        let text = match command {
            AdminCommand::CreateLink {
                platform,
                theme,
                partner_id,
            } => match self
                .referrals
                .create_link(&platform, &theme, partner_id, &mut conversation.rng)
                .await
            {
                Ok(created) => admin::created_link_text(&created),
                Err(ReferralServiceError::Referral(e)) => format!(
                    "❌ {e}\n\n{}",
                    admin::AdminCommandError::CreateLinkUsage
                ),
                Err(e) => return Err(e.into()),
            },
            AdminCommand::Stats { partner_id: None } => {
                admin::total_stats_text(&self.referrals.total_stats().await?)
            }
            AdminCommand::Stats {
                partner_id: Some(partner_id),
            } => match self.referrals.partner_stats(partner_id).await {
                Ok(stats) => admin::partner_stats_text(&stats),
                Err(ReferralServiceError::UnknownPartner(id)) => {
                    format!("❌ Партнера #{id} не знайдено.")
                }
                Err(e) => return Err(e.into()),
            },
        };
        Ok(vec![Reply::text(text)])
    }

    //
    // ─── MENU ──────────────────────────────────────────────────────────────────
    //

    async fn on_menu(
        &self,
        conversation: &mut Conversation,
        sender: &Sender,
        text: &str,
    ) -> Result<Vec<Reply>, ChatError> {
        match MenuAction::from_label(text) {
            Some(MenuAction::LevelQuiz) => self.start_quiz(conversation),
            Some(MenuAction::BuyCourse) => {
                self.start_survey(conversation, sender.id, Survey::new())
                    .await
            }
            Some(MenuAction::TrialLesson) => {
                self.start_survey(
                    conversation,
                    sender.id,
                    Survey::with_format(StartFormat::TrialFirst),
                )
                .await
            }
            Some(MenuAction::ContactManager) => Ok(vec![Reply::with_keyboard(
                menu::CONTACT_MANAGER,
                menu::main_menu(),
            )]),
            None => Ok(vec![Reply::with_keyboard(menu::MENU_HINT, menu::main_menu())]),
        }
    }

    //
    // ─── QUIZ ──────────────────────────────────────────────────────────────────
    //

    fn start_quiz(&self, conversation: &mut Conversation) -> Result<Vec<Reply>, ChatError> {
        conversation.outcome = None;
        match self.quiz.start(&mut conversation.rng) {
            Ok(session) => {
                let mut replies = vec![Reply::text(menu::QUIZ_INTRO)];
                replies.extend(question_reply(&session));
                conversation.state = ChatState::Quiz(session);
                Ok(replies)
            }
            Err(QuizError::Empty) => {
                tracing::warn!("quiz requested but no questions are available");
                Ok(vec![Reply::with_keyboard(
                    menu::QUIZ_UNAVAILABLE,
                    menu::main_menu(),
                )])
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn on_quiz_answer(
        &self,
        conversation: &mut Conversation,
        sender: &Sender,
        text: &str,
    ) -> Result<Vec<Reply>, ChatError> {
        let ChatState::Quiz(session) = &mut conversation.state else {
            return Ok(Vec::new());
        };

        if !session.is_option(text) {
            let mut replies = vec![Reply::text(menu::PICK_AN_OPTION)];
            replies.extend(question_reply(session));
            return Ok(replies);
        }

        let answer = session.answer(text)?;
        let mut replies = vec![Reply::text(menu::answer_feedback(
            answer.correct,
            &answer.correct_answer,
        ))];
        if !answer.is_complete {
            replies.extend(question_reply(session));
            return Ok(replies);
        }

        let outcome = session.outcome(self.quiz.scale());
        if let Some(outcome) = outcome {
            tracing::info!(
                user_id = %sender.id,
                correct = outcome.correct,
                total = outcome.total,
                level = %outcome.level_name,
                "quiz completed"
            );
            replies.push(Reply::text(menu::outcome_text(&outcome)));
            conversation.outcome = Some(outcome);
        }

        let survey = self
            .start_survey(conversation, sender.id, Survey::new())
            .await?;
        replies.extend(survey);
        Ok(replies)
    }

    //
    // ─── SURVEY ────────────────────────────────────────────────────────────────
    //

    async fn start_survey(
        &self,
        conversation: &mut Conversation,
        user_id: UserId,
        survey: Survey,
    ) -> Result<Vec<Reply>, ChatError> {
        self.referrals.track(user_id, ConversionKind::Start).await?;

        let mut replies = vec![Reply::text(menu::SURVEY_INTRO)];
        replies.extend(survey.current().map(step_reply));
        conversation.state = ChatState::Survey(survey);
        Ok(replies)
    }

    async fn on_survey_answer(
        &self,
        conversation: &mut Conversation,
        sender: &Sender,
        input: &str,
    ) -> Result<Vec<Reply>, ChatError> {
        let ChatState::Survey(survey) = &mut conversation.state else {
            return Ok(Vec::new());
        };

        // A finished survey still in place means its lead was not stored yet;
        // any message retries the submission.
        let progress = if survey.is_complete() {
            Ok(SurveyProgress::Complete)
        } else {
            survey.answer(input)
        };

        match progress {
            Ok(SurveyProgress::Next(step)) => Ok(vec![step_reply(step)]),
            Ok(SurveyProgress::Complete) => self.finish_survey(conversation, sender).await,
            Err(SurveyError::InvalidPhone { .. }) => Ok(vec![Reply::with_keyboard(
                menu::INVALID_PHONE,
                Keyboard::RequestContact,
            )]),
            Err(SurveyError::InvalidOption { step, .. }) => Ok(vec![
                Reply::text(menu::PICK_AN_OPTION),
                step_reply(step),
            ]),
            Err(e) => {
                tracing::warn!(user_id = %sender.id, error = %e, "survey reset");
                conversation.reset();
                Ok(vec![Reply::with_keyboard(menu::BACK_TO_MENU, menu::main_menu())])
            }
        }
    }

    /// Stores the lead of a completed survey and returns to the menu.
    ///
    /// The conversation keeps the survey and quiz outcome until the lead is
    /// stored, so a failed write can be retried.
    async fn finish_survey(
        &self,
        conversation: &mut Conversation,
        sender: &Sender,
    ) -> Result<Vec<Reply>, ChatError> {
        let ChatState::Survey(survey) = &conversation.state else {
            return Ok(Vec::new());
        };
        let answers = survey.answers().clone();

        let user = self.load_user(sender).await?;
        self.leads
            .record(&user, conversation.outcome.clone(), answers)
            .await?;
        // stored; a retry must not append the lead twice
        conversation.reset();

        self.referrals
            .track(user.id, ConversionKind::Complete)
            .await?;
        Ok(vec![Reply::with_keyboard(
            menu::SURVEY_DONE,
            menu::main_menu(),
        )])
    }
}

fn question_reply(session: &QuizSession) -> Option<Reply> {
    session.current().map(|prompt| {
        Reply::with_keyboard(
            menu::question_text(prompt.number, prompt.total, prompt.question.text()),
            Keyboard::options(prompt.options, 1),
        )
    })
}

fn step_reply(step: SurveyStep) -> Reply {
    Reply::with_keyboard(step.prompt(), menu::survey_keyboard(step))
}
