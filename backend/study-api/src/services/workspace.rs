//! Async controllers that drive the session state machines against the
//! assessment service.
//!
//! Each controller owns one session behind a mutex. A request is started and
//! completed under the lock, but the lock is never held while the remote call
//! is awaited, so snapshots stay readable during long calls.
//!
//! The remote round trip runs on its own task. A caller that goes away (a
//! disconnected client, an elapsed timeout) stops waiting, but the completion
//! still lands and the session never stays stuck in flight.

use std::{future::Future, sync::Arc};
use tokio::sync::Mutex;

use crate::config::{Config, QuizSettings};
use crate::error::IntentError;
use crate::metrics::{
    record_fallback, record_stale_response, track_assessment_call, WORKSPACES_ACTIVE,
};
use crate::models::{
    ChatTurn, Document, FlashCardSnapshot, OptionKey, QuizSnapshot, SessionContext,
};
use crate::services::assessment_client::AssessmentService;
use crate::services::chat_session::{ChatSession, QuestionRequest};
use crate::services::flashcard_session::{FlashCardRequest, FlashCardSession};
use crate::services::quiz_session::{
    AnalysisRequest, AnalysisStep, Completion, EvaluationRequest, GenerationRequest, QuizSession,
    SaveReportRequest,
};

fn observe(operation: &str, completion: Completion) {
    match completion {
        Completion::Applied => {}
        Completion::Degraded => record_fallback(operation),
        Completion::Stale => {
            tracing::debug!("Discarding stale {} response", operation);
            record_stale_response(operation);
        }
    }
}

/// Runs `round_trip` to completion on a spawned task and waits for it.
/// Dropping the returned future only stops the waiting.
async fn detached<F>(operation: &'static str, round_trip: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Err(e) = tokio::spawn(round_trip).await {
        tracing::error!("{} task failed: {}", operation, e);
    }
}

/// Everything a spawned round trip needs: the caller's identity, the
/// service, and the session the completion is fed back into.
struct SessionLink<S> {
    context: SessionContext,
    service: Arc<dyn AssessmentService>,
    session: Arc<Mutex<S>>,
}

impl<S> Clone for SessionLink<S> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            service: self.service.clone(),
            session: self.session.clone(),
        }
    }
}

impl<S> SessionLink<S> {
    fn new(context: SessionContext, service: Arc<dyn AssessmentService>, session: S) -> Self {
        Self {
            context,
            service,
            session: Arc::new(Mutex::new(session)),
        }
    }
}

impl SessionLink<QuizSession> {
    async fn generate(&self, request: GenerationRequest) {
        tracing::info!(
            "Generating {} {} questions from {} for {}",
            request.question_count,
            request.difficulty.as_str(),
            self.context.document.name,
            self.context.identity
        );
        let result = track_assessment_call(
            "generate_quiz",
            self.service.generate_quiz(
                &self.context.identity,
                request.question_count,
                request.difficulty,
            ),
        )
        .await;
        let completion = self
            .session
            .lock()
            .await
            .complete_generation(request.token, result);
        observe("generate_quiz", completion);
    }

    /// Evaluation followed by mistake analysis, as one round trip.
    async fn evaluate_and_analyze(&self, request: EvaluationRequest) {
        if self.evaluate(request).await == Completion::Stale {
            return;
        }
        let step = self.session.lock().await.begin_analysis();
        match step {
            Some(AnalysisStep::Remote(request)) => self.analyze(request).await,
            Some(AnalysisStep::Synthesized) => tracing::info!(
                "Perfect score for {}; analysis synthesized locally",
                self.context.identity
            ),
            None => {}
        }
    }

    async fn evaluate(&self, request: EvaluationRequest) -> Completion {
        tracing::info!(
            "Evaluating {} answers for {}",
            request.answers.len(),
            self.context.identity
        );
        let result = track_assessment_call(
            "evaluate_quiz",
            self.service.evaluate_quiz(
                &self.context.identity,
                &request.questions,
                &request.answers,
            ),
        )
        .await;
        let completion = self
            .session
            .lock()
            .await
            .complete_evaluation(request.token, result);
        observe("evaluate_quiz", completion);
        completion
    }

    async fn analyze(&self, request: AnalysisRequest) {
        tracing::info!(
            "Analyzing {} mistakes for {}",
            request.wrong_answers.len(),
            self.context.identity
        );
        let result = track_assessment_call(
            "analyze_mistakes",
            self.service
                .analyze_mistakes(&self.context.identity, &request.wrong_answers),
        )
        .await;
        let completion = self
            .session
            .lock()
            .await
            .complete_analysis(request.token, result);
        observe("analyze_mistakes", completion);
    }

    async fn persist_report(&self, request: SaveReportRequest) {
        tracing::info!("Saving report for {}", self.context.identity);
        let result = track_assessment_call(
            "save_report",
            self.service
                .save_report(&self.context.identity, &request.report_payload),
        )
        .await;
        let completion = self
            .session
            .lock()
            .await
            .complete_save_report(request.token, result);
        observe("save_report", completion);
    }
}

pub struct QuizSessionController {
    link: SessionLink<QuizSession>,
    defaults: QuizSettings,
}

impl QuizSessionController {
    pub fn new(
        context: SessionContext,
        service: Arc<dyn AssessmentService>,
        defaults: QuizSettings,
    ) -> Self {
        Self {
            link: SessionLink::new(context, service, QuizSession::new(defaults)),
            defaults,
        }
    }

    pub fn defaults(&self) -> QuizSettings {
        self.defaults
    }

    pub async fn snapshot(&self) -> QuizSnapshot {
        self.link.session.lock().await.snapshot()
    }

    /// Runs the Generating entry action. Later calls are no-ops.
    pub async fn start(&self, settings: QuizSettings) -> QuizSnapshot {
        let request = self.link.session.lock().await.begin_generation(settings);
        if let Some(request) = request {
            let link = self.link.clone();
            detached("generate_quiz", async move { link.generate(request).await }).await;
        }
        self.snapshot().await
    }

    pub async fn select_answer(&self, key: OptionKey) -> QuizSnapshot {
        let mut session = self.link.session.lock().await;
        if session.select_answer(key) {
            tracing::debug!(
                "Answer {} recorded for question {}",
                key,
                session.current_index() + 1
            );
        }
        session.snapshot()
    }

    pub async fn go_next(&self) -> QuizSnapshot {
        let mut session = self.link.session.lock().await;
        session.go_next();
        session.snapshot()
    }

    pub async fn go_previous(&self) -> QuizSnapshot {
        let mut session = self.link.session.lock().await;
        session.go_previous();
        session.snapshot()
    }

    pub async fn jump_to(&self, index: usize) -> QuizSnapshot {
        let mut session = self.link.session.lock().await;
        session.jump_to(index);
        session.snapshot()
    }

    /// Submits, evaluates, and runs mistake analysis. An incomplete quiz or a
    /// submission already in flight leaves the session untouched.
    pub async fn submit(&self) -> QuizSnapshot {
        let request = self.link.session.lock().await.begin_evaluation();
        match request {
            Some(request) => {
                let link = self.link.clone();
                detached("evaluate_quiz", async move {
                    link.evaluate_and_analyze(request).await
                })
                .await;
            }
            None => tracing::debug!("Submit ignored: quiz is incomplete or already submitted"),
        }
        self.snapshot().await
    }

    pub async fn save_report(&self) -> QuizSnapshot {
        let request = self.link.session.lock().await.begin_save_report();
        match request {
            Some(request) => {
                let link = self.link.clone();
                detached("save_report", async move { link.persist_report(request).await }).await;
            }
            None => tracing::debug!("Save report ignored in current state"),
        }
        self.snapshot().await
    }

    pub async fn restart(&self) -> QuizSnapshot {
        let request = self.link.session.lock().await.restart();
        if let Some(request) = request {
            tracing::info!("Quiz restarted for {}", self.link.context.identity);
            let link = self.link.clone();
            detached("generate_quiz", async move { link.generate(request).await }).await;
        }
        self.snapshot().await
    }
}

impl SessionLink<FlashCardSession> {
    async fn generate(&self, request: FlashCardRequest) {
        tracing::info!(
            "Generating {} flashcards for {}",
            request.card_count,
            self.context.identity
        );
        let result = track_assessment_call(
            "generate_flashcards",
            self.service.generate_flashcards(
                &self.context.identity,
                &request.request_text,
                request.card_count,
            ),
        )
        .await;
        let completion = self
            .session
            .lock()
            .await
            .complete_generation(request.token, result);
        observe("generate_flashcards", completion);
    }
}

pub struct FlashCardSessionController {
    link: SessionLink<FlashCardSession>,
}

impl FlashCardSessionController {
    pub fn new(
        context: SessionContext,
        service: Arc<dyn AssessmentService>,
        default_card_count: u32,
    ) -> Self {
        Self {
            link: SessionLink::new(context, service, FlashCardSession::new(default_card_count)),
        }
    }

    pub async fn snapshot(&self) -> FlashCardSnapshot {
        self.link.session.lock().await.snapshot()
    }

    pub async fn set_draft(&self, text: String) -> FlashCardSnapshot {
        let mut session = self.link.session.lock().await;
        session.set_draft(text);
        session.snapshot()
    }

    pub async fn generate(
        &self,
        request_text: &str,
        card_count: Option<u32>,
    ) -> Result<FlashCardSnapshot, IntentError> {
        let request = self
            .link
            .session
            .lock()
            .await
            .begin_generation(request_text, card_count)?;
        match request {
            Some(request) => {
                let link = self.link.clone();
                detached("generate_flashcards", async move {
                    link.generate(request).await
                })
                .await;
            }
            None => tracing::debug!("Flashcard generation ignored: one is already running"),
        }
        Ok(self.snapshot().await)
    }

    pub async fn flip(&self) -> FlashCardSnapshot {
        let mut session = self.link.session.lock().await;
        session.flip();
        session.snapshot()
    }

    pub async fn next(&self) -> FlashCardSnapshot {
        let mut session = self.link.session.lock().await;
        session.next();
        session.snapshot()
    }

    pub async fn previous(&self) -> FlashCardSnapshot {
        let mut session = self.link.session.lock().await;
        session.previous();
        session.snapshot()
    }

    pub async fn back_to_requesting(&self) -> FlashCardSnapshot {
        let mut session = self.link.session.lock().await;
        session.back_to_requesting();
        session.snapshot()
    }
}

impl SessionLink<ChatSession> {
    async fn ask(&self, request: QuestionRequest) {
        let result = track_assessment_call(
            "ask",
            self.service.ask(&self.context.identity, &request.message),
        )
        .await;
        let completion = self
            .session
            .lock()
            .await
            .complete_question(request.token, result);
        observe("ask", completion);
    }
}

pub struct ChatSessionController {
    link: SessionLink<ChatSession>,
}

impl ChatSessionController {
    pub fn new(context: SessionContext, service: Arc<dyn AssessmentService>) -> Self {
        Self {
            link: SessionLink::new(context, service, ChatSession::new()),
        }
    }

    pub async fn history(&self) -> Vec<ChatTurn> {
        self.link.session.lock().await.history().to_vec()
    }

    pub async fn ask(&self, message: &str) -> Result<Vec<ChatTurn>, IntentError> {
        let request = self.link.session.lock().await.begin_question(message)?;
        match request {
            Some(request) => {
                let link = self.link.clone();
                detached("ask", async move { link.ask(request).await }).await;
            }
            None => tracing::debug!("Question ignored: an answer is still pending"),
        }
        Ok(self.history().await)
    }
}

/// Everything tied to one uploaded document. Dropping the workspace
/// discards every session; late responses land on the dropped controllers.
pub struct Workspace {
    pub document: Document,
    pub quiz: Arc<QuizSessionController>,
    pub flashcards: Arc<FlashCardSessionController>,
    pub chat: Arc<ChatSessionController>,
}

impl Workspace {
    pub fn new(config: &Config, service: Arc<dyn AssessmentService>, document: Document) -> Self {
        let context = SessionContext::new(config.assessment.identity.clone(), document.clone());

        WORKSPACES_ACTIVE.inc();
        Self {
            quiz: Arc::new(QuizSessionController::new(
                context.clone(),
                service.clone(),
                config.quiz,
            )),
            flashcards: Arc::new(FlashCardSessionController::new(
                context.clone(),
                service.clone(),
                config.flashcards.card_count,
            )),
            chat: Arc::new(ChatSessionController::new(context, service)),
            document,
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        WORKSPACES_ACTIVE.dec();
    }
}
