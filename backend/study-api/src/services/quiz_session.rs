//! Quiz session state machine.
//!
//! The session never performs I/O. Each network-dependent transition is split
//! into a `begin_*` call that moves into the waiting state and hands back a
//! request tagged with a [`RequestToken`], and a `complete_*` call that feeds
//! the result back in. Completions whose token is no longer the in-flight one
//! are ignored.

use std::collections::BTreeMap;
use std::mem;

use crate::config::QuizSettings;
use crate::error::ServiceError;
use crate::models::{
    quiz::QuestionView, Difficulty, EvaluationResult, MistakeAnalysis, OptionKey, Question,
    QuizSnapshot, QuizStatus, RequestToken, TokenCounter, WrongAnswer,
};
use crate::services::evaluation;

#[derive(Debug)]
enum QuizPhase {
    Generating,
    Presenting,
    Evaluating,
    ResultsReady {
        evaluation: EvaluationResult,
    },
    AnalyzingMistakes {
        evaluation: EvaluationResult,
    },
    AnalysisReady {
        evaluation: EvaluationResult,
        analysis: MistakeAnalysis,
    },
    SavingReport {
        evaluation: EvaluationResult,
        analysis: MistakeAnalysis,
    },
    ReportSaved {
        evaluation: EvaluationResult,
        analysis: MistakeAnalysis,
        storage_location: String,
    },
}

impl QuizPhase {
    fn status(&self) -> QuizStatus {
        match self {
            QuizPhase::Generating => QuizStatus::Generating,
            QuizPhase::Presenting => QuizStatus::Presenting,
            QuizPhase::Evaluating => QuizStatus::Evaluating,
            QuizPhase::ResultsReady { .. } => QuizStatus::ResultsReady,
            QuizPhase::AnalyzingMistakes { .. } => QuizStatus::AnalyzingMistakes,
            QuizPhase::AnalysisReady { .. } => QuizStatus::AnalysisReady,
            QuizPhase::SavingReport { .. } => QuizStatus::SavingReport,
            QuizPhase::ReportSaved { .. } => QuizStatus::ReportSaved,
        }
    }

    fn evaluation(&self) -> Option<&EvaluationResult> {
        match self {
            QuizPhase::ResultsReady { evaluation }
            | QuizPhase::AnalyzingMistakes { evaluation }
            | QuizPhase::AnalysisReady { evaluation, .. }
            | QuizPhase::SavingReport { evaluation, .. }
            | QuizPhase::ReportSaved { evaluation, .. } => Some(evaluation),
            _ => None,
        }
    }

    fn analysis(&self) -> Option<&MistakeAnalysis> {
        match self {
            QuizPhase::AnalysisReady { analysis, .. }
            | QuizPhase::SavingReport { analysis, .. }
            | QuizPhase::ReportSaved { analysis, .. } => Some(analysis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub token: RequestToken,
    pub question_count: u32,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub token: RequestToken,
    pub questions: Vec<Question>,
    pub answers: BTreeMap<usize, OptionKey>,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub token: RequestToken,
    pub wrong_answers: Vec<WrongAnswer>,
}

#[derive(Debug, Clone)]
pub struct SaveReportRequest {
    pub token: RequestToken,
    pub report_payload: serde_json::Value,
}

/// What `begin_analysis` decided.
#[derive(Debug, Clone)]
pub enum AnalysisStep {
    /// Mistakes exist; ask the service for feedback.
    Remote(AnalysisRequest),
    /// Perfect score; the analysis was produced locally.
    Synthesized,
}

/// How a completion was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A local continuation replaced the failed remote result.
    Degraded,
    /// The session moved on; the result was dropped.
    Stale,
}

#[derive(Debug)]
pub struct QuizSession {
    phase: QuizPhase,
    questions: Vec<Question>,
    current_index: usize,
    answers: BTreeMap<usize, OptionKey>,
    degraded: bool,
    notice: Option<String>,
    tokens: TokenCounter,
    in_flight: Option<RequestToken>,
    settings: QuizSettings,
}

impl QuizSession {
    /// A fresh session in Generating; nothing is requested until
    /// [`QuizSession::begin_generation`] runs the entry action.
    pub fn new(settings: QuizSettings) -> Self {
        Self {
            phase: QuizPhase::Generating,
            questions: Vec::new(),
            current_index: 0,
            answers: BTreeMap::new(),
            degraded: false,
            notice: None,
            tokens: TokenCounter::default(),
            in_flight: None,
            settings,
        }
    }

    pub fn status(&self) -> QuizStatus {
        self.phase.status()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn answers(&self) -> &BTreeMap<usize, OptionKey> {
        &self.answers
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn evaluation(&self) -> Option<&EvaluationResult> {
        self.phase.evaluation()
    }

    pub fn analysis(&self) -> Option<&MistakeAnalysis> {
        self.phase.analysis()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    fn issue(&mut self) -> RequestToken {
        let token = self.tokens.issue();
        self.in_flight = Some(token);
        token
    }

    /// Takes the in-flight slot if `token` still owns it.
    fn settle(&mut self, token: RequestToken) -> bool {
        if self.in_flight == Some(token) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Runs the Generating entry action once. Returns `None` when generation
    /// already ran or is in flight.
    pub fn begin_generation(&mut self, settings: QuizSettings) -> Option<GenerationRequest> {
        if !matches!(self.phase, QuizPhase::Generating) || self.in_flight.is_some() {
            return None;
        }
        self.settings = settings;
        Some(self.generation_request())
    }

    fn generation_request(&mut self) -> GenerationRequest {
        let token = self.issue();
        GenerationRequest {
            token,
            question_count: self.settings.question_count,
            difficulty: self.settings.difficulty,
        }
    }

    pub fn complete_generation(
        &mut self,
        token: RequestToken,
        result: Result<Vec<Question>, ServiceError>,
    ) -> Completion {
        if !matches!(self.phase, QuizPhase::Generating) || !self.settle(token) {
            return Completion::Stale;
        }

        let completion = match result {
            Ok(questions) if !questions.is_empty() => {
                self.questions = questions;
                self.degraded = false;
                Completion::Applied
            }
            Ok(_) => {
                tracing::warn!("Quiz generation returned no questions; using placeholder");
                self.use_placeholder();
                Completion::Degraded
            }
            Err(e) => {
                tracing::warn!("Quiz generation failed, using placeholder: {}", e);
                self.use_placeholder();
                Completion::Degraded
            }
        };

        self.current_index = 0;
        self.answers.clear();
        self.phase = QuizPhase::Presenting;
        completion
    }

    fn use_placeholder(&mut self) {
        self.questions = evaluation::placeholder_questions();
        self.degraded = true;
        self.notice = Some(
            "Questions could not be generated from your document. Showing a placeholder question."
                .to_string(),
        );
    }

    /// Records an answer for the current question; re-selecting overwrites.
    pub fn select_answer(&mut self, key: OptionKey) -> bool {
        if !matches!(self.phase, QuizPhase::Presenting) {
            return false;
        }
        self.answers.insert(self.current_index, key);
        true
    }

    pub fn go_next(&mut self) -> bool {
        if !matches!(self.phase, QuizPhase::Presenting)
            || self.current_index + 1 >= self.questions.len()
        {
            return false;
        }
        self.current_index += 1;
        true
    }

    pub fn go_previous(&mut self) -> bool {
        if !matches!(self.phase, QuizPhase::Presenting) || self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        if !matches!(self.phase, QuizPhase::Presenting) || index >= self.questions.len() {
            return false;
        }
        self.current_index = index;
        true
    }

    /// True when every question has an answer.
    pub fn can_submit(&self) -> bool {
        matches!(self.phase, QuizPhase::Presenting)
            && !self.questions.is_empty()
            && (0..self.questions.len()).all(|i| self.answers.contains_key(&i))
    }

    /// Submits the quiz. A no-op unless [`QuizSession::can_submit`].
    pub fn begin_evaluation(&mut self) -> Option<EvaluationRequest> {
        if !self.can_submit() {
            return None;
        }
        self.phase = QuizPhase::Evaluating;
        let token = self.issue();
        Some(EvaluationRequest {
            token,
            questions: self.questions.clone(),
            answers: self.answers.clone(),
        })
    }

    pub fn complete_evaluation(
        &mut self,
        token: RequestToken,
        result: Result<EvaluationResult, ServiceError>,
    ) -> Completion {
        if !matches!(self.phase, QuizPhase::Evaluating) || !self.settle(token) {
            return Completion::Stale;
        }

        let (evaluation, completion) = match result {
            Ok(evaluation) if evaluation.total_questions == self.questions.len() => {
                (evaluation, Completion::Applied)
            }
            Ok(evaluation) => {
                tracing::warn!(
                    "Evaluation covered {} of {} questions; scoring locally",
                    evaluation.total_questions,
                    self.questions.len()
                );
                (self.evaluate_locally(), Completion::Degraded)
            }
            Err(e) => {
                tracing::warn!("Remote evaluation failed, scoring locally: {}", e);
                (self.evaluate_locally(), Completion::Degraded)
            }
        };

        self.phase = QuizPhase::ResultsReady { evaluation };
        completion
    }

    fn evaluate_locally(&mut self) -> EvaluationResult {
        self.notice = Some(
            "The assessment service could not score this quiz; results were computed locally."
                .to_string(),
        );
        evaluation::evaluate_locally(&self.questions, &self.answers)
    }

    /// Leaves ResultsReady. A perfect score is analysed locally and moves
    /// straight to AnalysisReady.
    pub fn begin_analysis(&mut self) -> Option<AnalysisStep> {
        let evaluation = match mem::replace(&mut self.phase, QuizPhase::Generating) {
            QuizPhase::ResultsReady { evaluation } => evaluation,
            other => {
                self.phase = other;
                return None;
            }
        };

        if evaluation.is_perfect() {
            let analysis = evaluation::congratulatory_analysis(&evaluation);
            self.phase = QuizPhase::AnalysisReady {
                evaluation,
                analysis,
            };
            return Some(AnalysisStep::Synthesized);
        }

        let wrong_answers = evaluation.wrong_answers.clone();
        self.phase = QuizPhase::AnalyzingMistakes { evaluation };
        let token = self.issue();
        Some(AnalysisStep::Remote(AnalysisRequest {
            token,
            wrong_answers,
        }))
    }

    pub fn complete_analysis(
        &mut self,
        token: RequestToken,
        result: Result<MistakeAnalysis, ServiceError>,
    ) -> Completion {
        if !matches!(self.phase, QuizPhase::AnalyzingMistakes { .. }) || !self.settle(token) {
            return Completion::Stale;
        }
        let evaluation = match mem::replace(&mut self.phase, QuizPhase::Generating) {
            QuizPhase::AnalyzingMistakes { evaluation } => evaluation,
            other => {
                self.phase = other;
                return Completion::Stale;
            }
        };

        let (analysis, completion) = match result {
            Ok(mut analysis) => {
                if analysis.report_eligible && analysis.report_payload.is_none() {
                    analysis.report_payload = Some(evaluation::report_payload(
                        &evaluation,
                        &analysis.narrative_text,
                        &analysis.web_resources,
                    ));
                }
                (analysis, Completion::Applied)
            }
            Err(e) => {
                tracing::warn!("Mistake analysis failed: {}", e);
                self.notice = Some(format!("Mistake analysis is unavailable: {}", e));
                (evaluation::unavailable_analysis(), Completion::Degraded)
            }
        };

        self.phase = QuizPhase::AnalysisReady {
            evaluation,
            analysis,
        };
        completion
    }

    /// Starts saving the report. A no-op unless the analysis is report
    /// eligible and no save is already in flight.
    pub fn begin_save_report(&mut self) -> Option<SaveReportRequest> {
        let (evaluation, analysis) = match mem::replace(&mut self.phase, QuizPhase::Generating) {
            QuizPhase::AnalysisReady {
                evaluation,
                analysis,
            } if analysis.report_eligible => (evaluation, analysis),
            other => {
                self.phase = other;
                return None;
            }
        };

        let report_payload = analysis.report_payload.clone().unwrap_or_else(|| {
            evaluation::report_payload(
                &evaluation,
                &analysis.narrative_text,
                &analysis.web_resources,
            )
        });

        self.notice = None;
        self.phase = QuizPhase::SavingReport {
            evaluation,
            analysis,
        };
        let token = self.issue();
        Some(SaveReportRequest {
            token,
            report_payload,
        })
    }

    pub fn complete_save_report(
        &mut self,
        token: RequestToken,
        result: Result<String, ServiceError>,
    ) -> Completion {
        if !matches!(self.phase, QuizPhase::SavingReport { .. }) || !self.settle(token) {
            return Completion::Stale;
        }
        let (evaluation, analysis) = match mem::replace(&mut self.phase, QuizPhase::Generating) {
            QuizPhase::SavingReport {
                evaluation,
                analysis,
            } => (evaluation, analysis),
            other => {
                self.phase = other;
                return Completion::Stale;
            }
        };

        match result {
            Ok(storage_location) => {
                self.phase = QuizPhase::ReportSaved {
                    evaluation,
                    analysis,
                    storage_location,
                };
                Completion::Applied
            }
            Err(e) => {
                tracing::error!("Saving report failed: {}", e);
                self.notice = Some(format!("Could not save the report: {}", e));
                self.phase = QuizPhase::AnalysisReady {
                    evaluation,
                    analysis,
                };
                Completion::Degraded
            }
        }
    }

    /// Resets every session field and re-enters Generating. Not allowed
    /// while a generation is pending. Any other in-flight request becomes
    /// stale.
    pub fn restart(&mut self) -> Option<GenerationRequest> {
        if matches!(self.phase, QuizPhase::Generating) {
            return None;
        }
        self.phase = QuizPhase::Generating;
        self.questions.clear();
        self.current_index = 0;
        self.answers.clear();
        self.degraded = false;
        self.notice = None;
        self.in_flight = None;
        Some(self.generation_request())
    }

    pub fn snapshot(&self) -> QuizSnapshot {
        let evaluation = self.phase.evaluation();
        let reveal = evaluation.is_some();

        let questions = self
            .questions
            .iter()
            .map(|q| QuestionView {
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                correct_option_key: reveal.then_some(q.correct_option_key),
                explanation: reveal.then(|| q.explanation.clone()),
            })
            .collect();

        let storage_location = match &self.phase {
            QuizPhase::ReportSaved {
                storage_location, ..
            } => Some(storage_location.clone()),
            _ => None,
        };

        QuizSnapshot {
            status: self.status(),
            questions,
            current_index: self.current_index,
            answers: self.answers.clone(),
            answered_count: self.answers.len(),
            can_submit: self.can_submit(),
            degraded: self.degraded,
            evaluation: evaluation.map(EvaluationResult::summary),
            analysis: self.phase.analysis().cloned(),
            storage_location,
            notice: self.notice.clone(),
        }
    }
}
