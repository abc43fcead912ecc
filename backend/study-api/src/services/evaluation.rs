//! Local continuations used when the assessment service is unavailable.
//!
//! Everything here is deterministic: the same questions and answers always
//! produce the same result, matching what the remote evaluator returns for
//! well-formed input.

use serde_json::json;
use std::collections::BTreeMap;

use crate::models::{
    quiz::AnswerOptions, EvaluationResult, MistakeAnalysis, OptionKey, Question, WebResource,
    WrongAnswer,
};

pub const NOT_ANSWERED: &str = "not answered";

const PERFECT_SCORE_NARRATIVE: &str = "Excellent work! You answered every question correctly. \
     There are no mistakes to review; keep practising to stay sharp.";

const ANALYSIS_UNAVAILABLE_NARRATIVE: &str =
    "Detailed feedback is not available right now. Review the explanations for each \
     question you missed and try the quiz again.";

/// Single question shown when generation fails, so the session stays usable.
pub fn placeholder_questions() -> Vec<Question> {
    vec![Question::new(
        "There was a problem preparing questions from your document. Please try again.",
        AnswerOptions {
            a: "Re-upload the document".to_string(),
            b: "Restart the quiz".to_string(),
            c: "Try a different document".to_string(),
            d: "Contact support".to_string(),
        },
        OptionKey::A,
        None,
    )]
}

/// Scores the quiz by comparing each stored answer with the answer key.
/// Unanswered questions count as wrong.
pub fn evaluate_locally(
    questions: &[Question],
    answers: &BTreeMap<usize, OptionKey>,
) -> EvaluationResult {
    let mut correct_count = 0;
    let mut wrong_answers = Vec::new();

    for (index, question) in questions.iter().enumerate() {
        let chosen = answers.get(&index).copied();
        if chosen == Some(question.correct_option_key) {
            correct_count += 1;
            continue;
        }

        wrong_answers.push(WrongAnswer {
            question_number: index + 1,
            question_text: question.prompt.clone(),
            chosen_option_text: chosen
                .map(|key| question.option_text(key))
                .unwrap_or_else(|| NOT_ANSWERED.to_string()),
            correct_option_text: question.correct_option_text(),
            explanation: question.explanation.clone(),
        });
    }

    EvaluationResult {
        total_questions: questions.len(),
        correct_count,
        wrong_answers,
    }
}

/// Report body submitted to `saveReport` when the analysis did not carry one.
pub fn report_payload(
    evaluation: &EvaluationResult,
    narrative: &str,
    web_resources: &[WebResource],
) -> serde_json::Value {
    json!({
        "totalQuestions": evaluation.total_questions,
        "correctCount": evaluation.correct_count,
        "percentage": evaluation.percentage(),
        "wrongAnswers": evaluation.wrong_answers,
        "analysis": narrative,
        "webResources": web_resources,
    })
}

/// Analysis for a quiz without mistakes; no remote call is made.
pub fn congratulatory_analysis(evaluation: &EvaluationResult) -> MistakeAnalysis {
    MistakeAnalysis {
        narrative_text: PERFECT_SCORE_NARRATIVE.to_string(),
        web_resources: Vec::new(),
        report_eligible: true,
        report_payload: Some(report_payload(evaluation, PERFECT_SCORE_NARRATIVE, &[])),
    }
}

pub fn unavailable_analysis() -> MistakeAnalysis {
    MistakeAnalysis {
        narrative_text: ANALYSIS_UNAVAILABLE_NARRATIVE.to_string(),
        web_resources: Vec::new(),
        report_eligible: false,
        report_payload: None,
    }
}
