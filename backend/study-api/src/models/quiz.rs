use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionKey {
    A,
    B,
    C,
    D,
}

impl OptionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::A => "A",
            OptionKey::B => "B",
            OptionKey::C => "C",
            OptionKey::D => "D",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OptionKey::A),
            "B" => Ok(OptionKey::B),
            "C" => Ok(OptionKey::C),
            "D" => Ok(OptionKey::D),
            _ => Err(format!("Invalid option key: {}", value)),
        }
    }
}

/// The four answer options of a question, keyed A-D on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl AnswerOptions {
    pub fn get(&self, key: OptionKey) -> &str {
        match key {
            OptionKey::A => &self.a,
            OptionKey::B => &self.b,
            OptionKey::C => &self.c,
            OptionKey::D => &self.d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub prompt: String,
    pub options: AnswerOptions,
    pub correct_option_key: OptionKey,
    pub explanation: String,
}

impl Question {
    /// Builds a question, deriving the explanation from the correct option
    /// when the generator did not provide one.
    pub fn new(
        prompt: impl Into<String>,
        options: AnswerOptions,
        correct_option_key: OptionKey,
        explanation: Option<String>,
    ) -> Self {
        let explanation = explanation
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "Correct answer: {}) {}",
                    correct_option_key,
                    options.get(correct_option_key)
                )
            });

        Self {
            prompt: prompt.into(),
            options,
            correct_option_key,
            explanation,
        }
    }

    /// Renders an option as "X) text".
    pub fn option_text(&self, key: OptionKey) -> String {
        format!("{}) {}", key, self.options.get(key))
    }

    pub fn correct_option_text(&self) -> String {
        self.option_text(self.correct_option_key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Invalid difficulty: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Generating,
    Presenting,
    Evaluating,
    ResultsReady,
    AnalyzingMistakes,
    AnalysisReady,
    SavingReport,
    ReportSaved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswer {
    /// 1-based position of the question in the quiz.
    pub question_number: usize,
    pub question_text: String,
    #[serde(alias = "studentAnswer")]
    pub chosen_option_text: String,
    #[serde(alias = "correctAnswer")]
    pub correct_option_text: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub total_questions: usize,
    pub correct_count: usize,
    pub wrong_answers: Vec<WrongAnswer>,
}

impl EvaluationResult {
    /// round(100 * correct / total), half rounding up. Zero for an empty quiz.
    pub fn percentage(&self) -> u32 {
        if self.total_questions == 0 {
            return 0;
        }
        let correct = self.correct_count as u64;
        let total = self.total_questions as u64;
        ((200 * correct + total) / (2 * total)) as u32
    }

    pub fn is_perfect(&self) -> bool {
        self.wrong_answers.is_empty()
    }

    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            total_questions: self.total_questions,
            correct_count: self.correct_count,
            percentage: self.percentage(),
            wrong_answers: self.wrong_answers.clone(),
        }
    }
}

/// Read model of an evaluation; `percentage` is derived at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub total_questions: usize,
    pub correct_count: usize,
    pub percentage: u32,
    pub wrong_answers: Vec<WrongAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebResource {
    pub topic: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeAnalysis {
    pub narrative_text: String,
    pub web_resources: Vec<WebResource>,
    pub report_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_payload: Option<serde_json::Value>,
}

/// A question as the presentation layer sees it. The answer key is only
/// revealed once the quiz has been evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub prompt: String,
    pub options: AnswerOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option_key: Option<OptionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSnapshot {
    pub status: QuizStatus,
    pub questions: Vec<QuestionView>,
    pub current_index: usize,
    pub answers: BTreeMap<usize, OptionKey>,
    pub answered_count: usize,
    pub can_submit: bool,
    pub degraded: bool,
    pub evaluation: Option<EvaluationSummary>,
    pub analysis: Option<MistakeAnalysis>,
    pub storage_location: Option<String>,
    pub notice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> AnswerOptions {
        AnswerOptions {
            a: "alpha".to_string(),
            b: "beta".to_string(),
            c: "gamma".to_string(),
            d: "delta".to_string(),
        }
    }

    fn evaluation(total: usize, correct: usize) -> EvaluationResult {
        EvaluationResult {
            total_questions: total,
            correct_count: correct,
            wrong_answers: Vec::new(),
        }
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(evaluation(3, 1).percentage(), 33);
        assert_eq!(evaluation(3, 2).percentage(), 67);
        assert_eq!(evaluation(8, 1).percentage(), 13); // 12.5
        assert_eq!(evaluation(5, 5).percentage(), 100);
        assert_eq!(evaluation(5, 0).percentage(), 0);
    }

    #[test]
    fn test_percentage_matches_float_rounding() {
        for total in 1..=40usize {
            for correct in 0..=total {
                let expected = (100.0 * correct as f64 / total as f64).round() as u32;
                assert_eq!(
                    evaluation(total, correct).percentage(),
                    expected,
                    "{}/{}",
                    correct,
                    total
                );
            }
        }
    }

    #[test]
    fn test_question_default_explanation() {
        let question = Question::new("Pick", options(), OptionKey::C, None);
        assert_eq!(question.explanation, "Correct answer: C) gamma");

        let blank = Question::new("Pick", options(), OptionKey::B, Some("  ".to_string()));
        assert_eq!(blank.explanation, "Correct answer: B) beta");

        let given = Question::new("Pick", options(), OptionKey::B, Some("Because".to_string()));
        assert_eq!(given.explanation, "Because");
    }

    #[test]
    fn test_option_text_format() {
        let question = Question::new("Pick", options(), OptionKey::A, None);
        assert_eq!(question.option_text(OptionKey::D), "D) delta");
        assert_eq!(question.correct_option_text(), "A) alpha");
    }

    #[test]
    fn test_option_key_parse() {
        assert_eq!("a".parse::<OptionKey>().unwrap(), OptionKey::A);
        assert_eq!(" D ".parse::<OptionKey>().unwrap(), OptionKey::D);
        assert!("E".parse::<OptionKey>().is_err());
    }

    #[test]
    fn test_answer_options_require_all_keys() {
        let missing = serde_json::json!({"A": "1", "B": "2", "C": "3"});
        assert!(serde_json::from_value::<AnswerOptions>(missing).is_err());
    }

    #[test]
    fn test_wrong_answer_accepts_legacy_field_names() {
        let json = serde_json::json!({
            "questionNumber": 2,
            "questionText": "Q",
            "studentAnswer": "Not answered",
            "correctAnswer": "A) alpha"
        });
        let wrong: WrongAnswer = serde_json::from_value(json).unwrap();
        assert_eq!(wrong.chosen_option_text, "Not answered");
        assert_eq!(wrong.correct_option_text, "A) alpha");
        assert_eq!(wrong.explanation, "");
    }
}
