use serde::Deserialize;
use validator::Validate;

use super::{Difficulty, OptionKey};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartQuizRequest {
    #[validate(range(min = 1, max = 20))]
    pub question_count: Option<u32>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub option: OptionKey,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DraftRequest {
    #[validate(length(max = 2000))]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFlashCardsRequest {
    #[validate(length(max = 2000))]
    pub message: String,
    #[validate(range(min = 1, max = 50))]
    pub card_count: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(max = 2000))]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_count_bounds() {
        let ok = StartQuizRequest {
            question_count: Some(20),
            difficulty: None,
        };
        assert!(ok.validate().is_ok());

        let too_many = StartQuizRequest {
            question_count: Some(21),
            difficulty: None,
        };
        assert!(too_many.validate().is_err());

        assert!(StartQuizRequest::default().validate().is_ok());
    }

    #[test]
    fn test_card_count_bounds() {
        let request: GenerateFlashCardsRequest =
            serde_json::from_value(serde_json::json!({"message": "cells", "cardCount": 0}))
                .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_answer_option_is_parsed() {
        let request: AnswerRequest =
            serde_json::from_value(serde_json::json!({"option": "C"})).unwrap();
        assert_eq!(request.option, OptionKey::C);
        let invalid = serde_json::json!({"option": "E"});
        assert!(serde_json::from_value::<AnswerRequest>(invalid).is_err());
    }
}
