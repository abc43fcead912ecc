use serde::Deserialize;
use std::env;

use crate::models::Difficulty;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Upper bounds for configured counts; requests are validated against the same.
pub const MAX_QUESTION_COUNT: u32 = 20;
pub const MAX_CARD_COUNT: u32 = 50;

pub const DEFAULT_ALLOWED_MEDIA_TYPES: [&str; 4] = [
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    pub cors_origin: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub assessment: AssessmentSettings,
    pub quiz: QuizSettings,
    pub flashcards: FlashCardSettings,
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentSettings {
    pub base_url: String,
    /// Single tenant identity threaded through every remote call.
    pub identity: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QuizSettings {
    pub question_count: u32,
    pub difficulty: Difficulty,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            question_count: 5,
            difficulty: Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FlashCardSettings {
    pub card_count: u32,
}

impl Default for FlashCardSettings {
    fn default() -> Self {
        Self { card_count: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub max_bytes: u64,
    pub allowed_media_types: Vec<String>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_media_types: DEFAULT_ALLOWED_MEDIA_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Local .env is optional; real deployments pass plain environment
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let listen_addr = settings
            .get_string("server.listen_addr")
            .or_else(|_| env::var("LISTEN_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let cors_origin = settings
            .get_string("server.cors_origin")
            .or_else(|_| env::var("CORS_ORIGIN"))
            .ok()
            .filter(|value| !value.trim().is_empty());

        let otlp_endpoint = settings
            .get_string("telemetry.otlp_endpoint")
            .or_else(|_| env::var("OTEL_EXPORTER_OTLP_ENDPOINT"))
            .ok()
            .filter(|value| !value.trim().is_empty());

        let base_url = settings
            .get_string("assessment.base_url")
            .or_else(|_| env::var("ASSESSMENT_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        validate_base_url(&base_url)?;

        let identity = settings
            .get_string("assessment.identity")
            .or_else(|_| env::var("ASSESSMENT_IDENTITY"))
            .unwrap_or_else(|_| "student".to_string());

        let request_timeout_secs = read_u64(&settings, "assessment.request_timeout_secs")
            .or_else(|| env_u64("ASSESSMENT_TIMEOUT_SECS"))
            .filter(|v| *v > 0)
            .unwrap_or(60);

        let quiz_defaults = QuizSettings::default();
        let question_count = read_count(
            &settings,
            "quiz.question_count",
            MAX_QUESTION_COUNT,
            quiz_defaults.question_count,
        )?;
        let difficulty = match settings.get_string("quiz.difficulty") {
            Ok(raw) => raw
                .parse::<Difficulty>()
                .map_err(config::ConfigError::Message)?,
            Err(_) => quiz_defaults.difficulty,
        };

        let card_count = read_count(
            &settings,
            "flashcards.card_count",
            MAX_CARD_COUNT,
            FlashCardSettings::default().card_count,
        )?;

        let upload_defaults = UploadSettings::default();
        let max_bytes = read_u64(&settings, "upload.max_bytes")
            .filter(|v| *v > 0)
            .unwrap_or(upload_defaults.max_bytes);
        let allowed_media_types = settings
            .get_array("upload.allowed_media_types")
            .ok()
            .map(|values| {
                values
                    .into_iter()
                    .filter_map(|v| v.into_string().ok())
                    .collect::<Vec<_>>()
            })
            .filter(|values| !values.is_empty())
            .unwrap_or(upload_defaults.allowed_media_types);

        Ok(Config {
            listen_addr,
            cors_origin,
            otlp_endpoint,
            assessment: AssessmentSettings {
                base_url,
                identity,
                request_timeout_secs,
            },
            quiz: QuizSettings {
                question_count,
                difficulty,
            },
            flashcards: FlashCardSettings { card_count },
            upload: UploadSettings {
                max_bytes,
                allowed_media_types,
            },
        })
    }

    /// Configuration pointing at the given assessment service with all
    /// other values at their defaults.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Config {
            listen_addr: "127.0.0.1:0".to_string(),
            cors_origin: None,
            otlp_endpoint: None,
            assessment: AssessmentSettings {
                base_url: base_url.into(),
                identity: "student".to_string(),
                request_timeout_secs: 60,
            },
            quiz: QuizSettings::default(),
            flashcards: FlashCardSettings::default(),
            upload: UploadSettings::default(),
        }
    }
}

fn read_u64(settings: &config::Config, key: &str) -> Option<u64> {
    settings
        .get_int(key)
        .ok()
        .and_then(|v| u64::try_from(v).ok())
}

/// Reads a count in `1..=max`. A missing key yields `default`; a value that
/// is present but out of range is a configuration error.
fn read_count(
    settings: &config::Config,
    key: &str,
    max: u32,
    default: u32,
) -> Result<u32, config::ConfigError> {
    match settings.get_int(key) {
        Ok(value) => u32::try_from(value)
            .ok()
            .filter(|v| (1..=max).contains(v))
            .ok_or_else(|| {
                config::ConfigError::Message(format!(
                    "{} must be between 1 and {}. Got: {}",
                    key, max, value
                ))
            }),
        Err(config::ConfigError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

fn validate_base_url(raw: &str) -> Result<(), config::ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        config::ConfigError::Message(format!("Invalid assessment base URL '{}': {}", raw, e))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(config::ConfigError::Message(format!(
            "Assessment base URL must use http or https. Got: {}",
            parsed.scheme()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "APP_ENV",
            "APP__ASSESSMENT__BASE_URL",
            "APP__QUIZ__DIFFICULTY",
            "APP__QUIZ__QUESTION_COUNT",
            "APP__FLASHCARDS__CARD_COUNT",
            "ASSESSMENT_API_URL",
            "ASSESSMENT_IDENTITY",
            "ASSESSMENT_TIMEOUT_SECS",
            "LISTEN_ADDR",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::load().unwrap();
        assert_eq!(config.assessment.base_url, "http://localhost:8080");
        assert_eq!(config.assessment.identity, "student");
        assert_eq!(config.assessment.request_timeout_secs, 60);
        assert_eq!(config.quiz.question_count, 5);
        assert_eq!(config.quiz.difficulty, Difficulty::Medium);
        assert_eq!(config.flashcards.card_count, 10);
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.upload.allowed_media_types.len(), 4);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("ASSESSMENT_API_URL", "https://assessment.internal");
        env::set_var("ASSESSMENT_IDENTITY", "tenant-7");
        env::set_var("ASSESSMENT_TIMEOUT_SECS", "15");
        env::set_var("APP__QUIZ__DIFFICULTY", "hard");

        let config = Config::load().unwrap();
        assert_eq!(config.assessment.base_url, "https://assessment.internal");
        assert_eq!(config.assessment.identity, "tenant-7");
        assert_eq!(config.assessment.request_timeout_secs, 15);
        assert_eq!(config.quiz.difficulty, Difficulty::Hard);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_base_url_is_rejected() {
        clear_env();
        env::set_var("ASSESSMENT_API_URL", "ftp://example.com");
        assert!(Config::load().is_err());
        env::set_var("ASSESSMENT_API_URL", "not a url");
        assert!(Config::load().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_timeout_falls_back_to_default() {
        clear_env();
        env::set_var("ASSESSMENT_TIMEOUT_SECS", "0");
        let config = Config::load().unwrap();
        assert_eq!(config.assessment.request_timeout_secs, 60);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_out_of_range_counts_are_rejected() {
        clear_env();
        env::set_var("APP__QUIZ__QUESTION_COUNT", "21");
        let err = Config::load().unwrap_err();
        assert!(err.to_string().contains("quiz.question_count"));

        clear_env();
        env::set_var("APP__FLASHCARDS__CARD_COUNT", "0");
        let err = Config::load().unwrap_err();
        assert!(err.to_string().contains("flashcards.card_count"));

        clear_env();
        env::set_var("APP__QUIZ__QUESTION_COUNT", "12");
        env::set_var("APP__FLASHCARDS__CARD_COUNT", "50");
        let config = Config::load().unwrap();
        assert_eq!(config.quiz.question_count, 12);
        assert_eq!(config.flashcards.card_count, 50);
        clear_env();
    }
}
