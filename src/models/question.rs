// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::{engine::difficulty::Difficulty, utils::html::clean_html};

/// Letter addressing one of the four options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    /// Position of the option inside `Question::options`.
    pub fn index(self) -> usize {
        match self {
            OptionLetter::A => 0,
            OptionLetter::B => 1,
            OptionLetter::C => 2,
            OptionLetter::D => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "A" | "a" => Some(OptionLetter::A),
            "B" | "b" => Some(OptionLetter::B),
            "C" | "c" => Some(OptionLetter::C),
            "D" | "d" => Some(OptionLetter::D),
            _ => None,
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes an optional selection the way attempt documents store it:
/// the letter, or an empty string when the question timed out unanswered.
pub mod selected_option {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::OptionLetter;

    pub fn serialize<S: Serializer>(
        value: &Option<OptionLetter>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.map(OptionLetter::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OptionLetter>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        OptionLetter::parse(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid option letter '{raw}'")))
    }
}

/// What the player is shown: inline text or an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Prompt {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
}

/// One multiple-choice item inside a quiz document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(flatten)]
    pub prompt: Prompt,

    /// Exactly four options, addressed A to D.
    pub options: [String; 4],

    pub correct_option: OptionLetter,

    #[serde(default)]
    pub explanation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_image: Option<String>,

    /// Running difficulty signal, kept within the bounds of the difficulty rule.
    #[serde(default)]
    pub score: i32,

    /// Origin topic; only set on questions drawn into an "all topics" run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Question {
    pub fn is_correct(&self, selection: Option<OptionLetter>) -> bool {
        selection == Some(self.correct_option)
    }

    pub fn difficulty(&self) -> Difficulty {
        Difficulty::classify(self.score)
    }
}

/// A question as sent to a player who has not answered it yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    #[serde(flatten)]
    pub prompt: Prompt,
    pub options: [String; 4],
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(question: &Question) -> Self {
        Self {
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            difficulty: question.difficulty(),
            topic: question.topic.clone(),
        }
    }
}

/// A question as shown to its author, with the difficulty label attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub difficulty: Difficulty,
}

impl From<Question> for QuestionView {
    fn from(question: Question) -> Self {
        let difficulty = question.difficulty();
        Self {
            question,
            difficulty,
        }
    }
}

/// DTO for a question submitted by an author.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[serde(flatten)]
    #[validate(custom(function = validate_prompt))]
    pub prompt: Prompt,

    #[validate(custom(function = validate_options))]
    pub options: [String; 4],

    pub correct_option: OptionLetter,

    #[serde(default)]
    #[validate(length(max = 5000))]
    pub explanation: String,

    #[validate(url)]
    pub explanation_image: Option<String>,

    /// Authors may seed the difficulty signal; it is clamped on save.
    pub score: Option<i32>,
}

impl QuestionInput {
    /// Builds the stored question, sanitizing author text.
    pub fn into_question(self, min_score: i32, max_score: i32) -> Question {
        let prompt = match self.prompt {
            Prompt::Text { text } => Prompt::Text {
                text: clean_html(&text),
            },
            Prompt::Image { image_url } => Prompt::Image {
                image_url: image_url.trim().to_string(),
            },
        };

        Question {
            prompt,
            options: self.options.map(|option| clean_html(&option)),
            correct_option: self.correct_option,
            explanation: clean_html(&self.explanation),
            explanation_image: self.explanation_image.filter(|url| !url.trim().is_empty()),
            score: self.score.unwrap_or(0).clamp(min_score, max_score),
            topic: None,
        }
    }
}

/// A text prompt must carry text; an image prompt must carry a valid URL.
fn validate_prompt(prompt: &Prompt) -> Result<(), validator::ValidationError> {
    match prompt {
        Prompt::Text { text } => {
            if text.trim().is_empty() {
                return Err(validator::ValidationError::new("prompt_text_required"));
            }
            if text.len() > 2000 {
                return Err(validator::ValidationError::new("prompt_text_too_long"));
            }
        }
        Prompt::Image { image_url } => {
            if Url::parse(image_url.trim()).is_err() {
                return Err(validator::ValidationError::new("prompt_image_invalid_url"));
            }
        }
    }
    Ok(())
}

fn validate_options(options: &[String; 4]) -> Result<(), validator::ValidationError> {
    for option in options {
        if option.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
