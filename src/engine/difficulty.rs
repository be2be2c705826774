// src/engine/difficulty.rs

use std::fmt;

use serde::Serialize;

/// Display label derived from a question's difficulty signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Difficulty {
    #[serde(rename = "Very Easy")]
    VeryEasy,
    Easy,
    Moderate,
    Hard,
    Mindfuck,
}

impl Difficulty {
    /// Maps every integer score to exactly one label.
    pub fn classify(score: i32) -> Self {
        match score {
            80.. => Difficulty::VeryEasy,
            40..=79 => Difficulty::Easy,
            -30..=39 => Difficulty::Moderate,
            -70..=-31 => Difficulty::Hard,
            _ => Difficulty::Mindfuck,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::VeryEasy => "Very Easy",
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Hard => "Hard",
            Difficulty::Mindfuck => "Mindfuck",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
