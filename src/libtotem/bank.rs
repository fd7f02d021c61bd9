use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

const BUILTIN_BANK: &str = include_str!("../../assets/bank.json");

/// Directory the built-in bank's image paths are relative to.
pub const BUILTIN_IMAGE_ROOT: &str = "assets";

/// Label given to answers that have no entry in the score table.
pub const UNDETERMINED: &str = "Undetermined";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub animal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

/// The questions of a quiz together with the option -> animal table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuizBank {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub scores: HashMap<String, ScoreEntry>,
}

#[derive(Debug, Error)]
pub enum BankError {
    #[error("cannot read quiz bank: {0}")]
    Read(#[from] io::Error),
    #[error("malformed quiz bank: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("quiz bank has no questions")]
    NoQuestions,
    #[error("question {0} has an empty prompt")]
    EmptyPrompt(usize),
    #[error("question {index} has {count} options, at least 2 are needed")]
    TooFewOptions { index: usize, count: usize },
    #[error("question {index} has an empty option")]
    EmptyOption { index: usize },
    #[error("question {index} lists option {option:?} twice")]
    DuplicateOption { index: usize, option: String },
}

impl Question {
    #[cfg(test)]
    pub fn new(prompt: impl Into<String>, options: &[&str]) -> Self {
        Self {
            prompt: prompt.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn option_index(&self, option: &str) -> Option<usize> {
        self.options.iter().position(|o| o == option)
    }
}

impl ScoreEntry {
    pub fn undetermined() -> Self {
        Self {
            animal: UNDETERMINED.to_string(),
            image: None,
        }
    }
}

impl QuizBank {
    /// The bank compiled into the binary.
    pub fn builtin() -> Result<QuizBank, BankError> {
        Self::from_json(BUILTIN_BANK)
    }

    pub fn from_json(json: &str) -> Result<QuizBank, BankError> {
        let bank: QuizBank = serde_json::from_str(json)?;
        bank.validate()?;
        Ok(bank)
    }

    pub fn load(path: &Path) -> Result<QuizBank, BankError> {
        let now = Instant::now();
        info!("[Bank] Loading quiz bank from {:?}", path);
        let json = std::fs::read_to_string(path)?;
        let bank = Self::from_json(&json)?;
        debug!(
            "[Bank] Loaded {} questions in {} ms.",
            bank.questions.len(),
            now.elapsed().as_millis()
        );
        Ok(bank)
    }

    pub fn validate(&self) -> Result<(), BankError> {
        if self.questions.is_empty() {
            return Err(BankError::NoQuestions);
        }
        for (index, question) in self.questions.iter().enumerate() {
            if question.prompt.trim().is_empty() {
                return Err(BankError::EmptyPrompt(index));
            }
            if question.options.len() < 2 {
                return Err(BankError::TooFewOptions {
                    index,
                    count: question.options.len(),
                });
            }
            let mut seen = HashSet::new();
            for option in &question.options {
                if option.is_empty() {
                    return Err(BankError::EmptyOption { index });
                }
                if !seen.insert(option.as_str()) {
                    return Err(BankError::DuplicateOption {
                        index,
                        option: option.clone(),
                    });
                }
                if !self.scores.contains_key(option) {
                    warn!(
                        "[Bank] Option {:?} of question {} has no score entry, it will count as {}",
                        option, index, UNDETERMINED
                    );
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Looks up an answer in the score table, falling back to the
    /// undetermined entry.
    pub fn score_of(&self, option: &str) -> ScoreEntry {
        self.scores
            .get(option)
            .cloned()
            .unwrap_or_else(ScoreEntry::undetermined)
    }

    /// Every animal a completed quiz can produce, sorted.
    pub fn animals(&self) -> Vec<String> {
        let mut animals: Vec<String> = self
            .scores
            .values()
            .map(|entry| entry.animal.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        animals.sort();
        animals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_bank_is_valid() {
        let bank = QuizBank::builtin().unwrap();
        assert_eq!(bank.len(), 5);
        assert!(bank.questions.iter().all(|q| q.options.len() == 4));
        assert_eq!(bank.animals(), vec!["Bear", "Dolphin", "Owl", "Wolf"]);
    }

    #[test]
    fn unknown_option_scores_undetermined() {
        let bank = QuizBank::builtin().unwrap();
        assert_eq!(bank.score_of("Sunset"), ScoreEntry::undetermined());
        assert_eq!(bank.score_of("Noon").animal, "Dolphin");
        assert_eq!(bank.score_of("Loyalty").animal, "Wolf");
    }

    #[test]
    fn builtin_bank_scores_every_option_with_a_shipped_image() {
        let bank = QuizBank::builtin().unwrap();
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join(BUILTIN_IMAGE_ROOT);
        for option in bank.questions.iter().flat_map(|q| &q.options) {
            let entry = bank.score_of(option);
            assert_ne!(entry.animal, UNDETERMINED, "{:?} is unscored", option);
            let image = entry.image.expect("every built-in animal has an image");
            assert!(root.join(&image).is_file(), "{:?} is missing", image);
        }
    }

    #[test]
    fn rejects_empty_bank() {
        let err = QuizBank::from_json(r#"{"questions": []}"#).unwrap_err();
        assert!(matches!(err, BankError::NoQuestions));
    }

    #[test]
    fn rejects_duplicate_options() {
        let json = r#"{"questions": [{"prompt": "?", "options": ["a", "a"]}]}"#;
        let err = QuizBank::from_json(json).unwrap_err();
        assert!(matches!(err, BankError::DuplicateOption { index: 0, .. }));
    }

    #[test]
    fn rejects_single_option_question() {
        let json = r#"{"questions": [{"prompt": "?", "options": ["a"]}]}"#;
        let err = QuizBank::from_json(json).unwrap_err();
        assert!(matches!(err, BankError::TooFewOptions { index: 0, count: 1 }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = QuizBank::from_json("{").unwrap_err();
        assert!(matches!(err, BankError::Malformed(_)));
    }

    #[test]
    fn loads_bank_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        std::fs::write(
            &path,
            r#"{
                "questions": [{"prompt": "Day or night?", "options": ["Day", "Night"]}],
                "scores": {"Night": {"animal": "Owl"}}
            }"#,
        )
        .unwrap();

        let bank = QuizBank::load(&path).unwrap();
        assert_eq!(bank.question(0).unwrap().option_index("Night"), Some(1));
        assert_eq!(bank.score_of("Night").image, None);
    }
}
