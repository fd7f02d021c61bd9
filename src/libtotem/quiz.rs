use crate::libtotem::bank::{Question, QuizBank, UNDETERMINED};
use crate::libtotem::session::{SessionStore, UserId};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("user {0} has no quiz in progress")]
    UnknownSession(UserId),
    #[error("answer for question {got} arrived while question {expected} is open")]
    StaleAnswer { expected: usize, got: usize },
    #[error("{option:?} is not an option of question {question}")]
    InvalidOption { question: usize, option: String },
}

/// Where a user stands in the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    NotStarted,
    Answering(usize),
    Completed,
}

/// What to show after an answer was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Question(usize, &'a Question),
    Completed,
}

/// Distinct animals of a finished quiz with the images recorded for each.
/// Iteration order of the labels is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TotemResult {
    pub animals: HashMap<String, BTreeSet<PathBuf>>,
}

impl TotemResult {
    pub fn is_empty(&self) -> bool {
        self.animals.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, animal: &str) -> bool {
        self.animals.contains_key(animal)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.animals.keys().map(String::as_str).collect()
    }

    pub fn is_undetermined(animal: &str) -> bool {
        animal == UNDETERMINED
    }
}

pub struct QuizEngine {
    bank: QuizBank,
    sessions: SessionStore,
}

impl QuizEngine {
    pub fn new(bank: QuizBank) -> Self {
        Self {
            bank,
            sessions: SessionStore::new(),
        }
    }

    pub fn bank(&self) -> &QuizBank {
        &self.bank
    }

    pub fn question_count(&self) -> usize {
        self.bank.len()
    }

    pub fn start_quiz(&mut self, user: UserId) -> &Question {
        info!("[Quiz] User {} started the quiz", user);
        self.sessions.reset(user);
        &self.bank.questions[0]
    }

    pub fn state(&self, user: UserId) -> QuizState {
        match self.sessions.answers(user) {
            None => QuizState::NotStarted,
            Some(answers) if answers.len() >= self.bank.len() => QuizState::Completed,
            Some(answers) => QuizState::Answering(answers.len()),
        }
    }

    /// Records `selected` as the answer to `question_index` and returns the
    /// following step. Nothing is recorded when an error is returned.
    pub fn next_question(
        &mut self,
        user: UserId,
        question_index: usize,
        selected: &str,
    ) -> Result<Step<'_>, QuizError> {
        let expected = match self.state(user) {
            QuizState::NotStarted => {
                warn!("[Quiz] Answer from user {} without a session", user);
                return Err(QuizError::UnknownSession(user));
            }
            QuizState::Answering(index) => index,
            QuizState::Completed => {
                return Err(QuizError::StaleAnswer {
                    expected: self.bank.len(),
                    got: question_index,
                })
            }
        };
        if question_index != expected {
            debug!(
                "[Quiz] Stale answer from user {}: got {}, expected {}",
                user, question_index, expected
            );
            return Err(QuizError::StaleAnswer {
                expected,
                got: question_index,
            });
        }
        let valid = self.bank.questions[question_index]
            .option_index(selected)
            .is_some();
        if !valid {
            return Err(QuizError::InvalidOption {
                question: question_index,
                option: selected.to_string(),
            });
        }

        self.sessions
            .record(user, selected.to_string())
            .ok_or(QuizError::UnknownSession(user))?;
        debug!(
            "[Quiz] User {} answered question {} with {:?}",
            user, question_index, selected
        );

        let next = question_index + 1;
        Ok(match self.bank.question(next) {
            Some(question) => Step::Question(next, question),
            None => {
                info!("[Quiz] User {} completed the quiz", user);
                Step::Completed
            }
        })
    }

    pub fn score(&self, user: UserId) -> Result<TotemResult, QuizError> {
        let answers = self
            .sessions
            .answers(user)
            .ok_or(QuizError::UnknownSession(user))?;

        let mut result = TotemResult::default();
        for answer in answers {
            let entry = self.bank.score_of(answer);
            let images = result.animals.entry(entry.animal).or_default();
            if let Some(image) = entry.image {
                images.insert(image);
            }
        }
        debug!("[Quiz] User {} scored {:?}", user, result.labels());
        Ok(result)
    }

    pub fn evict_idle(&mut self, max_idle: Duration) -> usize {
        self.sessions.evict_idle(max_idle)
    }

    #[cfg(test)]
    pub fn end_session(&mut self, user: UserId) -> bool {
        self.sessions.evict(user)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libtotem::bank::ScoreEntry;
    use proptest::prelude::*;

    fn entry(animal: &str, image: Option<&str>) -> ScoreEntry {
        ScoreEntry {
            animal: animal.to_string(),
            image: image.map(PathBuf::from),
        }
    }

    fn three_question_bank() -> QuizBank {
        QuizBank {
            questions: vec![
                Question::new("Q1", &["pack", "book"]),
                Question::new("Q2", &["night", "forest"]),
                Question::new("Q3", &["howl", "hoot"]),
            ],
            scores: [
                ("pack", entry("Wolf", Some("wolf.jpg"))),
                ("book", entry("Owl", Some("owl.jpg"))),
                ("night", entry("Owl", Some("owl.jpg"))),
                ("forest", entry("Wolf", Some("wolf.jpg"))),
                ("howl", entry("Wolf", Some("wolf-howl.jpg"))),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        }
    }

    fn answer_all(engine: &mut QuizEngine, user: UserId, answers: &[&str]) {
        engine.start_quiz(user);
        for (index, answer) in answers.iter().enumerate() {
            engine.next_question(user, index, answer).unwrap();
        }
    }

    #[test]
    fn start_returns_first_question() {
        let mut engine = QuizEngine::new(three_question_bank());
        assert_eq!(engine.state(1), QuizState::NotStarted);
        assert_eq!(engine.start_quiz(1).prompt, "Q1");
        assert_eq!(engine.state(1), QuizState::Answering(0));
    }

    #[test]
    fn wolf_owl_wolf_scores_two_animals() {
        let mut engine = QuizEngine::new(three_question_bank());
        answer_all(&mut engine, 1, &["pack", "night", "howl"]);

        let result = engine.score(1).unwrap();
        let mut labels = result.labels();
        labels.sort_unstable();
        assert_eq!(labels, ["Owl", "Wolf"]);
        assert_eq!(result.animals["Wolf"].len(), 2);
    }

    #[test]
    fn shared_label_appears_once() {
        let mut engine = QuizEngine::new(three_question_bank());
        answer_all(&mut engine, 1, &["book", "night", "hoot"]);

        let result = engine.score(1).unwrap();
        assert_eq!(result.animals.len(), 2);
        assert!(result.contains("Owl"));
        assert!(result.contains(UNDETERMINED));
        assert!(result.animals[UNDETERMINED].is_empty());
    }

    #[test]
    fn last_answer_completes() {
        let mut engine = QuizEngine::new(three_question_bank());
        engine.start_quiz(1);
        engine.next_question(1, 0, "pack").unwrap();
        assert!(matches!(
            engine.next_question(1, 1, "night"),
            Ok(Step::Question(2, _))
        ));
        assert_eq!(engine.next_question(1, 2, "hoot"), Ok(Step::Completed));
        assert_eq!(engine.state(1), QuizState::Completed);
    }

    #[test]
    fn restart_clears_previous_answers() {
        let mut engine = QuizEngine::new(three_question_bank());
        answer_all(&mut engine, 1, &["pack", "night", "howl"]);
        engine.start_quiz(1);
        assert_eq!(engine.state(1), QuizState::Answering(0));
        assert!(engine.score(1).unwrap().is_empty());

        engine.next_question(1, 0, "book").unwrap();
        assert_eq!(engine.score(1).unwrap().labels(), ["Owl"]);
    }

    #[test]
    fn unknown_user_is_rejected_without_side_effects() {
        let mut engine = QuizEngine::new(three_question_bank());
        engine.start_quiz(1);
        engine.next_question(1, 0, "pack").unwrap();

        assert_eq!(
            engine.next_question(2, 0, "book"),
            Err(QuizError::UnknownSession(2))
        );
        assert_eq!(engine.score(2), Err(QuizError::UnknownSession(2)));
        assert_eq!(engine.state(1), QuizState::Answering(1));
        assert_eq!(engine.state(2), QuizState::NotStarted);
        assert_eq!(engine.active_sessions(), 1);
    }

    #[test]
    fn stale_and_late_answers_are_rejected() {
        let mut engine = QuizEngine::new(three_question_bank());
        engine.start_quiz(1);
        engine.next_question(1, 0, "pack").unwrap();
        assert_eq!(
            engine.next_question(1, 0, "book"),
            Err(QuizError::StaleAnswer { expected: 1, got: 0 })
        );

        engine.next_question(1, 1, "night").unwrap();
        engine.next_question(1, 2, "howl").unwrap();
        assert_eq!(
            engine.next_question(1, 2, "hoot"),
            Err(QuizError::StaleAnswer { expected: 3, got: 2 })
        );
        assert_eq!(engine.score(1).unwrap().animals.len(), 2);
    }

    #[test]
    fn option_must_belong_to_question() {
        let mut engine = QuizEngine::new(three_question_bank());
        engine.start_quiz(1);
        assert_eq!(
            engine.next_question(1, 0, "howl"),
            Err(QuizError::InvalidOption {
                question: 0,
                option: "howl".into()
            })
        );
        assert_eq!(engine.state(1), QuizState::Answering(0));
    }

    #[test]
    fn sessions_can_be_ended() {
        let mut engine = QuizEngine::new(three_question_bank());
        engine.start_quiz(4);
        assert!(engine.end_session(4));
        assert_eq!(engine.state(4), QuizState::NotStarted);
    }

    proptest! {
        #[test]
        fn full_runs_score_known_labels(picks in proptest::collection::vec(0usize..4, 5)) {
            let bank = QuizBank::builtin().unwrap();
            let mut engine = QuizEngine::new(bank.clone());
            engine.start_quiz(9);
            for (index, pick) in picks.iter().enumerate() {
                let option = bank.questions[index].options[*pick].clone();
                prop_assert_eq!(engine.state(9), QuizState::Answering(index));
                engine.next_question(9, index, &option).unwrap();
            }
            prop_assert_eq!(engine.state(9), QuizState::Completed);

            let result = engine.score(9).unwrap();
            prop_assert!(!result.is_empty());
            let known = bank.animals();
            for label in result.labels() {
                prop_assert!(known.iter().any(|a| a == label) || TotemResult::is_undetermined(label));
            }
        }

        #[test]
        fn answer_count_never_exceeds_questions(picks in proptest::collection::vec((0usize..6, 0usize..2), 0..12)) {
            let mut engine = QuizEngine::new(three_question_bank());
            engine.start_quiz(1);
            for (index, pick) in picks {
                let option = ["pack", "book", "night", "forest", "howl", "hoot"][(index * 2 + pick) % 6];
                let _ = engine.next_question(1, index, option);
                let answered = match engine.state(1) {
                    QuizState::Answering(n) => n,
                    QuizState::Completed => 3,
                    QuizState::NotStarted => unreachable!(),
                };
                prop_assert!(answered <= engine.question_count());
            }
        }
    }
}
