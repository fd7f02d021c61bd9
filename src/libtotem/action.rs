use crate::libtotem::session::UserId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A button press. Encoded into callback tags short enough for chat
/// platforms that cap callback payloads (Telegram allows 64 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Begin,
    Restart,
    ShowInfo,
    Contact,
    Feedback,
    Answer { question: usize, option: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Feedback,
    Contact,
    Help,
    /// Any other slash command, by name.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Action(Action),
    Command(Command),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user: UserId,
    pub kind: InboundKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("unknown action tag {0:?}")]
    Unknown(String),
    #[error("malformed answer tag {0:?}")]
    MalformedAnswer(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Begin => f.write_str("begin"),
            Action::Restart => f.write_str("restart"),
            Action::ShowInfo => f.write_str("show-info"),
            Action::Contact => f.write_str("contact"),
            Action::Feedback => f.write_str("feedback"),
            Action::Answer { question, option } => write!(f, "answer:{}:{}", question, option),
        }
    }
}

impl FromStr for Action {
    type Err = ActionParseError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "begin" => Ok(Action::Begin),
            "restart" => Ok(Action::Restart),
            "show-info" => Ok(Action::ShowInfo),
            "contact" => Ok(Action::Contact),
            "feedback" => Ok(Action::Feedback),
            tag => {
                let rest = tag
                    .strip_prefix("answer:")
                    .ok_or_else(|| ActionParseError::Unknown(tag.to_string()))?;
                let malformed = || ActionParseError::MalformedAnswer(tag.to_string());
                let (question, option) = rest.split_once(':').ok_or_else(malformed)?;
                Ok(Action::Answer {
                    question: question.parse().map_err(|_| malformed())?,
                    option: option.parse().map_err(|_| malformed())?,
                })
            }
        }
    }
}

impl Command {
    /// Parses a slash command, ignoring arguments and a `@botname` suffix.
    /// Every message starting with `/` is a command, known or not.
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.trim().split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "feedback" => Some(Command::Feedback),
            "contact" => Some(Command::Contact),
            "help" => Some(Command::Help),
            name => Some(Command::Unknown(name.to_string())),
        }
    }
}

impl InboundKind {
    /// Classifies a typed message: a known slash command or free text.
    pub fn from_text(text: &str) -> InboundKind {
        match Command::parse(text) {
            Some(command) => InboundKind::Command(command),
            None => InboundKind::Text(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_tags_parse() {
        assert_eq!("begin".parse(), Ok(Action::Begin));
        assert_eq!("restart".parse(), Ok(Action::Restart));
        assert_eq!("show-info".parse(), Ok(Action::ShowInfo));
        assert_eq!("contact".parse(), Ok(Action::Contact));
        assert_eq!("feedback".parse(), Ok(Action::Feedback));
    }

    #[test]
    fn answer_tag_survives_encoding() {
        let action = Action::Answer {
            question: 12,
            option: 3,
        };
        assert_eq!(action.to_string(), "answer:12:3");
        assert_eq!(action.to_string().parse(), Ok(action));
    }

    #[test]
    fn bad_tags_are_errors() {
        assert_eq!(
            "start_quiz".parse::<Action>(),
            Err(ActionParseError::Unknown("start_quiz".into()))
        );
        assert!(matches!(
            "answer:x:1".parse::<Action>(),
            Err(ActionParseError::MalformedAnswer(_))
        ));
        assert!(matches!(
            "answer:1".parse::<Action>(),
            Err(ActionParseError::MalformedAnswer(_))
        ));
    }

    #[test]
    fn longest_tag_fits_callback_limit() {
        let tag = Action::Answer {
            question: usize::MAX,
            option: usize::MAX,
        }
        .to_string();
        assert!(tag.len() <= 64);
    }

    #[test]
    fn commands_are_recognised() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/Feedback please"), Some(Command::Feedback));
        assert_eq!(Command::parse("/contact@totem_bot"), Some(Command::Contact));
        assert_eq!(
            Command::parse("/stop now"),
            Some(Command::Unknown("stop".into()))
        );
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(
            InboundKind::from_text("the zoo is great"),
            InboundKind::Text("the zoo is great".into())
        );
        assert_eq!(
            InboundKind::from_text("/cancel"),
            InboundKind::Command(Command::Unknown("cancel".into()))
        );
    }
}
