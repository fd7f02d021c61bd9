use crate::libtotem::action::{Action, Command, Inbound, InboundKind};
use crate::libtotem::bank::Question;
use crate::libtotem::config::Settings;
use crate::libtotem::mail::{Mail, Mailer};
use crate::libtotem::quiz::{QuizEngine, QuizError, QuizState, Step, TotemResult};
use crate::libtotem::reply::{Button, Reply};
use crate::libtotem::session::UserId;
use log::{debug, info, warn};
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const PRIVACY_NOTICE: &str = "We do not collect personal data. All answers are anonymous.";
const GREETING: &str = "Hi! This is the \"Totem animal\" quiz. Press the button to begin!";
const HELP: &str = "/start - open the quiz menu\n\
                    /feedback - leave us a review\n\
                    /contact - write to our staff";
const CARE_PROGRAMME: &str = "The guardianship programme lets you support your favourite animals!\n\
                              You can become a guardian and help provide for an animal's needs.\n\
                              Find out more on our website or get in touch with our staff.";
const NO_ANSWERS: &str = "Unfortunately you have no answers yet.";
const START_FIRST: &str = "Please start the quiz first.";
const ALREADY_ANSWERED: &str = "That question was already answered.";
const UNKNOWN_ACTION: &str = "Sorry, I did not understand that button.";
const TEXT_HINT: &str = "Send /start to take the quiz, /feedback to leave a review or /contact to reach our staff.";

/// The two free-text flows. Each waits for one message, mails it and
/// confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Feedback,
    Contact,
}

impl Flow {
    fn prompt(self, settings: &Settings) -> String {
        match self {
            Flow::Feedback => "Please leave your feedback:".to_string(),
            Flow::Contact => format!(
                "Please write your message, it will be forwarded to {}:",
                settings.staff_email
            ),
        }
    }

    fn subject(self) -> &'static str {
        match self {
            Flow::Feedback => "User feedback",
            Flow::Contact => "Message from user",
        }
    }

    fn confirmation(self) -> &'static str {
        match self {
            Flow::Feedback => "Your feedback has been sent, thank you!",
            Flow::Contact => "Your message has been sent, thank you!",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingFlow {
    flow: Flow,
    opened: Instant,
}

pub struct Router {
    engine: QuizEngine,
    mailer: Box<dyn Mailer>,
    settings: Settings,
    pending: HashMap<UserId, PendingFlow>,
}

impl Router {
    pub fn new(engine: QuizEngine, mailer: Box<dyn Mailer>, settings: Settings) -> Self {
        Self {
            engine,
            mailer,
            settings,
            pending: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    #[cfg(test)]
    pub fn pending_flow(&self, user: UserId) -> Option<Flow> {
        self.pending.get(&user).map(|pending| pending.flow)
    }

    /// Drops quiz sessions and unanswered flows idle for longer than
    /// `max_idle`.
    fn evict_idle(&mut self, max_idle: Duration) {
        let sessions = self.engine.evict_idle(max_idle);
        let now = Instant::now();
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| now.saturating_duration_since(pending.opened) <= max_idle);
        let flows = before - self.pending.len();
        if sessions + flows > 0 {
            debug!(
                "[Router] Evicted {} sessions and {} flows, {} sessions and {} flows remain",
                sessions,
                flows,
                self.engine.active_sessions(),
                self.pending.len()
            );
        }
    }

    /// Handles one inbound event end-to-end and returns the messages to send
    /// back, in order.
    pub fn handle(&mut self, event: Inbound) -> Vec<Reply> {
        self.evict_idle(self.settings.session_idle);
        let user = event.user;
        debug!("[Router] User {}: {:?}", user, event.kind);

        match event.kind {
            InboundKind::Command(Command::Start) => self.greet(user),
            InboundKind::Command(Command::Help) => vec![Reply::text(HELP)],
            InboundKind::Command(Command::Feedback) => self.open_flow(user, Flow::Feedback),
            InboundKind::Command(Command::Contact) => self.open_flow(user, Flow::Contact),
            InboundKind::Command(Command::Unknown(name)) => {
                debug!("[Router] User {} sent unknown command /{}", user, name);
                vec![Reply::text(HELP)]
            }
            InboundKind::Action(action) => self.on_action(user, action),
            InboundKind::Text(text) => self.on_text(user, text),
        }
    }

    /// Handles a raw callback tag, answering malformed tags politely.
    pub fn handle_tag(&mut self, user: UserId, tag: &str) -> Vec<Reply> {
        match tag.parse::<Action>() {
            Ok(action) => self.handle(Inbound {
                user,
                kind: InboundKind::Action(action),
            }),
            Err(err) => {
                warn!("[Router] User {}: {}", user, err);
                vec![Reply::text(UNKNOWN_ACTION)]
            }
        }
    }

    fn greet(&mut self, user: UserId) -> Vec<Reply> {
        self.pending.remove(&user);
        vec![
            Reply::text(PRIVACY_NOTICE),
            Reply::text(GREETING).column([
                Button::action("Start quiz", Action::Begin),
                Button::action("Contact us", Action::Contact),
            ]),
        ]
    }

    fn on_action(&mut self, user: UserId, action: Action) -> Vec<Reply> {
        match action {
            Action::Begin | Action::Restart => {
                self.pending.remove(&user);
                self.engine.start_quiz(user);
                vec![self.render_question(0)]
            }
            Action::ShowInfo => vec![Reply::text(CARE_PROGRAMME)],
            Action::Contact => self.open_flow(user, Flow::Contact),
            Action::Feedback => self.open_flow(user, Flow::Feedback),
            Action::Answer { question, option } => self.on_answer(user, question, option),
        }
    }

    fn on_answer(&mut self, user: UserId, question: usize, option: usize) -> Vec<Reply> {
        let selected = self
            .engine
            .bank()
            .question(question)
            .and_then(|q| q.options.get(option))
            .cloned();
        let selected = match selected {
            Some(selected) => selected,
            None if self.engine.state(user) == QuizState::NotStarted => {
                return self.quiz_error(user, QuizError::UnknownSession(user))
            }
            None => {
                warn!(
                    "[Router] User {} pressed missing option {} of question {}",
                    user, option, question
                );
                return vec![Reply::text(UNKNOWN_ACTION)];
            }
        };

        let step = self
            .engine
            .next_question(user, question, &selected)
            .map(|step| match step {
                Step::Question(index, _) => Some(index),
                Step::Completed => None,
            });
        let next = match step {
            Ok(next) => next,
            Err(err) => return self.quiz_error(user, err),
        };
        match next {
            Some(index) => vec![self.render_question(index)],
            None => self.render_result(user),
        }
    }

    fn quiz_error(&mut self, user: UserId, err: QuizError) -> Vec<Reply> {
        info!("[Router] User {}: {}", user, err);
        match err {
            QuizError::UnknownSession(_) => vec![Reply::text(START_FIRST)
                .row(vec![Button::action("Start quiz", Action::Begin)])],
            QuizError::StaleAnswer { .. } => {
                let mut replies = vec![Reply::text(ALREADY_ANSWERED)];
                match self.engine.state(user) {
                    QuizState::Answering(index) => replies.push(self.render_question(index)),
                    QuizState::Completed => replies.extend(self.render_result(user)),
                    QuizState::NotStarted => replies.push(Reply::text(START_FIRST)),
                }
                replies
            }
            QuizError::InvalidOption { .. } => vec![Reply::text(UNKNOWN_ACTION)],
        }
    }

    fn render_question(&self, index: usize) -> Reply {
        let question: &Question = &self.engine.bank().questions[index];
        let mut buttons: Vec<Button> = question
            .options
            .iter()
            .enumerate()
            .map(|(option, label)| {
                Button::action(
                    label.clone(),
                    Action::Answer {
                        question: index,
                        option,
                    },
                )
            })
            .collect();
        if self.settings.shuffle_options {
            buttons.shuffle(&mut rng());
        }
        let header = format!("{}/{}. {}", index + 1, self.engine.question_count(), question.prompt);
        Reply::text(header).column(buttons)
    }

    fn render_result(&self, user: UserId) -> Vec<Reply> {
        let result = match self.engine.score(user) {
            Ok(result) => result,
            Err(err) => {
                warn!("[Router] Cannot score user {}: {}", user, err);
                return vec![Reply::text(START_FIRST)];
            }
        };
        if result.is_empty() {
            return vec![Reply::text(NO_ANSWERS)];
        }

        let mut labels = result.labels();
        labels.sort_unstable();
        let text = format!(
            "Your totem animals: {}\n\nThank you for taking part!",
            labels.join(", ")
        );
        let summary = Reply::text(text)
            .row(vec![Button::action("Learn more", Action::ShowInfo)])
            .row(vec![Button::action("Try again", Action::Restart)])
            .row(vec![
                Button::url("Share on Facebook", self.settings.facebook_share()),
                Button::url("Share on Twitter", self.settings.twitter_share()),
            ]);

        let mut replies = vec![summary];
        for label in labels {
            if TotemResult::is_undetermined(label) {
                continue;
            }
            let images = &result.animals[label];
            if images.is_empty() {
                replies.push(image_unavailable(label));
            }
            for image in images {
                let path = self.resolve_image(image);
                if is_readable(&path) {
                    replies.push(Reply::image(path, label));
                } else {
                    warn!("[Router] Image {:?} for {} is missing", path, label);
                    replies.push(image_unavailable(label));
                }
            }
        }
        replies
    }

    fn resolve_image(&self, image: &Path) -> PathBuf {
        if image.is_absolute() {
            image.to_path_buf()
        } else {
            self.settings.image_root.join(image)
        }
    }

    fn open_flow(&mut self, user: UserId, flow: Flow) -> Vec<Reply> {
        debug!("[Router] User {} opened {:?} flow", user, flow);
        self.pending.insert(
            user,
            PendingFlow {
                flow,
                opened: Instant::now(),
            },
        );
        vec![Reply::text(flow.prompt(&self.settings))]
    }

    fn on_text(&mut self, user: UserId, text: String) -> Vec<Reply> {
        let Some(PendingFlow { flow, .. }) = self.pending.remove(&user) else {
            return vec![Reply::text(TEXT_HINT)];
        };

        let mail = Mail {
            from: self.settings.sender_email.clone(),
            to: self.settings.staff_email.clone(),
            subject: flow.subject().to_string(),
            body: format!("{}\n\n-- user {}", text, user),
        };
        match self.mailer.send(&mail) {
            Ok(()) => info!("[Router] Forwarded {:?} from user {}", flow, user),
            Err(err) => warn!(
                "[Router] Could not deliver {:?} from user {}: {}",
                flow, user, err
            ),
        }
        vec![Reply::text(flow.confirmation())]
    }
}

fn image_unavailable(label: &str) -> Reply {
    Reply::text(format!("Image unavailable for {}.", label))
}

fn is_readable(path: &Path) -> bool {
    path.is_file() && std::fs::File::open(path).is_ok()
}
