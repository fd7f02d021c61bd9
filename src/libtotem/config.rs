use crate::libtotem::bank::BUILTIN_IMAGE_ROOT;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STAFF_EMAIL: &str = "contact@zoo.example";
pub const DEFAULT_SENDER_EMAIL: &str = "totem-bot@zoo.example";
pub const DEFAULT_SHARE_URL: &str = "https://t.me/totem_quiz_bot";
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 24 * 60 * 60;

/// Runtime settings of the conversation router.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Recipient of feedback and contact messages.
    pub staff_email: String,
    pub sender_email: String,
    /// Link shared by the social buttons under a result.
    pub share_url: String,
    /// Relative image paths of the quiz bank are resolved against this.
    pub image_root: PathBuf,
    pub session_idle: Duration,
    pub shuffle_options: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            staff_email: DEFAULT_STAFF_EMAIL.to_string(),
            sender_email: DEFAULT_SENDER_EMAIL.to_string(),
            share_url: DEFAULT_SHARE_URL.to_string(),
            image_root: PathBuf::from(BUILTIN_IMAGE_ROOT),
            session_idle: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
            shuffle_options: false,
        }
    }
}

impl Settings {
    pub fn facebook_share(&self) -> String {
        format!("https://www.facebook.com/sharer/sharer.php?u={}", self.share_url)
    }

    pub fn twitter_share(&self) -> String {
        format!("https://twitter.com/intent/tweet?url={}", self.share_url)
    }
}
