use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("cannot write mail to spool: {0}")]
    Spool(#[from] io::Error),
    #[error("cannot encode mail: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound mail collaborator.
pub trait Mailer: Send {
    fn send(&self, mail: &Mail) -> Result<(), DeliveryError>;
}

/// Writes each mail to the log only.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &Mail) -> Result<(), DeliveryError> {
        info!(
            "[Mail] {} -> {}: {:?}\n{}",
            mail.from, mail.to, mail.subject, mail.body
        );
        Ok(())
    }
}

/// Drops each mail as a JSON file into a directory, for a relay or a
/// cron job to pick up.
#[derive(Debug)]
pub struct SpoolMailer {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl SpoolMailer {
    pub fn new(dir: PathBuf) -> Result<Self, DeliveryError> {
        std::fs::create_dir_all(&dir)?;
        info!("[Mail] Spooling outbound mail to {:?}", dir);
        Ok(Self {
            dir,
            sequence: AtomicU64::new(0),
        })
    }
}

impl Mailer for SpoolMailer {
    fn send(&self, mail: &Mail) -> Result<(), DeliveryError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("{}-{:04}.json", millis, seq));
        let json = serde_json::to_string_pretty(mail)?;
        std::fs::write(&path, json)?;
        debug!("[Mail] Spooled {:?} to {:?}", mail.subject, path);
        Ok(())
    }
}
