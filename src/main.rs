use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{debug, error, info};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

mod libtotem;

#[cfg(feature = "cli")]
mod cli;
#[cfg(feature = "telegram")]
mod telegram;

use crate::libtotem::bank::{BankError, QuizBank, BUILTIN_IMAGE_ROOT};
use crate::libtotem::config::{
    Settings, DEFAULT_SENDER_EMAIL, DEFAULT_SESSION_IDLE_SECS, DEFAULT_SHARE_URL,
    DEFAULT_STAFF_EMAIL,
};
use crate::libtotem::mail::{DeliveryError, LogMailer, Mailer, SpoolMailer};
use crate::libtotem::quiz::QuizEngine;
use crate::libtotem::router::Router;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Console,
    Telegram,
}

#[derive(Parser, Debug)]
#[command(name = "Totem animal quiz")]
#[command(version, about, long_about = None)]
struct Args {
    /// Quiz bank JSON file; the built-in bank is used when omitted.
    #[arg(short, long, value_name = "FILE")]
    bank: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value = "console")]
    transport: Transport,
    #[arg(long, default_value = DEFAULT_STAFF_EMAIL)]
    staff_email: String,
    #[arg(long, default_value = DEFAULT_SENDER_EMAIL)]
    sender_email: String,
    /// Spool outbound mail as JSON files into this directory instead of
    /// only logging it.
    #[arg(short, long, value_name = "DIR")]
    outbox: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_SHARE_URL)]
    share_url: String,
    /// Directory relative image paths are resolved against. Defaults to the
    /// bank file's directory, or `assets` for the built-in bank.
    #[arg(long, value_name = "DIR")]
    images: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_SESSION_IDLE_SECS)]
    session_idle_secs: u64,
    #[arg(long)]
    shuffle_options: bool,
    /// User id of the console chat.
    #[arg(long, default_value = "1")]
    user: u64,
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Error)]
enum Error {
    #[error("cannot load quiz bank")]
    Bank(#[from] BankError),
    #[error("cannot set up mail delivery")]
    Mail(#[from] DeliveryError),
    #[error("the {0:?} transport is not compiled into this build")]
    TransportUnavailable(Transport),
    #[cfg(feature = "telegram")]
    #[error("TELOXIDE_TOKEN is not set")]
    MissingToken,
    #[cfg(feature = "telegram")]
    #[error("cannot start async runtime")]
    Runtime(#[from] std::io::Error),
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    if let Err(err) = run(args) {
        error!("{}", err);
        if let Some(source) = std::error::Error::source(&err) {
            error!("caused by: {}", source);
        }
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let bank = match &args.bank {
        Some(path) => QuizBank::load(path)?,
        None => QuizBank::builtin()?,
    };
    info!(
        "[Setup] Quiz bank with {} questions and {} animals",
        bank.len(),
        bank.animals().len()
    );

    let mailer: Box<dyn Mailer> = match &args.outbox {
        Some(dir) => Box::new(SpoolMailer::new(dir.clone())?),
        None => Box::new(LogMailer),
    };

    let image_root = args
        .images
        .clone()
        .or_else(|| {
            args.bank
                .as_ref()
                .and_then(|b| b.parent())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(BUILTIN_IMAGE_ROOT));
    let settings = Settings {
        staff_email: args.staff_email.clone(),
        sender_email: args.sender_email.clone(),
        share_url: args.share_url.clone(),
        image_root,
        session_idle: Duration::from_secs(args.session_idle_secs),
        shuffle_options: args.shuffle_options,
    };
    debug!("[Setup] Settings: {:?}", settings);

    let router = Router::new(QuizEngine::new(bank), mailer, settings);
    serve(args.transport, args.user, router)
}

fn serve(transport: Transport, user: u64, router: Router) -> Result<(), Error> {
    match transport {
        Transport::Console => {
            cfg_if::cfg_if! {
                if #[cfg(feature = "cli")] {
                    let mut router = router;
                    cli::cli_loop(&mut router, user);
                    Ok(())
                } else {
                    let _ = (user, router);
                    Err(Error::TransportUnavailable(transport))
                }
            }
        }
        Transport::Telegram => {
            cfg_if::cfg_if! {
                if #[cfg(feature = "telegram")] {
                    let token = std::env::var("TELOXIDE_TOKEN").map_err(|_| Error::MissingToken)?;
                    let runtime = tokio::runtime::Runtime::new()?;
                    runtime.block_on(telegram::run(token, router));
                    Ok(())
                } else {
                    let _ = router;
                    Err(Error::TransportUnavailable(transport))
                }
            }
        }
    }
}
