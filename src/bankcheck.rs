use colored::Colorize;
use env_logger::Env;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

#[allow(dead_code)]
mod libtotem;
use crate::libtotem::bank::{QuizBank, BUILTIN_IMAGE_ROOT, UNDETERMINED};

#[derive(Parser, Debug)]
#[command(name = "totem-bank")]
#[command(version, about = "Validate or print a totem quiz bank", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Bank JSON file; the built-in bank when omitted.
    json: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the bank and print its questions and score table.
    Check,
    /// Print the bank as JSON.
    Dump,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    let bank = match &args.json {
        Some(path) => QuizBank::load(path),
        None => QuizBank::builtin(),
    };
    let bank = match bank {
        Ok(bank) => bank,
        Err(err) => {
            error!("{}", format!("Invalid quiz bank: {}!", err).red());
            std::process::exit(1);
        }
    };

    match args.command {
        Commands::Check => {
            let image_root = args
                .json
                .as_deref()
                .and_then(Path::parent)
                .unwrap_or(Path::new(BUILTIN_IMAGE_ROOT));
            let missing = check(&bank, image_root);
            if missing > 0 {
                warn!("{} images could not be found", missing);
            }
        }
        Commands::Dump => match serde_json::to_string_pretty(&bank) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                error!("{}", format!("Cannot encode bank: {}!", err).red());
                std::process::exit(1);
            }
        },
    }
}

/// Prints the bank as a tree and returns the number of missing images.
fn check(bank: &QuizBank, image_root: &Path) -> usize {
    info!("Checking {} questions", bank.len());
    println!(
        "{}",
        format!("Quiz bank ({} Questions)", bank.len()).blue()
    );
    for (index, question) in bank.questions.iter().enumerate() {
        println!(
            "{}",
            format!("├ {}. {}", index + 1, question.prompt).blue()
        );
        for option in &question.options {
            let entry = bank.score_of(option);
            let line = format!("│ ├ {} -> {}", option, entry.animal);
            if entry.animal == UNDETERMINED {
                println!("{}", line.yellow());
            } else {
                println!("{}", line.green());
            }
        }
    }

    let mut missing = 0;
    let mut images: Vec<(&str, &Path)> = bank
        .scores
        .values()
        .filter_map(|e| e.image.as_deref().map(|i| (e.animal.as_str(), i)))
        .collect();
    images.sort();
    images.dedup();
    println!("{}", format!("Animals: {}", bank.animals().join(", ")).cyan());
    for (animal, image) in images {
        let path = image_root.join(image);
        if path.is_file() {
            println!("{}", format!("├ {}: {}", animal, path.display()).green());
        } else {
            missing += 1;
            println!(
                "{}",
                format!("├ ✘ {}: {} (missing)", animal, path.display())
                    .red()
                    .strikethrough()
            );
        }
    }
    missing
}
