use crate::libtotem::action::{Inbound, InboundKind};
use crate::libtotem::reply::{ButtonTarget, Reply};
use crate::libtotem::router::Router;
use crate::libtotem::session::UserId;
use colored::Colorize;
use log::{debug, info};
use std::io::{self, Write};
use text_io::try_read;

enum Input {
    Press(usize),
    SwitchUser(UserId),
    Quit,
    Message(String),
}

impl Input {
    fn from_str(input: &str) -> Input {
        let input = input.trim();
        if input == "q" || input == "/quit" {
            return Input::Quit;
        }
        if let Some(user) = input.strip_prefix("/user ") {
            if let Ok(user) = user.trim().parse() {
                return Input::SwitchUser(user);
            }
        }
        match input.parse::<usize>() {
            Ok(num) if num > 0 => Input::Press(num - 1),
            _ => Input::Message(input.to_string()),
        }
    }
}

/// Interactive terminal chat. Buttons of the last message are pressed by
/// number; anything else is sent as a message.
pub fn cli_loop(router: &mut Router, mut user: UserId) {
    info!("[Console] Chatting as user {}", user);
    println!(
        "{}",
        "Type /start to begin, a number to press a button, /user N to switch user, q to quit."
            .cyan()
    );

    let mut buttons = print_replies(&router.handle(Inbound {
        user,
        kind: InboundKind::from_text("/start"),
    }));

    loop {
        print!("{} ", format!("[{}]>", user).cyan());
        io::stdout().flush().ok();
        let line: Result<String, _> = try_read!("{}\n");
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                debug!("[Console] Input closed: {:?}", err);
                break;
            }
        };

        let replies = match Input::from_str(&line) {
            Input::Quit => break,
            Input::SwitchUser(next) => {
                println!("{}", format!("Now chatting as user {}", next).yellow());
                user = next;
                continue;
            }
            Input::Press(index) => match buttons.get(index) {
                Some(ButtonTarget::Action(action)) => router.handle(Inbound {
                    user,
                    kind: InboundKind::Action(*action),
                }),
                Some(ButtonTarget::Url(url)) => {
                    println!("{}", format!("Open {}", url).blue().underline());
                    continue;
                }
                None => {
                    println!(
                        "{}",
                        format!("There are only {} buttons available!", buttons.len())
                            .bright_red()
                    );
                    continue;
                }
            },
            Input::Message(text) => router.handle(Inbound {
                user,
                kind: InboundKind::from_text(&text),
            }),
        };
        let pressed = print_replies(&replies);
        if !pressed.is_empty() {
            buttons = pressed;
        }
    }
    println!("{}", "Bye!".cyan());
}

/// Prints replies and returns their buttons in display order.
fn print_replies(replies: &[Reply]) -> Vec<ButtonTarget> {
    let mut targets = Vec::new();
    for reply in replies {
        match &reply.image {
            Some(image) => println!(
                "{} {}",
                format!("[photo {}]", image.path.display()).magenta(),
                image.caption.bold()
            ),
            None => println!("{}", reply.text.black().on_white()),
        }
        for row in &reply.buttons {
            let labels: Vec<String> = row
                .iter()
                .map(|button| {
                    targets.push(button.target.clone());
                    format!("{}. {}", targets.len().to_string().bold(), button.label)
                })
                .collect();
            println!("  {}", labels.join("   "));
        }
    }
    targets
}
