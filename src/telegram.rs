use crate::libtotem::action::{Inbound, InboundKind};
use crate::libtotem::reply::{ButtonTarget, Reply};
use crate::libtotem::router::Router;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use teloxide::payloads::{SendMessageSetters, SendPhotoSetters};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile};

type SharedRouter = Arc<Mutex<Router>>;

pub async fn run(token: String, router: Router) {
    let bot = Bot::new(token);
    let router: SharedRouter = Arc::new(Mutex::new(router));
    info!("[Telegram] Polling for updates");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn dispatch(router: &SharedRouter, event: Inbound) -> Vec<Reply> {
    let mut router = router.lock().unwrap_or_else(PoisonError::into_inner);
    router.handle(event)
}

async fn on_message(bot: Bot, msg: Message, router: SharedRouter) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        debug!("[Telegram] Ignoring message without sender or text");
        return Ok(());
    };
    let replies = dispatch(
        &router,
        Inbound {
            user: user.id.0,
            kind: InboundKind::from_text(text),
        },
    );
    send_replies(&bot, msg.chat.id, replies).await;
    Ok(())
}

async fn on_callback(bot: Bot, query: CallbackQuery, router: SharedRouter) -> ResponseResult<()> {
    bot.answer_callback_query(query.id.clone()).await?;
    let Some(tag) = query.data.as_deref() else {
        return Ok(());
    };
    let replies = {
        let mut router = router.lock().unwrap_or_else(PoisonError::into_inner);
        router.handle_tag(query.from.id.0, tag)
    };
    send_replies(&bot, reply_chat(&query), replies).await;
    Ok(())
}

/// The chat the pressed button lives in, falling back to the user's private
/// chat when the message is unavailable (inline mode).
fn reply_chat(query: &CallbackQuery) -> ChatId {
    query
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or_else(|| ChatId::from(query.from.id))
}

fn keyboard(reply: &Reply) -> Option<InlineKeyboardMarkup> {
    if reply.buttons.is_empty() {
        return None;
    }
    let rows = reply.buttons.iter().map(|row| {
        row.iter()
            .filter_map(|button| match &button.target {
                ButtonTarget::Action(action) => Some(InlineKeyboardButton::callback(
                    button.label.clone(),
                    action.to_string(),
                )),
                ButtonTarget::Url(url) => match url.parse() {
                    Ok(url) => Some(InlineKeyboardButton::url(button.label.clone(), url)),
                    Err(err) => {
                        warn!("[Telegram] Skipping button with bad url {:?}: {}", url, err);
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
    });
    Some(InlineKeyboardMarkup::new(rows))
}

async fn send_replies(bot: &Bot, chat: ChatId, replies: Vec<Reply>) {
    for reply in replies {
        let markup = keyboard(&reply);
        let sent = match &reply.image {
            Some(image) => {
                let mut request = bot
                    .send_photo(chat, InputFile::file(image.path.clone()))
                    .caption(image.caption.clone());
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await.map(drop)
            }
            None => {
                let mut request = bot.send_message(chat, reply.text.clone());
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await.map(drop)
            }
        };
        if let Err(err) = sent {
            warn!("[Telegram] Failed to send reply to {:?}: {}", chat, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(message: &str) -> CallbackQuery {
        let json = format!(
            r#"{{
                "id": "4382bfdwdsb323b2d9",
                "from": {{"id": 7, "is_bot": false, "first_name": "Ann"}},
                {}
                "chat_instance": "-2820393830237474735",
                "data": "begin"
            }}"#,
            message
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn group_buttons_are_answered_in_the_group() {
        let query = query(
            r#""message": {
                "message_id": 5,
                "date": 1700000000,
                "chat": {"id": -1001234, "type": "supergroup", "title": "Zoo fans"},
                "text": "Hi!"
            },"#,
        );
        assert_eq!(reply_chat(&query), ChatId(-1001234));
    }

    #[test]
    fn inline_buttons_fall_back_to_private_chat() {
        let query = query("");
        assert_eq!(reply_chat(&query), ChatId(7));
    }
}
