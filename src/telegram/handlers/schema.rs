//! Dispatcher schema
//!
//! Returns the handler tree used with teloxide's Dispatcher. The same
//! schema serves production and integration tests.

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::callbacks::handle_callback;
use super::commands::handle_command;
use super::messages::handle_message;
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the bot.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callbacks = deps;

    dptree::entry()
        // Command handler first so "/start" never reaches the text router
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                    let deps = deps_commands.clone();
                    async move { handle_command(bot, msg, cmd, deps).await }
                }),
        )
        // Text and media messages
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some() || msg.photo().is_some() || msg.video().is_some())
                .endpoint(move |bot: Bot, msg: Message| {
                    let deps = deps_messages.clone();
                    async move { handle_message(bot, msg, deps).await }
                }),
        )
        // Inline keyboard callbacks
        .branch(Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
            let deps = deps_callbacks.clone();
            async move { handle_callback(bot, q, deps).await }
        }))
}
