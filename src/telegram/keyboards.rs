//! Inline keyboard construction from flow widgets

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::onboarding::{FlowAction, StepView, Widget};
use crate::telegram::callback::CallbackCommand;

/// Shorthand for a callback button.
pub fn cb(label: impl Into<String>, command: CallbackCommand) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.into(), command.encode())
}

/// Builds the markup for a flow widget. Text and media prompts get the
/// navigation buttons the widget itself does not carry.
pub fn view_markup(view: &StepView) -> InlineKeyboardMarkup {
    match &view.widget {
        Widget::Buttons(rows) => {
            let keyboard: Vec<Vec<InlineKeyboardButton>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| cb(button.label.clone(), CallbackCommand::Flow(button.action.clone())))
                        .collect()
                })
                .collect();
            InlineKeyboardMarkup::new(keyboard)
        }
        Widget::TextPrompt => InlineKeyboardMarkup::new(vec![vec![cb(
            "⬅️ 返回总览",
            CallbackCommand::Flow(FlowAction::Overview),
        )]]),
        Widget::MediaPrompt { .. } => InlineKeyboardMarkup::new(vec![
            vec![cb("✅ 完成上传", CallbackCommand::Flow(FlowAction::MediaDone))],
            vec![cb("⬅️ 返回总览", CallbackCommand::Flow(FlowAction::Overview))],
        ]),
    }
}
