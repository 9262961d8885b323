//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

pub type Bot = teloxide::Bot;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "我可以：")]
pub enum Command {
    #[command(description = "显示主菜单")]
    Start,
    #[command(description = "查看我的商户资料")]
    Profile,
    #[command(description = "帮助")]
    Help,
    #[command(description = "管理面板（仅管理员）")]
    Admin,
    #[command(description = "生成绑定码（仅管理员）")]
    Gencode,
    #[command(description = "活动统计（仅管理员）")]
    Stats,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, network issues, etc.)
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;

    let bot = if let Some(api_url) = config::BOT_API_URL.as_ref() {
        log::info!("Using custom Bot API URL: {}", api_url);
        let url = url::Url::parse(api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::from_env_with_client(client).set_api_url(url)
    } else {
        Bot::from_env_with_client(client)
    };

    Ok(bot)
}

/// Sets up bot commands in the Telegram UI. Admin-only commands are
/// registered too; the handlers gate them by chat id.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "显示主菜单"),
        BotCommand::new("profile", "查看我的商户资料"),
        BotCommand::new("help", "帮助"),
    ])
    .await?;

    Ok(())
}
