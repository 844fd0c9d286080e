//! Status Command

use colored::Colorize;

use super::utils::{print_header, print_kv};
use super::Context;
use crate::error::CliResult;

/// Execute the status command
pub async fn execute(ctx: &Context) -> CliResult<()> {
    let session = ctx.store.load()?;

    print_header("Session");
    if session.is_authenticated() {
        print_kv("Status", &"logged in".green().to_string());
        print_kv("User", session.user_id.as_deref().unwrap_or("?"));
    } else {
        print_kv("Status", &"not logged in".yellow().to_string());
    }
    print_kv("Session file", &ctx.store.path().display().to_string());

    let services = ctx.services()?;
    let config = &ctx.config;

    print_header("Services");
    print_kv("Auth", &config.services.auth_url);
    print_kv("Datasets", &config.services.datasets_url);
    print_kv("Models", &config.services.models_url);
    print_kv("Logs", &config.services.logs_url);
    print_kv("Training API", &config.services.training_api_url);

    let health = match services.trainer.health().await {
        Ok(health) if health.is_ok() && health.current_training => "up, training".green().to_string(),
        Ok(health) if health.is_ok() => "up, idle".green().to_string(),
        Ok(health) => health.status.yellow().to_string(),
        Err(e) => format!("{} ({})", "unreachable".red(), e),
    };
    print_kv(
        "Training service",
        &format!("{} {}", config.services.training_service_url, health),
    );
    print_kv(
        "Event channel",
        &format!("{}{}", config.channel.endpoint, config.channel.path),
    );
    Ok(())
}
