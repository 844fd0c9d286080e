//! Model Commands

use colored::Colorize;
use hwr_console::api::ModelInfo;
use hwr_console::Route;

use super::utils::{percent, print_header, print_info, print_success};
use super::Context;
use crate::cli::{ModelsArgs, ModelsSubcommand};
use crate::error::CliResult;

/// Execute the models command
pub async fn execute(ctx: &Context, args: ModelsArgs) -> CliResult<()> {
    let session = ctx.require(Route::Models)?;
    let services = ctx.services()?;

    match args.action {
        ModelsSubcommand::List => {
            let models = services.models.list().await?;
            if models.is_empty() {
                print_info("No trained models yet");
                return Ok(());
            }

            print_header("Models");
            println!(
                "  {:<2} {:<28} {:>9} {:<10} {:<20}",
                "",
                "NAME".bold(),
                "ACCURACY".bold(),
                "VERSION".bold(),
                "TRAINED".bold()
            );
            for model in &models {
                println!("  {}", model_row(model));
            }
        }
        ModelsSubcommand::Apply { name } => {
            let reply = services.models.apply(&name).await?;
            ctx.record(&services, &session, &format!("应用模型 {}", name)).await;
            print_success(reply.text());
        }
        ModelsSubcommand::Delete { name } => {
            let reply = services.models.delete(&name).await?;
            ctx.record(&services, &session, &format!("删除模型 {}", name)).await;
            print_success(reply.text());
        }
    }

    Ok(())
}

fn model_row(model: &ModelInfo) -> String {
    let marker = if model.active { "*" } else { "" };
    format!(
        "{:<2} {:<28} {:>9} {:<10} {:<20}",
        marker,
        model.name,
        percent(model.accuracy),
        model.version.as_deref().unwrap_or("-"),
        model.train_date.as_deref().unwrap_or("-")
    )
}
