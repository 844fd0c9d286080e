//! Dataset Commands

use colored::Colorize;
use hwr_console::Route;

use super::utils::{print_header, print_info, print_success};
use super::Context;
use crate::cli::{DatasetsArgs, DatasetsSubcommand};
use crate::error::CliResult;

/// Execute the datasets command
pub async fn execute(ctx: &Context, args: DatasetsArgs) -> CliResult<()> {
    let session = ctx.require(Route::Datasets)?;
    let services = ctx.services()?;

    match args.action {
        DatasetsSubcommand::List => {
            let datasets = services.datasets.list().await?;
            if datasets.is_empty() {
                print_info("No datasets uploaded yet");
                return Ok(());
            }

            print_header("Datasets");
            println!("  {:<30} {:>10}", "NAME".bold(), "IMAGES".bold());
            for dataset in &datasets {
                println!("  {:<30} {:>10}", dataset.name, dataset.num_images);
            }
        }
        DatasetsSubcommand::Delete { name } => {
            let reply = services.datasets.delete(&name).await?;
            ctx.record(&services, &session, &format!("删除数据集 {}", name)).await;
            print_success(reply.text());
        }
        DatasetsSubcommand::Select { name } => {
            let reply = services.datasets.select(&name).await?;
            ctx.record(&services, &session, &format!("选择数据集 {}", name)).await;
            print_success(reply.text());
        }
    }

    Ok(())
}
