//! Operation Log Command

use colored::Colorize;
use hwr_console::api::OperationLog;
use hwr_console::Route;

use super::utils::{print_header, print_info};
use super::Context;
use crate::cli::LogsArgs;
use crate::error::CliResult;

/// Execute the logs command
pub async fn execute(ctx: &Context, args: &LogsArgs) -> CliResult<()> {
    ctx.require(Route::Logs)?;
    let services = ctx.services()?;

    let entries = services.logs.list().await?;
    if entries.is_empty() {
        print_info("No operations logged yet");
        return Ok(());
    }

    print_header("Operation Logs");
    for entry in tail(&entries, args.limit) {
        println!("  {}  {:<12} {}", entry.time.dimmed(), entry.user.cyan(), entry.action);
    }
    Ok(())
}

fn tail(entries: &[OperationLog], limit: Option<usize>) -> &[OperationLog] {
    match limit {
        Some(limit) if limit < entries.len() => &entries[entries.len() - limit..],
        _ => entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: &str) -> OperationLog {
        OperationLog {
            user: "用户1".to_string(),
            action: action.to_string(),
            time: "2024-01-05 09:03:07".to_string(),
        }
    }

    #[test]
    fn test_tail() {
        let entries = vec![entry("a"), entry("b"), entry("c")];
        assert_eq!(tail(&entries, None).len(), 3);
        assert_eq!(tail(&entries, Some(10)).len(), 3);
        let last = tail(&entries, Some(2));
        assert_eq!(last[0].action, "b");
        assert_eq!(last[1].action, "c");
    }
}
