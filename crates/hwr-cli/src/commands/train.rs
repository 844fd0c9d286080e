//! Training Commands
//!
//! Run control goes over the training event channel; configuration and
//! history come from the REST services.

use colored::Colorize;
use hwr_console::channel::ChannelError;
use hwr_console::{
    ConnectionState, RunPhase, RunTracker, Route, TrainingChannel, TrainingEvent, TrainingProgress,
    TrainingRequest,
};
use indicatif::ProgressBar;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use super::utils::{
    epoch_progress_bar, percent, print_header, print_info, print_kv, print_success, print_warning,
    spinner,
};
use super::Context;
use crate::cli::{StartArgs, TrainArgs, TrainSubcommand, WatchArgs};
use crate::error::{CliError, CliResult};

/// How long `train stop` waits for the service to confirm
const STOP_CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute the train command
pub async fn execute(ctx: &Context, args: TrainArgs) -> CliResult<()> {
    let session = ctx.require(Route::Training)?;

    match args.action {
        TrainSubcommand::Start(start) => {
            let services = ctx.services()?;
            execute_start(ctx, &start).await?;
            ctx.record(&services, &session, &format!("开始训练 {}", start.architecture))
                .await;
            Ok(())
        }
        TrainSubcommand::Stop => {
            let services = ctx.services()?;
            execute_stop(ctx).await?;
            ctx.record(&services, &session, "停止训练").await;
            Ok(())
        }
        TrainSubcommand::Watch(watch) => execute_watch(ctx, &watch).await,
        TrainSubcommand::Config => execute_config(ctx).await,
        TrainSubcommand::History => execute_history(ctx).await,
        TrainSubcommand::Health => execute_health(ctx).await,
    }
}

// =============================================================================
// Run Control
// =============================================================================

async fn execute_start(ctx: &Context, args: &StartArgs) -> CliResult<()> {
    let mut request = TrainingRequest::new(
        args.architecture.clone(),
        args.batch_size,
        args.learning_rate,
        args.optimizer.clone(),
        args.loss.clone(),
    );
    if let Some(epochs) = args.epochs {
        request = request.with_epochs(epochs);
    }
    if let Some(dataset) = &args.dataset {
        request = request.with_dataset(dataset.clone());
    }
    if let Some(name) = &args.save_name {
        request = request.with_save_name(name.clone());
    }
    let canonical = request.canonicalize().map_err(ChannelError::from)?;

    print_header("Training");
    print_kv("Architecture", &canonical.model_architecture);
    print_kv("Dataset", &canonical.dataset_name);
    print_kv("Epochs", &canonical.epochs.to_string());
    print_kv("Batch size", &canonical.batch_size.to_string());
    print_kv("Learning rate", &canonical.learning_rate.to_string());
    print_kv("Optimizer", &canonical.optimizer);
    print_kv("Loss", &canonical.loss_function);
    print_kv("Save as", &canonical.save_model_name);
    println!();

    let channel = open_channel(ctx).await?;
    let mut events = channel.events();
    channel.start_training(&request)?;

    if args.detach {
        let acknowledged = tokio::time::timeout(ctx.config.channel.connect_timeout(), async {
            loop {
                match events.recv().await {
                    Ok(event @ (TrainingEvent::Started(_) | TrainingEvent::Error(_))) => {
                        return Some(event)
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .await;
        channel.disconnect();

        return match acknowledged {
            Ok(Some(TrainingEvent::Started(started))) => {
                print_success(&format!("Training started: {}", started.training_id.cyan()));
                Ok(())
            }
            Ok(Some(TrainingEvent::Error(message))) => Err(CliError::Training(message)),
            _ => {
                print_warning("Training requested; the service did not acknowledge it");
                Ok(())
            }
        };
    }

    let tracker = follow(&channel, events, u64::from(canonical.epochs), None).await?;
    channel.disconnect();
    report(&tracker)
}

async fn execute_stop(ctx: &Context) -> CliResult<()> {
    let channel = open_channel(ctx).await?;
    let mut events = channel.events();
    channel.stop_training()?;

    let confirmed = tokio::time::timeout(STOP_CONFIRM_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(TrainingEvent::Stopped(message)) => return Some(message),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await;
    channel.disconnect();

    match confirmed {
        Ok(Some(message)) => print_success(&message),
        _ => print_warning("Stop requested; the service did not confirm"),
    }
    Ok(())
}

async fn execute_watch(ctx: &Context, args: &WatchArgs) -> CliResult<()> {
    let channel = open_channel(ctx).await?;
    print_info("Watching training events (Ctrl-C to stop watching)");

    let tracker = follow(&channel, channel.events(), 0, args.timeout.map(Duration::from_secs)).await?;
    channel.disconnect();

    if tracker.phase() == RunPhase::Idle {
        print_info("No training events received");
        return Ok(());
    }
    report(&tracker)
}

/// Connect to the training service, failing once the connect timeout passes
async fn open_channel(ctx: &Context) -> CliResult<TrainingChannel> {
    let channel = TrainingChannel::new(ctx.config.channel.clone())?;
    let pb = spinner(&format!("Connecting to {}", ctx.config.channel.endpoint));
    channel.connect();

    let connected = channel
        .wait_for_state(ConnectionState::Connected, ctx.config.channel.connect_timeout())
        .await;
    pb.finish_and_clear();

    if !connected {
        channel.disconnect();
        return Err(CliError::Training(format!(
            "cannot reach the training service at {}",
            ctx.config.channel.endpoint
        )));
    }
    Ok(channel)
}

/// Render events until the run ends, the timeout passes or Ctrl-C.
///
/// Fails when the channel gives up on the connection before the run ends.
async fn follow(
    channel: &TrainingChannel,
    mut events: broadcast::Receiver<TrainingEvent>,
    total_epochs: u64,
    timeout: Option<Duration>,
) -> CliResult<RunTracker> {
    let pb = epoch_progress_bar(total_epochs);
    let mut tracker = RunTracker::new();
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };
    let ended = channel.session_ended();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(deadline, ended, ctrl_c);

    loop {
        let event = tokio::select! {
            biased;
            received = events.recv() => match received {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut ended => {
                pb.abandon();
                return Err(CliError::Training(
                    "lost connection to the training service".to_string(),
                ));
            }
            _ = &mut deadline => break,
            _ = &mut ctrl_c => break,
        };

        let phase = tracker.observe(&event);
        render(&pb, &event);
        if phase.is_terminal() {
            break;
        }
    }

    if tracker.phase().is_terminal() {
        pb.finish();
    } else {
        pb.abandon();
    }
    Ok(tracker)
}

fn render(pb: &ProgressBar, event: &TrainingEvent) {
    match event {
        TrainingEvent::Started(started) => {
            pb.reset();
            pb.println(format!("{} run {}", "▶".green().bold(), started.training_id.cyan()));
        }
        TrainingEvent::Progress(progress) => {
            if u64::from(progress.epoch) > pb.length().unwrap_or(0) {
                pb.set_length(u64::from(progress.epoch));
            }
            pb.set_position(u64::from(progress.epoch));
            pb.set_message(progress_line(progress));
        }
        TrainingEvent::Complete(_) | TrainingEvent::Error(_) | TrainingEvent::Stopped(_) => {}
    }
}

fn progress_line(progress: &TrainingProgress) -> String {
    let mut line = format!(
        "loss {:.4} acc {}",
        progress.train_loss,
        percent(progress.train_acc)
    );
    if let (Some(val_loss), Some(val_acc)) = (progress.val_loss, progress.val_acc) {
        line.push_str(&format!(" | val loss {:.4} acc {}", val_loss, percent(val_acc)));
    }
    line
}

/// Print the outcome of a followed run
fn report(tracker: &RunTracker) -> CliResult<()> {
    match tracker.phase() {
        RunPhase::Completed => {
            print_success("Training complete");
            if let Some(complete) = tracker.completion() {
                print_kv("Model", &complete.model_path);
                print_kv("Train accuracy", &percent(complete.final_train_acc));
                print_kv("Val accuracy", &percent(complete.final_val_acc));
            }
            if let Some(best) = tracker.best_val_acc() {
                print_kv("Best val accuracy", &percent(best));
            }
            Ok(())
        }
        RunPhase::Stopped => {
            print_warning(tracker.message().unwrap_or("Training stopped"));
            Ok(())
        }
        RunPhase::Errored => Err(CliError::Training(
            tracker.message().unwrap_or("training failed").to_string(),
        )),
        RunPhase::Idle | RunPhase::Started | RunPhase::Running => {
            print_info(&format!(
                "Stopped watching after {} epoch(s)",
                tracker.progress().len()
            ));
            Ok(())
        }
    }
}

// =============================================================================
// REST Views
// =============================================================================

async fn execute_config(ctx: &Context) -> CliResult<()> {
    let services = ctx.services()?;
    let config = services.training.config().await?;
    let architectures = services.training.architectures().await?;

    print_header("Training Configuration");
    println!("{}", serde_json::to_string_pretty(&config)?);
    print_header("Architectures");
    println!("{}", serde_json::to_string_pretty(&architectures)?);
    Ok(())
}

async fn execute_history(ctx: &Context) -> CliResult<()> {
    let services = ctx.services()?;
    let logs = services.trainer.training_logs().await?;

    print_header("Training History");
    match logs {
        Value::Array(entries) if entries.is_empty() => print_info("No training runs recorded"),
        Value::Array(entries) => {
            for entry in entries {
                println!("  {}", serde_json::to_string(&entry)?);
            }
        }
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

async fn execute_health(ctx: &Context) -> CliResult<()> {
    let services = ctx.services()?;
    let health = services.trainer.health().await?;

    if health.is_ok() {
        print_success("Training service is up");
    } else {
        print_warning(&format!("Training service reports '{}'", health.status));
    }
    print_kv(
        "Training in progress",
        if health.current_training { "yes" } else { "no" },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hwr_console::{
        ChannelConfig, Connector, ReconnectPolicy, TrainingComplete, TrainingStarted, Transport,
        TransportError,
    };
    use std::sync::Arc;

    struct UnreachableService;

    #[async_trait]
    impl Connector for UnreachableService {
        async fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
            Err(TransportError::Closed)
        }
    }

    fn progress(epoch: u32, val: Option<f64>) -> TrainingProgress {
        TrainingProgress {
            epoch,
            train_loss: 0.25,
            train_acc: 0.9,
            val_loss: val.map(|_| 0.3),
            val_acc: val,
        }
    }

    #[test]
    fn test_progress_line() {
        assert_eq!(progress_line(&progress(1, None)), "loss 0.2500 acc 90.00%");
        assert_eq!(
            progress_line(&progress(1, Some(0.95))),
            "loss 0.2500 acc 90.00% | val loss 0.3000 acc 95.00%"
        );
    }

    #[test]
    fn test_report_outcomes() {
        let mut tracker = RunTracker::new();
        tracker.observe(&TrainingEvent::Started(TrainingStarted {
            training_id: "abc".to_string(),
        }));
        tracker.observe(&TrainingEvent::Progress(progress(1, Some(0.95))));
        assert!(report(&tracker).is_ok());

        tracker.observe(&TrainingEvent::Complete(TrainingComplete {
            model_path: "saved_models/cnn.pth".to_string(),
            final_train_acc: 0.9,
            final_val_acc: 0.95,
        }));
        assert!(report(&tracker).is_ok());

        let mut failed = RunTracker::new();
        failed.observe(&TrainingEvent::Error("数据集不存在".to_string()));
        match report(&failed) {
            Err(CliError::Training(message)) => assert_eq!(message, "数据集不存在"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_follow_fails_when_connection_is_lost() {
        let config = ChannelConfig {
            reconnection: ReconnectPolicy {
                enabled: true,
                delay_ms: 10,
                max_attempts: 2,
            },
            ..ChannelConfig::default()
        };
        let channel = TrainingChannel::with_connector(config, Arc::new(UnreachableService));
        let events = channel.events();
        channel.connect();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            follow(&channel, events, 10, None),
        )
        .await
        .expect("follow never returned");
        match outcome {
            Err(CliError::Training(message)) => {
                assert_eq!(message, "lost connection to the training service")
            }
            other => panic!("unexpected outcome {:?}", other.map(|t| t.phase())),
        }
    }
}
