use clap::Args;
use deadswitch_core::{Config, LivenessController, LivenessMonitor};
use serde_json::json;
use tracing::info;

use super::open_store;

#[derive(Args)]
pub struct WatchArgs {
    /// Stop after this many published statuses
    #[arg(long)]
    pub count: Option<usize>,
    /// Poll interval in seconds (defaults to monitor.poll_interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
}

pub fn run(args: WatchArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(config)?;
    let interval = match args.interval {
        Some(secs) => std::time::Duration::from_secs(secs.max(1)),
        None => config.monitor.poll_interval(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let controller = LivenessController::with_system_clock(db).with_poll_interval(interval);
        let mut handle = LivenessMonitor::spawn(controller);
        let mut statuses = handle.subscribe();
        let mut events = handle.subscribe_events();
        info!(interval_secs = interval.as_secs(), "watching switch; Ctrl-C to stop");

        let mut printed = 0usize;
        let limit_reached = |printed: usize| args.count.is_some_and(|limit| printed >= limit);

        if let Some(status) = *statuses.borrow_and_update() {
            println!("{}", serde_json::to_string(&json!({ "status": status }))?);
            printed += 1;
        }

        while !limit_reached(printed) {
            tokio::select! {
                changed = statuses.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(status) = *statuses.borrow_and_update() {
                        println!("{}", serde_json::to_string(&json!({ "status": status }))?);
                        printed += 1;
                    }
                }
                Ok(event) = events.recv() => {
                    println!("{}", serde_json::to_string(&json!({ "event": event }))?);
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        handle.shutdown();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
