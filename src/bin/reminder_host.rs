use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use organiza::core::Config;
use organiza::database::TaskDatabase;
use organiza::features::reminders::{
    BroadcastNotifier, ReminderEffect, ReminderError, ReminderPolicy, ReminderScheduler,
    TaskLifecycleCoordinator, TokioClock,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting reminder host...");
    info!(
        "Reminders fire {} minute(s) before the due time",
        config.lead_time.num_minutes()
    );

    let database = Arc::new(TaskDatabase::new(&config.database_path).await?);
    let (clock, fires) = TokioClock::new(config.exact_timers);
    let notifier = Arc::new(BroadcastNotifier::new());

    let scheduler = Arc::new(ReminderScheduler::new(
        ReminderPolicy::new(config.lead_time),
        Arc::new(clock),
        database.clone(),
        notifier.clone(),
    ));
    // Task create/edit/complete/delete events come from the embedding
    // application through `TaskLifecycleCoordinator::handle`; this host only
    // restores reminders and delivers fires.
    let coordinator =
        TaskLifecycleCoordinator::new(scheduler.clone(), database.clone(), notifier.clone());

    // Stand-in presentation layer: log every effect
    let mut effects = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match effects.recv().await {
                Ok(ReminderEffect::Present { notification }) => {
                    info!("🔔 {} | {}", notification.title, notification.body);
                }
                Ok(effect) => match effect.to_json() {
                    Ok(json) => info!("Reminder effect: {json}"),
                    Err(e) => warn!("Failed to encode reminder effect: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Presentation layer lagged, skipped {skipped} effect(s)");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    match coordinator.startup().await {
        Ok(armed) => info!("Startup complete, {armed} reminder(s) armed"),
        Err(ReminderError::Timer(e)) => {
            error!("Reminders disabled: {e}");
            error!("Set EXACT_TIMERS=true once the host grants exact timers");
        }
        Err(ReminderError::Batch(failures)) => {
            for failure in &failures {
                warn!("{failure}");
            }
            warn!("{} reminder(s) could not be armed at startup", failures.len());
        }
        Err(e) => error!("Failed to restore reminders: {e:#}"),
    }

    // Start the fire loop
    let runner = tokio::spawn(scheduler.clone().run(fires));

    info!("Reminder host running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down reminder host");
    runner.abort();
    Ok(())
}
