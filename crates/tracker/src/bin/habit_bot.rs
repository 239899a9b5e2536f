use std::sync::Arc;

use database::{participant, Database};
use tokio::io::BufReader;
use tracing::info;
use tracker::{
    Calendar, EventProcessor, LoggingSink, ReminderScheduler, SystemClock, Tracker, TrackerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries responses
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tracker=info".parse()?)
                .add_directive("database=info".parse()?),
        )
        .init();

    let config = TrackerConfig::from_env()?;
    info!(
        database = %config.database_url,
        zone = %config.zone,
        "Starting habit bot"
    );

    let db = Database::connect_with_pool_size(&config.database_url, config.pool_size).await?;
    db.migrate().await?;

    let registered = participant::count_participants(db.pool()).await?;
    info!(registered, "Participant registry loaded");

    let calendar = Calendar::new(Arc::new(SystemClock), config.zone);
    let sink = Arc::new(LoggingSink);

    let scheduler = ReminderScheduler::new(
        db.pool().clone(),
        calendar.clone(),
        sink.clone(),
        config.schedule,
    )
    .with_max_nap(config.max_nap);
    let scheduler_task = tokio::spawn(scheduler.run());

    let tracker = Tracker::new(db.pool().clone(), calendar, sink);
    let processor = EventProcessor::new(tracker);

    let stats = processor
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    info!(?stats, "Input closed, shutting down");

    scheduler_task.abort();
    db.close().await;
    Ok(())
}
