//! `bruin run` — Start the full assistant.
//!
//! Wires everything together: SQLite stores, the alarm scheduler, the event
//! processor, the tool registry, the provider, and the console channel. Runs
//! until the console exits or Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use bruin_agent::Orchestrator;
use bruin_channels::{ConsoleChannel, MessageValidator, Notifier};
use bruin_config::AppConfig;
use bruin_core::event::{event_queue, EventHandler};
use bruin_core::tool::ToolRegistry;
use bruin_core::AlarmStore;
use bruin_providers::OpenAiCompatProvider;
use bruin_scheduler::{processor::run_event_processor, AlarmScheduler};
use bruin_store::{SqliteAlarmStore, SqliteContextStore};
use bruin_tools::{
    CreateAlarmTool, DeleteAlarmTool, ListAlarmsTool, NotifyUsersTool, UpdateAlarmTool,
};

/// The console channel's user identity. Single-user deployment: the person
/// at the terminal.
const CONSOLE_USER_ID: &str = "console-user";

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => AppConfig::load_from(&path)?,
        None => AppConfig::load()?,
    };

    let Some(api_key) = config.api_key.clone() else {
        return Err(
            "No API key configured. Set api_key in ~/.bruin/config.toml or export BRUIN_API_KEY."
                .into(),
        );
    };

    // Storage
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = bruin_store::connect(&db_path.display().to_string()).await?;
    let alarm_store: Arc<SqliteAlarmStore> = Arc::new(SqliteAlarmStore::new(pool.clone()).await?);
    let context_store = Arc::new(SqliteContextStore::new(pool, config.agent.history_limit).await?);

    // Provider
    let provider = match config.provider.api_url.as_deref() {
        Some(url) => OpenAiCompatProvider::new(config.provider.name.clone(), url, api_key)?,
        None => OpenAiCompatProvider::openai(api_key)?,
    };

    // Outbound notifications
    let notifier = Notifier::new();

    // Tools, bound to the console user
    let alarm_store_dyn: Arc<dyn AlarmStore> = alarm_store.clone();
    let mut tools = ToolRegistry::new();
    tools.register(Box::new(CreateAlarmTool::new(
        alarm_store_dyn.clone(),
        CONSOLE_USER_ID,
        "console",
    )));
    tools.register(Box::new(ListAlarmsTool::new(
        alarm_store_dyn.clone(),
        CONSOLE_USER_ID,
    )));
    tools.register(Box::new(UpdateAlarmTool::new(alarm_store_dyn.clone())));
    tools.register(Box::new(DeleteAlarmTool::new(alarm_store_dyn)));
    tools.register(Box::new(NotifyUsersTool::new(notifier.clone())));

    // Orchestrator
    let orchestrator: Arc<dyn EventHandler> = Arc::new(Orchestrator::new(
        &config,
        Arc::new(provider),
        Arc::new(tools),
        context_store,
    ));

    // Scheduler and event processor
    let (queue, queue_rx) = event_queue();
    let scheduler = AlarmScheduler::new(
        alarm_store,
        queue,
        config.scheduler.check_interval(),
        config.scheduler.missed_policy,
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let scheduler_task = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));
    let processor_task = tokio::spawn(run_event_processor(
        queue_rx,
        orchestrator.clone(),
        shutdown_tx.subscribe(),
    ));

    // Console channel, in the foreground
    let user_name = std::env::var("USER").unwrap_or_else(|_| "friend".into());
    let console = ConsoleChannel::new(
        orchestrator,
        notifier,
        MessageValidator::new(config.agent.max_message_tokens),
        CONSOLE_USER_ID,
        user_name,
    );
    let mut console_task = tokio::spawn(console.run(shutdown_tx.subscribe()));

    info!(model = %config.provider.model, "bruin is running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
        _ = &mut console_task => {
            info!("console exited, shutting down");
        }
    }

    let _ = shutdown_tx.send(());
    let drained = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = scheduler_task.await;
        let _ = processor_task.await;
    })
    .await;
    if drained.is_err() {
        warn!("background tasks did not stop in time");
    }
    console_task.abort();

    Ok(())
}
