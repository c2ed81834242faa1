use std::sync::Arc;

use alice::interaction::DesktopDriver;
use alice::{Alice, AliceConfig};
use anyhow::Context;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const UTILITY_WINDOW: usize = 20;

#[cfg(feature = "desktop")]
fn driver() -> Arc<dyn DesktopDriver> {
    Arc::new(alice::interaction::NativeDriver::new())
}

#[cfg(not(feature = "desktop"))]
fn driver() -> Arc<dyn DesktopDriver> {
    Arc::new(alice::interaction::HeadlessDriver::new(1920, 1080))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AliceConfig::load_with_dotenv().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    tracing::info!("Alice booting...");

    let alice = Alice::new(config, driver());
    alice.initialize().await?;
    tracing::info!("Alice ready. One JSON task per line, :quit to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match line {
            ":quit" | ":exit" => break,
            ":state" => serde_json::to_value(alice.state_summary())?,
            ":utility" => json!(alice.utility_history(UTILITY_WINDOW)),
            ":metrics" => serde_json::to_value(alice.system_metrics())?,
            ":health" => serde_json::to_value(alice.health().await)?,
            ":personality" => serde_json::to_value(alice.personality_summary())?,
            _ => match serde_json::from_str::<Value>(line) {
                Ok(task) => serde_json::to_value(alice.process_task(&task).await)?,
                Err(e) => json!({ "success": false, "error": format!("invalid JSON: {e}") }),
            },
        };

        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    alice.cleanup().await?;
    tracing::info!("Alice stopped");
    Ok(())
}
