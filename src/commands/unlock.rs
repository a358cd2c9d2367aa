//! Unlock command - clear a stale run lock.

use anyhow::Result;
use chronicle_migrations::version::display_version;

use crate::cli::GlobalArgs;
use crate::output::{self, CommandResult, OutputFormat};

/// Execute unlock.
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let format = OutputFormat::from_json_flag(global.json);
    let runner = super::connect(global).await?;

    let holder = runner.lock_holder().await?;
    let cleared = runner.unlock().await?;

    let message = if cleared {
        "Run lock cleared."
    } else {
        "No run lock was held."
    };

    match format {
        OutputFormat::Json => {
            CommandResult::success(serde_json::json!({
                "cleared": cleared,
                "holder": holder.as_ref().map(|h| h.holder.clone()),
            }))
            .with_message(message)
            .print(format)?;
        }
        OutputFormat::Text => {
            if let Some(holder) = holder {
                output::key_value(
                    "Holder",
                    &format!("{} (since {})", holder.holder, display_version(holder.acquired)),
                );
            }
            output::success(message);
        }
    }

    Ok(())
}
