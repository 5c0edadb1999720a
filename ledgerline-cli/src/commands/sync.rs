//! Sync command - pull fresh data for one or all connections

use anyhow::Result;
use colored::Colorize;

use super::{get_context, parse_id};
use crate::output;

pub fn run(connection: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = ctx.local_user()?;

    let ids: Vec<_> = match connection {
        Some(raw) => vec![parse_id(raw, "connection")?],
        None => ctx
            .connection_service
            .list(user.id)?
            .into_iter()
            .map(|c| c.id)
            .collect(),
    };

    if ids.is_empty() {
        output::warning("No connections to sync. Use 'll link' to add one.");
        return Ok(());
    }

    let mut summaries = Vec::new();
    for id in ids {
        match ctx.sync_service.sync_connection(id, user.id) {
            Ok(summary) => summaries.push((id, summary)),
            Err(e) => {
                // Explicit syncs surface failures per connection
                println!("{} {} - {}", "Error:".red(), id, e);
            }
        }
    }

    if json {
        let payload: Vec<_> = summaries
            .iter()
            .map(|(id, s)| serde_json::json!({ "connection": id, "summary": s }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    for (id, summary) in &summaries {
        println!("{} {}", "Synced:".green(), id);
        println!("  New transactions: {}", summary.added);
        println!("  Modified transactions: {}", summary.modified);
        if summary.skipped_transactions > 0 {
            println!("  Skipped transactions: {}", summary.skipped_transactions);
        }
        for (account, reason) in &summary.skipped_accounts {
            println!("  {} account {account}: {reason}", "Skipped".yellow());
        }
        println!();
    }
    Ok(())
}
