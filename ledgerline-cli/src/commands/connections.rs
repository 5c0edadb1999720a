//! Link and list provider connections

use anyhow::{bail, Result};

use ledgerline_core::Provider;

use super::get_context;
use crate::output;

pub fn link(provider: &str, institution: &str, token: &str) -> Result<()> {
    let Some(provider) = Provider::parse(provider) else {
        bail!("Unknown provider '{provider}' (expected plaid or teller)");
    };

    let ctx = get_context()?;
    let user = ctx.local_user()?;
    let view = ctx
        .connection_service
        .link(user.id, provider, institution, token)?;

    output::success(&format!("Linked {} via {}", view.institution_name, view.provider));
    if !view.has_synced {
        output::warning("Initial sync did not complete; run 'll sync' to retry");
    }
    Ok(())
}

pub fn list(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = ctx.local_user()?;
    let connections = ctx.connection_service.list(user.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&connections)?);
        return Ok(());
    }

    if connections.is_empty() {
        output::warning("No connections. Use 'll link' to add one.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Provider", "Institution", "Synced"]);
    for c in &connections {
        table.add_row(vec![
            c.id.to_string(),
            c.provider.to_string(),
            c.institution_name.clone(),
            if c.has_synced { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
