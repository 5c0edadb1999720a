//! Recategorize command - re-run rules over existing synced transactions

use anyhow::Result;

use super::get_context;
use crate::output;

pub fn run() -> Result<()> {
    let ctx = get_context()?;
    let user = ctx.local_user()?;

    let result = ctx.categorization_service.recategorize(user.id)?;
    output::success(&format!(
        "Recategorized {} of {} transactions ({} manual or hidden rows left alone)",
        result.updated, result.total, result.skipped
    ));
    Ok(())
}
