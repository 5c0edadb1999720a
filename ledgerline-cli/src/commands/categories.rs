//! Category commands

use anyhow::Result;
use clap::Subcommand;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Add a user-defined category
    Add {
        /// Category name
        name: String,
    },
}

pub fn run(command: Option<CategoryCommands>) -> Result<()> {
    let ctx = get_context()?;
    let user = ctx.local_user()?;

    match command {
        None => {
            let categories = ctx.ledger_service.list_categories(user.id)?;
            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Scope"]);
            for c in &categories {
                table.add_row(vec![
                    c.id.to_string(),
                    c.name.clone(),
                    if c.user_id.is_some() { "user" } else { "system" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        Some(CategoryCommands::Add { name }) => {
            let category = ctx.ledger_service.create_category(user.id, &name)?;
            output::success(&format!("Created category {} ({})", category.name, category.id));
        }
    }
    Ok(())
}
