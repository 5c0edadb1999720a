//! Categorization rule commands

use anyhow::{bail, Result};
use clap::Subcommand;

use super::{get_context, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum RuleCommands {
    /// Add a keyword rule (lower priority wins first)
    Add {
        /// Keyword to match against descriptions (case-insensitive substring)
        keyword: String,
        /// Category name to assign
        category: String,
        /// Rule priority
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// Remove a rule
    Remove {
        /// Rule id
        id: String,
    },
}

pub fn run(command: Option<RuleCommands>) -> Result<()> {
    let ctx = get_context()?;
    let user = ctx.local_user()?;

    match command {
        None => {
            let rules = ctx.ledger_service.list_rules(user.id)?;
            if rules.is_empty() {
                output::warning("No rules. Built-in keyword rules still apply during sync.");
                return Ok(());
            }
            let categories = ctx.ledger_service.list_categories(user.id)?;
            let mut table = output::create_table();
            table.set_header(vec!["ID", "Keyword", "Category", "Priority"]);
            for r in &rules {
                let category = categories
                    .iter()
                    .find(|c| c.id == r.category_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| r.category_id.to_string());
                table.add_row(vec![
                    r.id.to_string(),
                    r.keyword.clone(),
                    category,
                    r.priority.to_string(),
                ]);
            }
            println!("{table}");
        }
        Some(RuleCommands::Add {
            keyword,
            category,
            priority,
        }) => {
            let categories = ctx.ledger_service.list_categories(user.id)?;
            let Some(category) = categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&category))
            else {
                bail!("No category named '{category}'. See 'll categories'.");
            };
            let rule = ctx
                .ledger_service
                .create_rule(user.id, &keyword, category.id, priority)?;
            output::success(&format!(
                "Rule added: '{}' -> {} ({})",
                rule.keyword, category.name, rule.id
            ));
        }
        Some(RuleCommands::Remove { id }) => {
            let id = parse_id(&id, "rule")?;
            ctx.ledger_service.delete_rule(id, user.id)?;
            output::success("Rule removed");
        }
    }
    Ok(())
}
