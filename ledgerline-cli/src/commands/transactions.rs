//! Transaction commands - list, add manual, categorize, hide, annotate

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use rust_decimal::Decimal;
use uuid::Uuid;

use ledgerline_core::{Flow, LedgerlineContext};

use super::{get_context, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a manual transaction
    New {
        /// Account id
        account: String,
        /// Amount (always positive)
        amount: Decimal,
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
        /// Description
        description: String,
        /// Flow (income, expense, transfer)
        #[arg(long, default_value = "expense")]
        flow: String,
        /// Category name
        #[arg(long)]
        category: Option<String>,
    },
    /// Assign a category to a transaction
    Categorize {
        /// Transaction id
        id: String,
        /// Category name
        category: String,
    },
    /// Hide a transaction from reports
    Hide {
        /// Transaction id
        id: String,
        /// Unhide instead
        #[arg(long)]
        undo: bool,
    },
    /// Attach a note to a transaction
    Note {
        /// Transaction id
        id: String,
        /// Note text (omit to clear)
        text: Option<String>,
    },
    /// Delete a manual transaction
    Remove {
        /// Transaction id
        id: String,
    },
}

/// `Flow::parse` maps anything unknown to `Unrecognized`; for user input
/// that means a typo, so reject it instead of storing it.
fn parse_flow(s: &str) -> Result<Flow> {
    match Flow::parse(s) {
        Flow::Unrecognized => bail!("Unknown flow '{s}' (expected income, expense, or transfer)"),
        flow => Ok(flow),
    }
}

fn find_category(ctx: &LedgerlineContext, user_id: Uuid, name: &str) -> Result<Uuid> {
    let categories = ctx.ledger_service.list_categories(user_id)?;
    match categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
    {
        Some(category) => Ok(category.id),
        None => bail!("No category named '{name}'. See 'll categories'."),
    }
}

pub fn run(command: Option<TransactionCommands>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = ctx.local_user()?;

    match command {
        None => {
            let transactions = ctx.ledger_service.list_transactions(user.id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
                return Ok(());
            }
            if transactions.is_empty() {
                output::warning("No transactions yet. Run 'll sync' or add one manually.");
                return Ok(());
            }
            let mut table = output::create_table();
            table.set_header(vec!["ID", "Date", "Description", "Amount", "Flow", "Hidden"]);
            for t in &transactions {
                table.add_row(vec![
                    t.id.to_string(),
                    t.date.to_string(),
                    t.description.clone(),
                    t.amount.to_string(),
                    t.flow.to_string(),
                    if t.hidden { "yes" } else { "" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        Some(TransactionCommands::New {
            account,
            amount,
            date,
            description,
            flow,
            category,
        }) => {
            let account_id = parse_id(&account, "account")?;
            let flow = parse_flow(&flow)?;
            let category_id = category
                .as_deref()
                .map(|name| find_category(&ctx, user.id, name))
                .transpose()?;
            let tx = ctx.ledger_service.create_manual_transaction(
                user.id,
                account_id,
                amount,
                date,
                &description,
                flow,
                category_id,
            )?;
            output::success(&format!("Recorded {} ({})", tx.description, tx.id));
        }
        Some(TransactionCommands::Categorize { id, category }) => {
            let id = parse_id(&id, "transaction")?;
            let category_id = find_category(&ctx, user.id, &category)?;
            ctx.ledger_service
                .set_category(id, user.id, Some(category_id), None)?;
            output::success(&format!("Categorized as {category}"));
        }
        Some(TransactionCommands::Hide { id, undo }) => {
            let id = parse_id(&id, "transaction")?;
            ctx.ledger_service.set_hidden(id, user.id, !undo)?;
            output::success(if undo { "Transaction unhidden" } else { "Transaction hidden" });
        }
        Some(TransactionCommands::Note { id, text }) => {
            let id = parse_id(&id, "transaction")?;
            ctx.ledger_service.set_notes(id, user.id, text.as_deref())?;
            output::success(if text.is_some() { "Note saved" } else { "Note cleared" });
        }
        Some(TransactionCommands::Remove { id }) => {
            let id = parse_id(&id, "transaction")?;
            ctx.ledger_service.delete_transaction(id, user.id)?;
            output::success("Transaction deleted");
        }
    }
    Ok(())
}
