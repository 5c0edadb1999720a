//! Account commands - list, add manual, remove

use anyhow::Result;
use clap::Subcommand;
use rust_decimal::Decimal;

use ledgerline_core::AccountType;

use super::{get_context, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a manually tracked account
    New {
        /// Display name
        name: String,
        /// Account type (checking, savings, credit, investment, loan, cash)
        #[arg(long, default_value = "cash")]
        account_type: String,
        /// Opening balance
        #[arg(long, default_value = "0")]
        balance: Decimal,
    },
    /// Delete an account and its transactions
    Remove {
        /// Account id
        id: String,
    },
}

pub fn run(command: Option<AccountCommands>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = ctx.local_user()?;

    match command {
        None => {
            let accounts = ctx.ledger_service.list_accounts(user.id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
                return Ok(());
            }
            if accounts.is_empty() {
                output::warning("No accounts yet. Link a connection or add one manually.");
                return Ok(());
            }
            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Type", "Balance", "Currency", "Manual"]);
            for a in &accounts {
                table.add_row(vec![
                    a.id.to_string(),
                    a.name.clone(),
                    a.account_type.to_string(),
                    a.balance.to_string(),
                    a.currency.clone(),
                    if a.is_manual { "yes" } else { "" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        Some(AccountCommands::New {
            name,
            account_type,
            balance,
        }) => {
            let account = ctx.ledger_service.create_manual_account(
                user.id,
                &name,
                AccountType::parse(&account_type),
                balance,
            )?;
            output::success(&format!("Created account {} ({})", account.name, account.id));
        }
        Some(AccountCommands::Remove { id }) => {
            let id = parse_id(&id, "account")?;
            ctx.ledger_service.delete_account(id, user.id)?;
            output::success("Account and its transactions deleted");
        }
    }
    Ok(())
}
