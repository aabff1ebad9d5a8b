use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use outlay_core::{
    budget_status, category_summary, local_today, monthly_summary, NewExpense, TemplateDraft,
};
use outlay_recurring::{
    DailyTrigger, DueSetProcessor, ExpenseStore, OnDemandTrigger, TemplateService,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

mod config;
mod ledger;
mod server;
mod state;

use config::Config;
use ledger::LedgerFile;

#[derive(Parser, Debug)]
#[command(
    name = "outlay",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("OUTLAY_BUILD_SHA"), ")"),
    about = "Personal expense ledger with recurring-expense processing"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default ~/.outlay/config.toml
    Init,

    /// Manage recurring expense templates
    Recurring {
        #[command(subcommand)]
        command: RecurringCommand,
    },

    /// Materialize every due recurring expense now
    ProcessDue {
        /// Process as of this date (default: today in the configured timezone)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Run the daily scheduler and the HTTP endpoint until Ctrl-C
    Serve,

    /// Monthly budgets
    Budget {
        #[command(subcommand)]
        command: BudgetCommand,
    },

    /// Spending totals
    Summary {
        #[command(subcommand)]
        command: SummaryCommand,
    },

    /// Record expenses directly
    Expense {
        #[command(subcommand)]
        command: ExpenseCommand,
    },
}

#[derive(Args, Debug)]
struct TemplateArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    category: String,
    /// WEEKLY or MONTHLY (case-insensitive)
    #[arg(long)]
    frequency: String,
    /// First (or next) occurrence, YYYY-MM-DD
    #[arg(long)]
    next_due: NaiveDate,
}

impl From<TemplateArgs> for TemplateDraft {
    fn from(a: TemplateArgs) -> Self {
        TemplateDraft {
            title: a.title,
            amount: a.amount,
            category: a.category,
            frequency: a.frequency,
            next_due_date: a.next_due,
        }
    }
}

#[derive(Subcommand, Debug)]
enum RecurringCommand {
    /// Add a recurring expense
    Add(TemplateArgs),
    /// List recurring expenses, soonest due first
    List,
    /// Replace a recurring expense's fields
    Update {
        id: Uuid,
        #[command(flatten)]
        fields: TemplateArgs,
    },
    /// Stop materializing a recurring expense
    Pause { id: Uuid },
    /// Resume a paused recurring expense
    Resume { id: Uuid },
    /// Delete a recurring expense (already created expenses are kept)
    Delete { id: Uuid },
    /// Show what process-due would create, without writing anything
    Preview {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    /// Set (or replace) the limit for one month
    Set {
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        limit: f64,
    },
    /// Spent, remaining and alert level for one month (default: current month)
    Status {
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },
}

#[derive(Subcommand, Debug)]
enum SummaryCommand {
    /// Totals per month of one year (default: current year)
    Monthly {
        #[arg(long)]
        year: Option<i32>,
    },
    /// All-time totals per category
    Category,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    /// Record a one-off expense
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        category: String,
        /// Default: today in the configured timezone
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = config::load_config()?;
    let ledger = Arc::new(LedgerFile::open(state::ledger_path()?).await?);
    let owner = cfg.user.owner_id;

    match cli.command {
        Command::Init => config::init_config()?,

        Command::Recurring { command } => recurring(&cfg, ledger, command).await?,

        Command::ProcessDue { date } => {
            let date = date.map_or_else(|| today(&cfg), Ok)?;
            let trigger = OnDemandTrigger::new(Arc::new(processor(&cfg, &ledger)));
            let response = trigger.run(date).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Command::Serve => serve(&cfg, ledger).await?,

        Command::Budget { command } => match command {
            BudgetCommand::Set { month, year, limit } => {
                let budget = ledger.set_budget(owner, month, year, limit).await?;
                println!(
                    "Budget for {}-{:02}: ${:.2}",
                    budget.year, budget.month, budget.monthly_limit
                );
            }
            BudgetCommand::Status { month, year } => {
                let now = today(&cfg)?;
                let (month, year) = (month.unwrap_or(now.month()), year.unwrap_or(now.year()));
                let Some(budget) = ledger.budget_for(owner, month, year).await? else {
                    bail!(
                        "No budget for {year}-{month:02}. Run: outlay budget set --month {month} --year {year} --limit <amount>"
                    );
                };
                let expenses = ExpenseStore::list_for_owner(&*ledger, owner).await?;
                let status = budget_status(&budget, &expenses, cfg.thresholds());
                println!("Budget {}-{:02}", status.year, status.month);
                println!("  limit:     ${:.2}", status.monthly_limit);
                println!("  spent:     ${:.2}", status.spent);
                println!("  remaining: ${:.2}", status.remaining);
                println!("  used:      {:.1}%", status.percent_used);
                if let Some(alert) = status.alert {
                    println!("\n{}", alert.message());
                }
            }
        },

        Command::Summary { command } => {
            let expenses = ExpenseStore::list_for_owner(&*ledger, owner).await?;
            match command {
                SummaryCommand::Monthly { year } => {
                    let year = match year {
                        Some(y) => y,
                        None => today(&cfg)?.year(),
                    };
                    println!("# {year}\n");
                    for row in monthly_summary(&expenses, owner, year) {
                        println!("{:02}  ${:>10.2}", row.month, row.total);
                    }
                }
                SummaryCommand::Category => {
                    for row in category_summary(&expenses, owner) {
                        println!("{:<20} ${:>10.2}", row.category, row.total);
                    }
                }
            }
        }

        Command::Expense { command } => match command {
            ExpenseCommand::Add {
                title,
                amount,
                category,
                date,
            } => {
                let date = date.map_or_else(|| today(&cfg), Ok)?;
                let expense = NewExpense::manual(owner, title, amount, category, date)?;
                let id = ledger.create(expense).await?;
                println!("Recorded expense {id}");

                if let Some(budget) = ledger.budget_for(owner, date.month(), date.year()).await? {
                    let expenses = ExpenseStore::list_for_owner(&*ledger, owner).await?;
                    if let Some(alert) = budget_status(&budget, &expenses, cfg.thresholds()).alert {
                        println!("{}", alert.message());
                    }
                }
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("outlay=info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn today(cfg: &Config) -> Result<NaiveDate> {
    Ok(local_today(Utc::now(), cfg.schedule()?.timezone))
}

fn processor(cfg: &Config, ledger: &Arc<LedgerFile>) -> DueSetProcessor {
    DueSetProcessor::new(ledger.clone(), ledger.clone()).with_retry(cfg.retry_policy())
}

async fn recurring(cfg: &Config, ledger: Arc<LedgerFile>, command: RecurringCommand) -> Result<()> {
    let owner = cfg.user.owner_id;
    let service = TemplateService::new(ledger.clone());

    match command {
        RecurringCommand::Add(fields) => {
            let t = service.add(owner, fields.into()).await?;
            println!("Added {} ({}, next due {})", t.id, t.frequency, t.next_due_date);
        }
        RecurringCommand::List => {
            let templates = service.list(owner).await?;
            if templates.is_empty() {
                println!("No recurring expenses. Add one with: outlay recurring add");
            }
            for t in templates {
                println!(
                    "{} | {:<20} | ${:>9.2} | {:<12} | {:<7} | next {} | {}",
                    t.id,
                    t.title,
                    t.amount,
                    t.category,
                    t.frequency.as_str(),
                    t.next_due_date,
                    if t.active { "active" } else { "paused" }
                );
            }
        }
        RecurringCommand::Update { id, fields } => {
            let t = service.update(owner, id, fields.into()).await?;
            println!("Updated {} (next due {})", t.id, t.next_due_date);
        }
        RecurringCommand::Pause { id } => {
            service.set_active(owner, id, false).await?;
            println!("Paused {id}");
        }
        RecurringCommand::Resume { id } => {
            service.set_active(owner, id, true).await?;
            println!("Resumed {id}");
        }
        RecurringCommand::Delete { id } => {
            service.delete(owner, id).await?;
            println!("Deleted {id}");
        }
        RecurringCommand::Preview { date } => {
            let date = date.map_or_else(|| today(cfg), Ok)?;
            let plans = processor(cfg, &ledger).preview(date).await?;
            if plans.is_empty() {
                println!("Nothing due as of {date}");
            }
            for plan in plans {
                let dates: Vec<String> = plan
                    .occurrences
                    .iter()
                    .map(|o| o.date.to_string())
                    .collect();
                println!(
                    "{}: {} occurrence(s) [{}], next due {}",
                    plan.template_id,
                    plan.count(),
                    dates.join(", "),
                    plan.next_due_date
                );
            }
        }
    }
    Ok(())
}

async fn serve(cfg: &Config, ledger: Arc<LedgerFile>) -> Result<()> {
    let schedule = cfg.schedule()?;
    let processor = Arc::new(processor(cfg, &ledger));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let timer = if cfg.scheduler.enabled {
        info!(
            timezone = %schedule.timezone,
            run_at = %schedule.run_at,
            "daily recurring scheduler enabled"
        );
        Some(DailyTrigger::new(processor.clone(), schedule).spawn(shutdown_rx.clone()))
    } else {
        None
    };

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "listening for Ctrl-C failed, shutting down");
        }
        info!("shutting down");
        let _ = shutdown_tx.send(true);
    });

    let state = server::AppState {
        trigger: OnDemandTrigger::new(processor),
        timezone: schedule.timezone,
    };
    println!("POST http://{}/api/recurring/process-due", cfg.server.bind);
    server::serve(&cfg.server.bind, state, shutdown_rx).await?;

    if let Some(handle) = timer {
        handle.await.context("scheduler task")?;
    }
    Ok(())
}
