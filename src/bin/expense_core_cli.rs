//! Command line front end over the JSON store and the file report queue.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use expense_core::config::{Config, ConfigManager};
use expense_core::core::scheduler::{MaterializationScheduler, RunReport, TickOutcome};
use expense_core::core::services::{
    ExpenseService, MonthlyOutcome, NewExpense, RecurringService, ReportAggregator, ReportService,
};
use expense_core::core::time::SystemClock;
use expense_core::core::triggers::Triggers;
use expense_core::core::utils::PathResolver;
use expense_core::domain::{
    DateWindow, NewRecurringDefinition, Owner, RecurringDefinition, RecurringInterval, ReportFormat,
};
use expense_core::errors::Result;
use expense_core::queue::{FileQueue, LoggingReportHandler, ReportWorker};
use expense_core::storage::{JsonStore, OwnerDirectory};

/// Expense tracking with recurring materialization and queued reports.
#[derive(Parser)]
#[command(name = "expense_core_cli", version, about)]
struct Cli {
    /// Data directory. Defaults to $EXPENSE_CORE_HOME or ~/.expense_core.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage owners.
    #[command(subcommand)]
    Owner(OwnerCommand),
    /// Manage recurring expense definitions.
    #[command(subcommand)]
    Recurring(RecurringCommand),
    /// Record ledger entries.
    #[command(subcommand)]
    Expense(ExpenseCommand),
    /// Run one materialization tick and print the outcome per definition.
    Tick {
        /// Evaluate as of this RFC 3339 instant instead of now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Queue an on-demand report.
    Report {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        format: Option<ReportFormat>,
    },
    /// Queue last month's report for every owner.
    Monthly {
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Consume queued reports.
    Worker {
        /// Handle what is queued now and exit.
        #[arg(long)]
        drain: bool,
    },
    /// Run the daily and monthly triggers plus the report worker until Ctrl-C.
    Serve,
}

#[derive(Subcommand)]
enum OwnerCommand {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    List,
}

#[derive(Args)]
struct DefinitionRef {
    #[arg(long)]
    owner: Uuid,
    #[arg(long)]
    id: Uuid,
}

#[derive(Subcommand)]
enum RecurringCommand {
    Add {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        description: String,
        /// daily, weekly or monthly.
        #[arg(long)]
        interval: RecurringInterval,
        #[arg(long)]
        start: NaiveDate,
        /// Last date (inclusive) the definition may materialize on.
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        category: Option<String>,
    },
    List {
        #[arg(long)]
        owner: Uuid,
    },
    Pause(DefinitionRef),
    Resume(DefinitionRef),
    Remove(DefinitionRef),
}

#[derive(Subcommand)]
enum ExpenseCommand {
    Add {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },
}

/// Everything a command needs, wired over one data directory.
struct App {
    config: Config,
    store: Arc<JsonStore>,
    queue: Arc<FileQueue>,
}

impl App {
    async fn open(home: PathBuf) -> Result<Self> {
        let config = ConfigManager::with_base_dir(&home).load().await?;
        expense_core::init_with_filter(Some(config.log_filter.as_str()));
        let store = Arc::new(JsonStore::open(PathResolver::store_file_in(&home)).await?);
        let queue = FileQueue::open(PathResolver::queue_dir_in(&home))
            .await?
            .with_lease(config.claim_lease());
        let queue = Arc::new(queue);
        info!(home = %home.display(), "data directory opened");
        Ok(Self {
            config,
            store,
            queue,
        })
    }

    fn scheduler(&self) -> MaterializationScheduler {
        MaterializationScheduler::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.config.scheduler_options(),
        )
    }

    fn recurring(&self) -> RecurringService {
        RecurringService::new(self.store.clone(), self.store.clone())
    }

    fn expenses(&self) -> ExpenseService {
        ExpenseService::new(self.store.clone(), self.store.clone())
    }

    fn reports(&self) -> ReportService {
        ReportService::new(
            self.store.clone(),
            ReportAggregator::new(self.store.clone(), self.store.clone()),
            self.queue.clone(),
            self.config.reports.default_format,
        )
    }

    fn worker(&self) -> ReportWorker {
        ReportWorker::new(
            self.queue.clone(),
            Arc::new(LoggingReportHandler),
            self.config.worker_options(),
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app = App::open(PathResolver::resolve_base(cli.home)).await?;
    match cli.command {
        Command::Owner(command) => owner(&app, command).await,
        Command::Recurring(command) => recurring(&app, command).await,
        Command::Expense(command) => expense(&app, command).await,
        Command::Tick { at } => {
            let report = app.scheduler().run_tick(at.unwrap_or_else(Utc::now)).await?;
            print_run_report(&report);
            Ok(())
        }
        Command::Report {
            owner,
            start,
            end,
            format,
        } => {
            let window = DateWindow::new(start, end)?;
            let format = format.unwrap_or(app.config.reports.default_format);
            let ack = app
                .reports()
                .request_report(owner, window, format, Utc::now())
                .await?;
            println!("{}", ack.message);
            Ok(())
        }
        Command::Monthly { at } => {
            let run = app.reports().run_monthly(at.unwrap_or_else(Utc::now)).await?;
            println!(
                "{}: {} queued, {} failed",
                run.window.month_label(),
                run.queued(),
                run.errored()
            );
            for outcome in &run.outcomes {
                if let MonthlyOutcome::Errored(message) = &outcome.outcome {
                    println!("  {}  {message}", outcome.owner_id);
                }
            }
            Ok(())
        }
        Command::Worker { drain } => {
            let worker = Arc::new(app.worker());
            if drain {
                let report = worker.drain().await?;
                println!(
                    "recovered {}, handled {}, failed {}",
                    report.recovered, report.handled, report.failed
                );
                Ok(())
            } else {
                worker.run(shutdown_token()).await
            }
        }
        Command::Serve => serve(app).await,
    }
}

async fn owner(app: &App, command: OwnerCommand) -> Result<()> {
    match command {
        OwnerCommand::Add { email, name } => {
            let owner = Owner::new(email, name);
            app.store.upsert_owner(owner.clone()).await?;
            println!("{}", owner.id);
        }
        OwnerCommand::List => {
            for owner in app.store.list_owners().await? {
                println!("{}  {} <{}>", owner.id, owner.name, owner.email);
            }
        }
    }
    Ok(())
}

async fn recurring(app: &App, command: RecurringCommand) -> Result<()> {
    let service = app.recurring();
    match command {
        RecurringCommand::Add {
            owner,
            amount,
            description,
            interval,
            start,
            end,
            category,
        } => {
            let input = NewRecurringDefinition {
                amount,
                description,
                interval,
                start_date: start,
                end_date: end,
                category_name: category,
            };
            let definition = service.create(owner, input, Utc::now()).await?;
            println!("{}", definition.id);
        }
        RecurringCommand::List { owner } => {
            for definition in service.list(owner).await? {
                print_definition(&definition);
            }
        }
        RecurringCommand::Pause(target) => {
            print_definition(&service.set_active(target.owner, target.id, false).await?);
        }
        RecurringCommand::Resume(target) => {
            print_definition(&service.set_active(target.owner, target.id, true).await?);
        }
        RecurringCommand::Remove(target) => {
            service.remove(target.owner, target.id).await?;
            println!("removed {}", target.id);
        }
    }
    Ok(())
}

async fn expense(app: &App, command: ExpenseCommand) -> Result<()> {
    match command {
        ExpenseCommand::Add {
            owner,
            amount,
            description,
            category,
            date,
        } => {
            let entry = app
                .expenses()
                .record(
                    owner,
                    NewExpense {
                        amount,
                        description,
                        date: date.unwrap_or_else(Utc::now),
                        category_name: category,
                    },
                )
                .await?;
            println!("{}", entry.id);
        }
    }
    Ok(())
}

async fn serve(app: App) -> Result<()> {
    let cancel = shutdown_token();
    let daily_at = app.config.daily_time()?;
    let monthly_at = app.config.monthly_time()?;
    let triggers = Triggers::new(Arc::new(SystemClock), cancel.clone());

    let daily = triggers.spawn_daily(Arc::new(app.scheduler()), daily_at);
    let monthly = triggers.spawn_monthly(
        Arc::new(app.reports()),
        app.config.reports.monthly_day,
        monthly_at,
    );
    let worker = Arc::new(app.worker()).run(cancel);

    let (daily, monthly, worker) = tokio::join!(daily, monthly, worker);
    for joined in [daily, monthly] {
        if let Err(err) = joined {
            tracing::error!(error = %err, "trigger task failed");
        }
    }
    worker
}

/// Token cancelled on Ctrl-C.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C, shutting down");
            on_signal.cancel();
        }
    });
    cancel
}

fn print_definition(definition: &RecurringDefinition) {
    println!(
        "{}  {:>10}  {:<8} {:<6} {}  last {}{}",
        definition.id,
        definition.amount,
        definition.interval.label(),
        if definition.is_active { "active" } else { "paused" },
        definition.description,
        definition.watermark.format("%Y-%m-%d %H:%M"),
        definition
            .category_name
            .as_deref()
            .map(|name| format!("  [{name}]"))
            .unwrap_or_default()
    );
}

fn print_run_report(report: &RunReport) {
    println!(
        "tick at {}: {} materialized, {} skipped, {} errored, {} deferred",
        report.now.to_rfc3339(),
        report.materialized(),
        report.skipped(),
        report.errored(),
        report.deferred()
    );
    for outcome in &report.outcomes {
        let detail = match &outcome.outcome {
            TickOutcome::Materialized { entry_id } => format!("materialized {entry_id}"),
            TickOutcome::Skipped(reason) => format!("skipped ({reason:?})"),
            TickOutcome::Errored(message) => format!("error: {message}"),
            TickOutcome::Deferred => "deferred".to_string(),
        };
        println!("  {}  {detail}", outcome.definition_id);
    }
}
