mod aggregator;
mod cli;
mod db;
mod error;
mod fmt;
mod installments;
mod ledger;
mod mapper;
mod models;
mod schedule;
mod scheduler;
mod settings;
mod sync;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{AccountsCommands, BillsCommands, Cli, Commands, InstallmentsCommands};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PENNY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("penny=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                account_type,
                institution,
                balance,
                credit_limit,
            } => cli::accounts::add(&name, account_type, institution.as_deref(), balance, credit_limit),
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Sync { item, snapshot, silent } => cli::sync::run(item, snapshot, silent),
        Commands::Bills { command } => match command {
            BillsCommands::Add {
                title,
                amount,
                frequency,
                start,
                account,
                method,
                category,
            } => cli::bills::add(&title, amount, frequency, start, account.as_deref(), method, category),
            BillsCommands::List => cli::bills::list(),
            BillsCommands::Pay {
                id,
                account,
                method,
                date,
            } => cli::bills::pay(id, account.as_deref(), method, date),
            BillsCommands::Process { id } => cli::bills::process(id),
        },
        Commands::Installments { command } => match command {
            InstallmentsCommands::Create {
                title,
                card,
                total,
                count,
                start,
            } => cli::installments::create(&title, &card, total, count, start),
            InstallmentsCommands::List { card } => cli::installments::list(card.as_deref()),
            InstallmentsCommands::Pay { id, date } => cli::installments::pay(id, date),
            InstallmentsCommands::PayBill { bill, date } => cli::installments::pay_bill(bill, date),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
