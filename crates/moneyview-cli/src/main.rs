//! moneyview - browse cached categories, currencies and accounts from the terminal.
//!
//! Loads every list of a view session from a directory of JSON snapshots (or
//! from the bundled sample rows with `--demo`) and prints the category tree,
//! its groups and a short summary of the other lists.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use moneyview_core::group::{AccountGroupChoice, CurrencyGroupChoice};
use moneyview_core::utils::indent;
use moneyview_core::{
    CategoryGroupChoice, Config, GroupIndex, Repositories, Search, SearchArea, SnapshotStore,
    TreeFold, ViewSession,
};

/// Environment variable overriding the snapshot directory
const DATA_DIR_ENV: &str = "MONEYVIEW_DATA_DIR";

/// Log file name prefix inside the log directory
const LOG_FILE: &str = "moneyview.log";

const USAGE: &str = "\
Usage: moneyview [OPTIONS]

Options:
  --data DIR         Snapshot directory (default: platform data dir)
  --seed             Write the sample snapshot set before loading
  --demo             Use in-memory sample rows instead of snapshots
  --search KEY       Only show categories matching KEY
  --in-path          Also match KEY against category paths
  --group all|active Category grouping
  --delimiter D      Category path delimiter
  --save             Store --data, --group and --delimiter in the config file
  -h, --help         Show this help";

#[derive(Debug, Default, PartialEq)]
struct Args {
    data_dir: Option<PathBuf>,
    seed: bool,
    demo: bool,
    search: Option<String>,
    in_path: bool,
    group: Option<CategoryGroupChoice>,
    delimiter: Option<String>,
    save: bool,
}

/// Parse command line arguments. Returns `None` when help was requested.
fn parse_args(args: &[String]) -> Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .cloned()
                .with_context(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--data" => parsed.data_dir = Some(PathBuf::from(value("--data")?)),
            "--seed" => parsed.seed = true,
            "--demo" => parsed.demo = true,
            "--search" => parsed.search = Some(value("--search")?),
            "--in-path" => parsed.in_path = true,
            "--group" => {
                let choice = value("--group")?;
                parsed.group = Some(choice.parse().map_err(anyhow::Error::msg)?);
            }
            "--delimiter" => parsed.delimiter = Some(value("--delimiter")?),
            "--save" => parsed.save = true,
            "-h" | "--help" => return Ok(None),
            other => bail!("Unknown argument: {}\n\n{}", other, USAGE),
        }
    }
    Ok(Some(parsed))
}

/// Initialize the tracing subscriber for logging
fn init_tracing(config: &Config) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    if !config.log_to_file {
        tracing_subscriber::registry().with(stderr).with(filter).init();
        return Ok(None);
    }

    let log_dir = config.log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE));
    tracing_subscriber::registry()
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&raw)? else {
        println!("{}", USAGE);
        return Ok(());
    };

    let mut config = Config::load()?;
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        config.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(ref dir) = args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(choice) = args.group {
        config.category_group = choice;
    }
    if let Some(ref delimiter) = args.delimiter {
        config.path_delimiter = delimiter.clone();
    }
    if args.save {
        config.save().context("Failed to save config")?;
    }

    let _log_guard = init_tracing(&config)?;
    info!("moneyview starting");

    let store = if args.demo {
        None
    } else {
        let dir = config.data_dir()?;
        let store = SnapshotStore::new(dir.clone())?;
        if args.seed {
            store.seed()?;
            eprintln!("Seeded sample data into {}", dir.display());
        }
        Some(store)
    };
    let repos = match store {
        Some(ref store) => Repositories::from_store(store),
        None => Repositories::sample(),
    };

    let session = ViewSession::new(repos).with_path_delimiter(config.path_delimiter.clone());
    if !session.load_all().await {
        warn!("Some lists failed to load");
        report_failures(&session);
    }

    let mut search = Search::new(args.search.unwrap_or_default());
    search.select(SearchArea::Path, args.in_path);

    print_categories(&session, &search, config.category_group);
    print_summary(&session);

    if let Some(store) = store {
        println!();
        println!("Last updated: {}", store.ages().last_updated());
    }

    Ok(())
}

fn report_failures(session: &ViewSession) {
    let slots = session.slots();
    let failures = [
        ("Categories", slots.categories.data.last_error()),
        ("Currencies", slots.currencies.data.last_error()),
        ("Accounts", slots.accounts.data.last_error()),
    ];
    for (list, error) in failures {
        if let Some(error) = error {
            eprintln!("{}: {}", list, error);
        }
    }
}

fn print_categories(session: &ViewSession, search: &Search, choice: CategoryGroupChoice) {
    let list = &session.slots().categories;
    let (Some(tree), Some(paths)) = (list.tree.ready_value(), list.path.ready_value()) else {
        println!("Categories: not loaded");
        return;
    };
    let rows = list.data.current_value();

    println!("Categories ({})", tree.len());
    if !search.is_empty() {
        println!("{}: {}", search.prompt(), search.key);
    }

    let fold = TreeFold::new(&tree, true);
    let visible = if search.is_empty() {
        fold.visible(&tree)
    } else {
        let matches = session.matching_categories(search);
        fold.visible_matching(&tree, |i| matches.contains(&tree.nodes()[i].id))
    };
    for i in visible {
        let node = &tree.nodes()[i];
        let Some(row) = rows.get(&node.id) else {
            continue;
        };
        let marker = if row.active { "" } else { " (inactive)" };
        println!(
            "  {}{}{}  [{}]",
            indent(node.depth),
            row.name,
            marker,
            paths.get(node.id).unwrap_or_default()
        );
    }

    if let Some(mut group) = session.category_group(choice) {
        session.search_categories(search, &mut group);
        println!();
        println!("Grouped by {}:", choice);
        print_groups(&group);
    }
}

fn print_groups(group: &GroupIndex) {
    for data in group.groups().iter().filter(|g| g.is_visible) {
        println!("  {:<10} {}", data.name.as_deref().unwrap_or("All"), data.ids.len());
    }
}

fn print_summary(session: &ViewSession) {
    let slots = session.slots();
    println!();

    match session.currency_group(CurrencyGroupChoice::Used) {
        Some(group) => {
            println!("Currencies ({})", slots.currencies.count.current_value());
            print_groups(&group);
        }
        None => println!("Currencies: not loaded"),
    }

    match session.account_group(AccountGroupChoice::Status) {
        Some(group) => {
            println!("Accounts ({})", slots.accounts.count.current_value());
            print_groups(&group);
        }
        None => println!("Accounts: not loaded"),
    }
}
