use clap::{Parser, Subcommand};
use puis::commands;

/// Package Upstream Information Service: detects and polls upstream
/// releases for distribution packages (spec §6).
#[derive(Parser)]
#[command(name = "puis")]
#[command(about = "Track the latest upstream releases of distribution packages", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detection + poll cycle over an abbs catalog, then sync Anitya.
    Poll {
        /// Path to the read-only abbs package database.
        abbs_db: String,
        /// Path to the PUIS event store (created if missing).
        piss_db: String,
        /// Bounded worker pool size; defaults to cpu_count/4 (min 1).
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Emit a chores.yaml from the abbs catalog, merging an existing config.
    Generate {
        /// Path to the read-only abbs package database.
        abbs_db: String,
        /// Existing chores.yaml to merge hand-edited entries from.
        #[arg(short = 'c', long = "config")]
        existing_config: Option<String>,
        /// Output path; defaults to stdout.
        output: Option<String>,
    },
    /// Run the chore-mode event-emitting poll loop.
    Run {
        /// Chore config path.
        #[arg(short = 'c', long = "chores", default_value = "chores.yaml")]
        chores: String,
        /// Event store database path.
        #[arg(short = 'd', long = "db", default_value = "piss.db")]
        db: String,
        /// Re-arm each chore this many minutes after it runs; omit to drain once.
        #[arg(short = 'k', long = "keep-interval")]
        keep_interval: Option<u64>,
    },
    /// Render recent events as Atom, text, terminal, or a Jinja2 template.
    Check {
        /// Event store database path.
        #[arg(short = 'd', long = "db", default_value = "piss.db")]
        db: String,
        /// Output format: term, text, atom, or jinja2.
        #[arg(short = 'f', long = "format", default_value = "term")]
        format: String,
        /// Number of most recent events to render.
        #[arg(short = 'n', long = "limit", default_value_t = 20)]
        limit: i64,
        /// Template path, required for -f jinja2.
        #[arg(short = 'T', long = "template")]
        template: Option<String>,
        /// Output path; defaults to stdout ("-" also means stdout).
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Poll { abbs_db, piss_db, concurrency } => {
            commands::poll::poll(abbs_db, piss_db, concurrency).await
        },
        Commands::Generate { abbs_db, existing_config, output } => {
            commands::generate::generate(abbs_db, existing_config, output).await
        },
        Commands::Run { chores, db, keep_interval } => {
            commands::run::run(chores, db, keep_interval).await
        },
        Commands::Check { db, format, limit, template, output } => {
            let format = format.parse().unwrap_or_else(|e| {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            });
            commands::check::check(db, format, limit, template, output).await
        },
    };

    // Spec §6: exit code 0 on completion, including an interrupt during the
    // chore loop (which `run_chore_loop` already absorbs and returns Ok for);
    // non-zero only on argument errors or an unrecovered I/O failure.
    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}
