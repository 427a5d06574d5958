mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ghgcalc",
    version,
    about = "Greenhouse gas emission accounting: factor matching, calculation and formula-linked reports"
)]
struct Cli {
    /// Log pipeline details to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match an activity table (xlsx or JSON) against the factor library
    Match {
        /// Path to an xlsx upload or a JSON array of activity records
        input_file: PathBuf,

        /// Extra factor file(s), merged over the built-in factors in order
        #[arg(short, long = "factors", value_name = "FILE")]
        factors: Vec<PathBuf>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Save the matched rows as a snapshot for later steps
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Set one row's factor by hand and reconcile against the snapshot
    Edit {
        /// Snapshot written by `ghgcalc match`
        snapshot: PathBuf,

        /// Zero-based row index
        #[arg(long)]
        row: usize,

        /// New factor value
        #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
        factor: String,

        /// Where to write the updated snapshot (default: overwrite the input)
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Reconcile an edited snapshot against its baseline
    Reconcile {
        /// Snapshot the edits started from
        baseline: PathBuf,

        /// Snapshot with user-edited factors
        edited: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Save the reconciled rows as a snapshot
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Calculate emissions and print the aggregate report
    Report {
        /// Snapshot of matched or reconciled rows
        snapshot: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Show the per-row calculation trace
        #[arg(long)]
        trace: bool,
    },
    /// Export a formula-linked xlsx report
    Export {
        /// Snapshot of matched or reconciled rows
        snapshot: PathBuf,

        /// Destination workbook
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: PathBuf,
    },
    /// Inspect and maintain emission factors
    Factors {
        #[command(subcommand)]
        action: FactorsAction,
    },
}

#[derive(Subcommand)]
enum FactorsAction {
    /// List the factor library
    List {
        /// Extra factor file(s), merged over the built-in factors in order
        #[arg(short, long = "factors", value_name = "FILE")]
        factors: Vec<PathBuf>,
    },
    /// Show one factor by key
    Show {
        /// Factor key, e.g. "Stationary combustion-natural gas"
        key: String,

        #[arg(short, long = "factors", value_name = "FILE")]
        factors: Vec<PathBuf>,
    },
    /// Validate a factor file
    Validate {
        /// Path to JSON factor file
        file: PathBuf,
    },
    /// Add or replace a factor in a factor file (created if missing)
    Add {
        /// Path to JSON factor file
        file: PathBuf,

        #[arg(long)]
        key: String,

        #[arg(long, value_name = "VALUE")]
        factor: String,

        #[arg(long)]
        unit: String,

        /// Greenhouse gas: CO2, CH4, N2O, HFCs, PFCs, SF6 or NF3
        #[arg(long, default_value = "CO2")]
        ghg: String,

        #[arg(long)]
        note: Option<String>,
    },
    /// Print the factor file schema with an example
    Schema,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Match {
            input_file,
            factors,
            output,
            out,
        } => commands::matching::run(input_file, factors, &output, out),
        Commands::Edit {
            snapshot,
            row,
            factor,
            out,
        } => commands::edit::run(snapshot, row, &factor, out),
        Commands::Reconcile {
            baseline,
            edited,
            output,
            out,
        } => commands::reconcile::run(baseline, edited, &output, out),
        Commands::Report {
            snapshot,
            output,
            trace,
        } => commands::report::run(snapshot, &output, trace),
        Commands::Export { snapshot, out } => commands::export::run(snapshot, out),
        Commands::Factors { action } => match action {
            FactorsAction::List { factors } => commands::factors::list(&factors),
            FactorsAction::Show { key, factors } => commands::factors::show(&key, &factors),
            FactorsAction::Validate { file } => commands::factors::validate(&file),
            FactorsAction::Add {
                file,
                key,
                factor,
                unit,
                ghg,
                note,
            } => commands::factors::add(&file, key, &factor, unit, &ghg, note),
            FactorsAction::Schema => commands::factors::schema(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
