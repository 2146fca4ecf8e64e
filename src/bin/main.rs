//! bimigrate CLI - Migrate Tableau workbooks to Power BI
//!
//! Usage:
//!   bimigrate migrate <file.twb> [--out <report.json>] [--no-translate]
//!   bimigrate resolve <file.twb> <calc-id>
//!   bimigrate tables <file.twb>
//!   bimigrate validate <file.twb>
//!
//! Examples:
//!   bimigrate migrate sales.twb --out report.json
//!   bimigrate resolve sales.twb Calculation_1029
//!   RUST_LOG=bimigrate=debug bimigrate migrate sales.twb --no-translate

use bimigrate::calc::resolve;
use bimigrate::config::Settings;
use bimigrate::connection::{classify, RelationDescriptor};
use bimigrate::fallback::FallbackSelector;
use bimigrate::migrate::Migrator;
use bimigrate::translate::{HttpTransport, TranslationClient};
use bimigrate::twb::Workbook;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bimigrate")]
#[command(about = "Migrate Tableau calculated fields and datasources to Power BI")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $BIMIGRATE_CONFIG, ./bimigrate.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a workbook and write a JSON report
    Migrate {
        /// Path to the .twb file
        file: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip the translation service; use fallback templates only
        #[arg(long)]
        no_translate: bool,
    },

    /// Print the dependency chain of one calculation
    Resolve {
        /// Path to the .twb file
        file: PathBuf,

        /// Calculation id, e.g. Calculation_1029
        calc_id: String,
    },

    /// Print the classified connection of each datasource
    Tables {
        /// Path to the .twb file
        file: PathBuf,
    },

    /// Report cycles and unknown references between calculations
    Validate {
        /// Path to the .twb file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match cli.command {
        Commands::Migrate {
            file,
            out,
            no_translate,
        } => cmd_migrate(settings, file, out, no_translate).await,
        Commands::Resolve { file, calc_id } => cmd_resolve(file, &calc_id),
        Commands::Tables { file } => cmd_tables(&settings, file),
        Commands::Validate { file } => cmd_validate(file),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "bimigrate=debug" } else { "bimigrate=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings, ExitCode> {
    let result = match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    result.map_err(|e| {
        eprintln!("Configuration error: {}", e);
        ExitCode::FAILURE
    })
}

fn load_workbook(file: &Path) -> Result<Workbook, ExitCode> {
    Workbook::from_file(file).map_err(|e| {
        eprintln!("Error reading workbook '{}': {}", file.display(), e);
        ExitCode::FAILURE
    })
}

async fn cmd_migrate(
    mut settings: Settings,
    file: PathBuf,
    out: Option<PathBuf>,
    no_translate: bool,
) -> ExitCode {
    let workbook = match load_workbook(&file) {
        Ok(wb) => wb,
        Err(code) => return code,
    };

    if no_translate {
        settings.translation.enabled = false;
    }

    let translator: Option<TranslationClient<HttpTransport>> = if settings.translation.enabled {
        match TranslationClient::from_settings(&settings.translation).await {
            Ok(client) => Some(client),
            Err(e) => {
                eprintln!("Translation client error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let mut migrator = Migrator::new(&settings, translator);
    let report = migrator.run(&workbook).await;

    let json = match report.to_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize report: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match out {
        Some(path) => {
            if let Err(e) = fs::write(&path, json) {
                eprintln!("Error writing report '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
            eprintln!(
                "Wrote {} calculations, {} tables ({} warnings) to {}",
                report.calculations.len(),
                report.tables.len(),
                report.warnings.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    ExitCode::SUCCESS
}

fn cmd_resolve(file: PathBuf, calc_id: &str) -> ExitCode {
    let workbook = match load_workbook(&file) {
        Ok(wb) => wb,
        Err(code) => return code,
    };
    let mut graph = workbook.calculation_graph();

    let resolution = match resolve(&mut graph, calc_id) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Resolution error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for (i, node) in resolution.order.iter().enumerate() {
        println!("{:>3}. {} ({})", i + 1, node.source_id, node.caption);
        println!("       {}", node.formula);
    }
    if !resolution.unresolved.is_empty() {
        println!();
        println!("Unresolved references:");
        for id in &resolution.unresolved {
            println!("  - {}", id);
        }
    }

    ExitCode::SUCCESS
}

fn cmd_tables(settings: &Settings, file: PathBuf) -> ExitCode {
    let workbook = match load_workbook(&file) {
        Ok(wb) => wb,
        Err(code) => return code,
    };
    let selector = FallbackSelector::new(settings.fallback.rules());

    if workbook.datasources.is_empty() {
        println!("No datasources found.");
        return ExitCode::SUCCESS;
    }

    for source in &workbook.datasources {
        let info = classify(&source.connection, source.relation.as_ref());
        println!("{}:", source.table_name());
        println!("  class:    {}", info.class_type);
        for (label, value) in [
            ("server", &info.server),
            ("database", &info.database),
            ("schema", &info.schema),
            ("table", &info.table),
            ("file", &info.file_path),
        ] {
            if let Some(value) = value {
                println!("  {:<9} {}", format!("{}:", label), value);
            }
        }
        if let Some(RelationDescriptor::Query(_)) = &source.relation {
            println!("  query:    {}", info.raw_query.as_deref().unwrap_or_default());
        }
        match selector.matching_rule(&info) {
            Some(rule) => println!("  fallback: {}", rule.kind),
            None => println!("  fallback: (none)"),
        }
        println!();
    }

    ExitCode::SUCCESS
}

fn cmd_validate(file: PathBuf) -> ExitCode {
    let workbook = match load_workbook(&file) {
        Ok(wb) => wb,
        Err(code) => return code,
    };
    let graph = workbook.calculation_graph();

    let cycles = graph.detect_cycles();
    let dangling = graph.dangling_references();

    if !cycles.is_empty() {
        eprintln!("Cyclic calculations:");
        for cycle in &cycles {
            eprintln!("  {}", cycle.join(" -> "));
        }
    }

    if !dangling.is_empty() {
        eprintln!("Unknown references:");
        for (from, missing) in &dangling {
            eprintln!("  {} -> {}", from, missing);
        }
    }

    if !cycles.is_empty() {
        return ExitCode::FAILURE;
    }

    println!(
        "OK: {} ({} calculations, {} datasources)",
        file.display(),
        graph.len(),
        workbook.datasources.len()
    );
    ExitCode::SUCCESS
}
