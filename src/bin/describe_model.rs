use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use policy_groups::clustering::{
    ClusterAnalysis, ClusterAnalyzer, IndexTables, MatchOptions, TargetRecord, ZeroMeanPolicy,
    DEFAULT_STD_THRESHOLD, DEFAULT_ZSCORE_THRESHOLD,
};
use policy_groups::dataset::{Dataset, Table as DataTable};
use policy_groups::logging::configure_logging;
use policy_groups::store;
use prettytable::{Cell, Row, Table};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(name = "describe-model", about = "Inspect the policy groups of a fitted Mapper model")]
struct Cli {
    /// Model record (JSON)
    #[clap(long)]
    model: PathBuf,

    /// Raw data set (CSV)
    #[clap(long)]
    raw: PathBuf,

    /// Cleaned data set the model was fitted on (CSV)
    #[clap(long)]
    clean: PathBuf,

    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group sizes and label densities
    Groups,

    /// Columns that identify each group
    Identifiers {
        #[clap(long, default_value_t = DEFAULT_ZSCORE_THRESHOLD)]
        z_threshold: f64,

        #[clap(long, default_value_t = DEFAULT_STD_THRESHOLD)]
        std_threshold: f64,
    },

    /// Items in more than one node or group; works on inconsistent records
    Overlaps,

    /// Match a one-row target record to the closest group
    Match {
        /// Target record (CSV with a header and one row)
        #[clap(long)]
        target: PathBuf,

        /// Include unclustered items as a candidate group
        #[clap(long)]
        keep_unclustered: bool,

        /// Comma-separated columns to score on
        #[clap(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Fail instead of penalizing columns whose group mean is zero
        #[clap(long)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    configure_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let record = store::load_record(&cli.model)
        .with_context(|| format!("Failed to load {}", cli.model.display()))?;

    // Conflicting records fail analysis, so overlaps are read from the index alone.
    if let Commands::Overlaps = cli.command {
        let (components, tables) = ClusterAnalyzer::index(&record)
            .with_context(|| format!("Failed to index {}", record.id()))?;
        println!("{}: {} policy groups", record.id(), components.len());
        print_overlaps(&tables);
        return Ok(());
    }

    let dataset = Dataset::from_csv_paths(&cli.raw, &cli.clean).context("Failed to load data set")?;
    let analysis = ClusterAnalyzer::analyze(&record, &dataset)
        .with_context(|| format!("Failed to analyse {}", record.id()))?;

    println!(
        "{}: {} policy groups, coverage {:.3}",
        analysis.model_id,
        analysis.components().len(),
        analysis.coverage()
    );

    match cli.command {
        Commands::Groups => print_groups(&analysis),
        Commands::Identifiers {
            z_threshold,
            std_threshold,
        } => print_identifiers(&analysis, z_threshold, std_threshold),
        Commands::Overlaps => print_overlaps(analysis.tables()),
        Commands::Match {
            target,
            keep_unclustered,
            columns,
            strict,
        } => {
            let table = DataTable::from_csv_path(&target)
                .with_context(|| format!("Failed to read {}", target.display()))?;
            let options = MatchOptions {
                remove_unclustered: !keep_unclustered,
                column_filter: columns,
                zero_mean: if strict {
                    ZeroMeanPolicy::Fail
                } else {
                    ZeroMeanPolicy::Penalize
                },
            };
            print_match(&analysis, &TargetRecord::from_table(&table)?, &options)?;
        }
    }

    Ok(())
}

fn print_groups(analysis: &ClusterAnalysis) {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Group"),
        Cell::new("Size"),
        Cell::new("Nodes"),
        Cell::new("Description"),
    ]));

    for (group, size) in analysis.group_sizes() {
        let nodes = analysis
            .tables()
            .nodes_of_group(*group)
            .map(|nodes| nodes.len())
            .unwrap_or(0);
        let description = analysis
            .group_descriptions()
            .get(group)
            .map(|d| {
                d.density
                    .iter()
                    .map(|(label, density)| format!("{}: {:.2}", label, density))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        table.add_row(Row::new(vec![
            Cell::new(&group.to_string()),
            Cell::new(&size.to_string()),
            Cell::new(&nodes.to_string()),
            Cell::new(&description),
        ]));
    }

    table.printstd();
}

fn print_identifiers(analysis: &ClusterAnalysis, z_threshold: f64, std_threshold: f64) {
    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Group"), Cell::new("Identifiers")]));

    for (group, columns) in analysis.group_identifiers(z_threshold, std_threshold) {
        table.add_row(Row::new(vec![
            Cell::new(&group.to_string()),
            Cell::new(&columns.join(", ")),
        ]));
    }

    table.printstd();
    if !analysis.zscores().dropped.is_empty() {
        println!(
            "Constant columns left out: {}",
            analysis.zscores().dropped.join(", ")
        );
    }
}

fn print_overlaps(tables: &IndexTables) {
    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Item"), Cell::new("Nodes")]));
    for (item, nodes) in tables.items_in_multiple_nodes() {
        table.add_row(Row::new(vec![
            Cell::new(&item.to_string()),
            Cell::new(&nodes.join(", ")),
        ]));
    }
    table.printstd();

    let conflicts = tables.items_in_multiple_groups();
    if conflicts.is_empty() {
        println!("No item belongs to more than one group");
    } else {
        for (item, groups) in conflicts {
            println!("Item {} is in groups {:?}", item, groups);
        }
    }
}

fn print_match(
    analysis: &ClusterAnalysis,
    target: &TargetRecord,
    options: &MatchOptions,
) -> Result<()> {
    let report = analysis.target_matching(target, options)?;

    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Group"), Cell::new("Score")]));
    for (group, score) in &report.scores {
        table.add_row(Row::new(vec![
            Cell::new(&group.to_string()),
            Cell::new(&format!("{:.4}", score)),
        ]));
    }
    table.printstd();

    println!(
        "Closest group: {} (scored on {})",
        report.best,
        report.columns.join(", ")
    );
    for (group, column) in &report.skipped {
        println!("Group {} has zero mean on '{}': scored as infinite", group, column);
    }

    Ok(())
}
