use anyhow::{bail, Context, Result};
use clap::Parser;
use policy_groups::environment::{self, Params};
use policy_groups::logging::configure_logging;
use policy_groups::selection::{self, BatchConfig, Linkage, SelectionArtifact};
use policy_groups::store::RunLayout;
use prettytable::{Cell, Row, Table};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Parser)]
#[clap(
    name = "select-models",
    about = "Select models from structural equivalence classes of Mapper graphs based on best coverage"
)]
struct Cli {
    /// Metric that defines the precomputed model distances (defaults to dendrogram_metric)
    #[clap(short, long)]
    metric: Option<String>,

    /// Folder of models to compare, identified by the number of policy groups
    #[clap(short = 'n', long, default_value = "2")]
    num_groups: usize,

    /// Print the distribution of models over policy-group counts instead of selecting
    #[clap(short = 'H', long)]
    histogram: bool,

    /// Minimum model coverage counted in the histogram (defaults to histogram_coverage)
    #[clap(long)]
    coverage_filter: Option<f64>,

    /// Linkage method: single, complete or average (defaults to dendrogram_linkage)
    #[clap(long)]
    linkage: Option<String>,

    /// Distance threshold for the dendrogram cut (defaults to dendrogram_cut)
    #[clap(long)]
    threshold: Option<f64>,

    /// Print details of the computation and output
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    configure_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let root = environment::project_root();
    let params_path = environment::params_path(&root);
    if !params_path.is_file() {
        bail!("Parameter file not found: {}", params_path.display());
    }
    let params = Params::from_path(&params_path)
        .with_context(|| format!("Failed to read {}", params_path.display()))?;

    let layout = RunLayout::new(&root, &params.run_name);

    if cli.histogram {
        let models_root = layout.models_root();
        if !models_root.is_dir() {
            bail!("Models directory not found: {}", models_root.display());
        }
        let coverage_filter = cli.coverage_filter.unwrap_or(params.histogram_coverage);
        let histogram = selection::coverage_histogram(&models_root, coverage_filter)
            .await
            .context("Failed to build model histogram")?;
        print_histogram(&histogram, coverage_filter);
        return Ok(());
    }

    let models_dir = layout.models_dir(cli.num_groups);
    if !models_dir.is_dir() {
        bail!("Models directory not found: {}", models_dir.display());
    }

    let linkage = match &cli.linkage {
        Some(name) => name.parse::<Linkage>()?,
        None => params.dendrogram_linkage,
    };
    let config = BatchConfig {
        metric: cli.metric.unwrap_or(params.dendrogram_metric),
        n_groups: cli.num_groups,
        linkage,
        threshold: cli.threshold.or(params.dendrogram_cut),
    };

    info!(
        target: policy_groups::TARGET_SELECTION,
        "Selecting {}-group models by {} distance",
        config.n_groups,
        config.metric
    );

    let (path, artifact) = selection::select_and_persist(&layout, &config)
        .await
        .with_context(|| format!("Model selection failed for metric '{}'", config.metric))?;

    if cli.verbose {
        print_selection(&artifact);
    }
    println!(
        "Wrote {} representatives to {}",
        artifact.representatives.len(),
        path.display()
    );
    if !artifact.failures.is_empty() {
        println!("{} models were skipped", artifact.failures.len());
    }

    Ok(())
}

fn print_histogram(histogram: &BTreeMap<usize, usize>, coverage_filter: f64) {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Policy groups"),
        Cell::new(&format!("Models (coverage >= {})", coverage_filter)),
    ]));
    for (n, count) in histogram {
        table.add_row(Row::new(vec![
            Cell::new(&n.to_string()),
            Cell::new(&count.to_string()),
        ]));
    }
    table.printstd();
}

fn print_selection(artifact: &SelectionArtifact) {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Class"),
        Cell::new("Model"),
        Cell::new("Coverage"),
        Cell::new("Class size"),
    ]));
    for (class, selected) in &artifact.representatives {
        table.add_row(Row::new(vec![
            Cell::new(&class.to_string()),
            Cell::new(&selected.model_id),
            Cell::new(&format!("{:.3}", selected.coverage)),
            Cell::new(&selected.class_size.to_string()),
        ]));
    }
    table.printstd();

    for failure in &artifact.failures {
        println!("Skipped {}: {}", failure.model_id, failure.reason);
    }
}
