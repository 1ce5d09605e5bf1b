use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use rusty_envelope::envelope::{self, persist, DatasetEntry};
use rusty_envelope::{Envelope, EnvelopeOptions, HullStrategy, LoadOptions};

#[derive(Parser)]
#[command(name = "rusty-envelope")]
#[command(about = "Convex hull envelopes of tabular point data, with provenance", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one envelope from data files (csv, json, parquet)
    Build(BuildArgs),
    /// Merge saved envelopes into the first one
    Merge(MergeArgs),
    /// Print a saved envelope's hull and provenance
    Show(ShowArgs),
}

#[derive(Args)]
struct EnvelopeFlags {
    /// JSON file with envelope options; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Never prune datasets that fall off the hull
    #[arg(long)]
    keep_all: bool,

    /// Fail when a merged envelope had already released a dataset
    #[arg(long)]
    strict_absorb: bool,

    /// Allow two datasets with the same name
    #[arg(long)]
    allow_overwrite: bool,

    /// Hull recomputation strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Incremental,
    FullRebuild,
}

impl From<StrategyArg> for HullStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Incremental => HullStrategy::Incremental,
            StrategyArg::FullRebuild => HullStrategy::FullRebuild,
        }
    }
}

impl EnvelopeFlags {
    fn options(&self) -> Result<EnvelopeOptions> {
        let mut options = match &self.config {
            Some(path) => EnvelopeOptions::from_json_file(path)
                .with_context(|| format!("reading options from {}", path.display()))?,
            None => EnvelopeOptions::default(),
        };
        options.keep_all |= self.keep_all;
        options.strict_absorb |= self.strict_absorb;
        options.allow_overwrite |= self.allow_overwrite;
        if let Some(strategy) = self.strategy {
            options.strategy = strategy.into();
        }
        Ok(options)
    }
}

#[derive(Args)]
struct BuildArgs {
    /// Column used as x
    #[arg(short = 'x', long)]
    xname: String,

    /// Column used as y
    #[arg(short = 'y', long)]
    yname: String,

    /// Input data files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Integer column to use as the row id
    #[arg(long)]
    index_column: Option<String>,

    /// Envelope name
    #[arg(long)]
    name: Option<String>,

    #[arg(long, default_value = "")]
    description: String,

    /// Worker threads for loading (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Where to save the envelope (JSON)
    #[arg(short, long)]
    output: PathBuf,

    /// Also write the closed hull outline as CSV
    #[arg(long)]
    perimeter: Option<PathBuf>,

    #[command(flatten)]
    flags: EnvelopeFlags,
}

#[derive(Args)]
struct MergeArgs {
    /// Saved envelopes; the first one is the merge target
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(short, long)]
    output: PathBuf,

    #[arg(long)]
    perimeter: Option<PathBuf>,

    /// Fail when an input had already released a dataset
    #[arg(long)]
    strict_absorb: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// Saved envelope
    input: PathBuf,

    /// Also print these columns at every hull vertex
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Build(args) => build(args),
        Commands::Merge(args) => merge(args),
        Commands::Show(args) => show(args),
    }
}

fn build(args: BuildArgs) -> Result<()> {
    let options = args.flags.options()?;
    let load = LoadOptions {
        name: None,
        description: String::new(),
        index_column: args.index_column,
    };

    let mut env = envelope::build_from_files(
        &args.xname,
        &args.yname,
        &args.files,
        &load,
        &options,
        args.threads,
    )
    .context("building envelope")?;
    if let Some(name) = args.name {
        env.set_name(name);
    }
    env.set_description(args.description);

    write_outputs(&env, &args.output, args.perimeter.as_deref())
}

fn merge(args: MergeArgs) -> Result<()> {
    let mut envelopes = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let env = persist::load(path).with_context(|| format!("loading {}", path.display()))?;
        envelopes.push(env);
    }

    if args.strict_absorb {
        if let Some(first) = envelopes.first_mut() {
            first.set_strict_absorb(true);
        }
    }

    let merged = envelope::merge_all(envelopes).context("merging envelopes")?;
    write_outputs(&merged, &args.output, args.perimeter.as_deref())
}

fn write_outputs(env: &Envelope, output: &Path, perimeter: Option<&Path>) -> Result<()> {
    persist::save(env, output).with_context(|| format!("writing {}", output.display()))?;
    if let Some(path) = perimeter {
        persist::write_perimeter_csv(env, path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    log::info!(
        "'{}': {} points, {} vertices, {} dataset(s) resident",
        env.name(),
        env.len(),
        env.engine().vertices().len(),
        env.registry().resident().count()
    );
    Ok(())
}

fn show(args: ShowArgs) -> Result<()> {
    let env = persist::load(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;

    println!("Envelope: {}", env.name());
    if !env.description().is_empty() {
        println!("\t{}", env.description());
    }
    println!("Axes: x = {}, y = {}", env.xname(), env.yname());
    println!();

    for (_, entry) in env.registry().entries() {
        let state = match entry {
            DatasetEntry::Resident(ds) => format!("resident, {} rows", ds.len()),
            DatasetEntry::Released(_) => "released".to_string(),
        };
        println!("{}\n\tState:\t{state}", entry.info());
    }
    println!();

    let columns: Vec<&str> = args.columns.iter().map(String::as_str).collect();
    let extra = if columns.is_empty() {
        None
    } else {
        Some(env.get_run_data(&columns, false)?)
    };

    for (i, (point, r)) in env
        .get_envelope_points(false)
        .into_iter()
        .zip(env.get_envelope_refs(false))
        .enumerate()
    {
        let dataset = r
            .dataset_id()
            .and_then(|id| env.registry().entry(id))
            .map(|e| e.info().name.clone())
            .unwrap_or_else(|| "<detached>".to_string());
        print!("{point}\t{dataset}\trow {}", r.row);
        if let Some(values) = extra.as_ref().and_then(|rows| rows.get(i)) {
            for (name, v) in columns.iter().zip(values) {
                print!("\t{name}={v}");
            }
        }
        println!();
    }
    Ok(())
}
