//! Command-line front end for the occurrence conversion pipeline.
//!
//! ```sh
//! occurrence-convert occurrences.csv occurrences_parquet --partition-rows 250000
//! occurrence-convert inspect occurrences.csv
//! ```
//!
//! Exit codes: 0 ok, 2 format detection failed, 3 ingest failed, 4 write failed.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use occurrence_parquet::config::{Compression, ConvertOptions};
use occurrence_parquet::error::{ConvertError, ConvertResult, RunStatus};
use occurrence_parquet::observability::TracingObserver;
use occurrence_parquet::pipeline::Pipeline;
use occurrence_parquet::processing::InspectReport;
use occurrence_parquet::report::{render_inspect, render_text, ConversionReport};

#[derive(Parser, Debug)]
#[command(
    name = "occurrence-convert",
    version,
    about = "Convert a delimited occurrence export into partitioned Parquet files",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    convert: ConvertArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report value kinds and missing counts per column without writing anything.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Delimited source file with a header row.
    #[arg(required = true)]
    input: Option<PathBuf>,

    /// Directory receiving part.N.parquet files. Created if missing.
    #[arg(required = true)]
    output_dir: Option<PathBuf>,

    /// Records per partition (and per output file).
    #[arg(long)]
    partition_rows: Option<usize>,

    /// Parquet compression: none, snappy, zstd or gzip.
    #[arg(long)]
    compression: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Delimited source file with a header row.
    input: PathBuf,

    /// Rows to sample.
    #[arg(long)]
    rows: Option<usize>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Field delimiter; skips sniffing. Use '\t' for tabs.
    #[arg(long)]
    delimiter: Option<String>,

    /// Leading lines sampled by the delimiter sniffer.
    #[arg(long)]
    sample_lines: Option<usize>,

    /// Worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// JSON options file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Some(Command::Inspect(args)) => run_inspect(args),
        None => run_convert(cli.convert),
    };
    process::exit(code);
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn base_options(common: &CommonArgs) -> ConvertResult<ConvertOptions> {
    let mut opts = match &common.config {
        Some(path) => ConvertOptions::from_json_path(path)?,
        None => ConvertOptions::default(),
    };
    if let Some(d) = &common.delimiter {
        opts.delimiter = Some(parse_delimiter(d)?);
    }
    if let Some(n) = common.sample_lines {
        opts.sample_lines = n;
    }
    if let Some(n) = common.threads {
        opts.execution.num_threads = Some(n);
        opts.execution.max_in_flight_partitions = n;
    }
    Ok(opts)
}

fn parse_delimiter(raw: &str) -> ConvertResult<char> {
    let unescaped = match raw {
        "\\t" | "tab" => "\t",
        other => other,
    };
    let mut chars = unescaped.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConvertError::Config {
            message: format!("delimiter must be a single character, got {raw:?}"),
        }),
    }
}

fn convert(args: &ConvertArgs) -> ConvertResult<ConversionReport> {
    let (Some(input), Some(output_dir)) = (args.input.as_ref(), args.output_dir.as_ref()) else {
        return Err(ConvertError::Config {
            message: "INPUT and OUTPUT_DIR are required".to_string(),
        });
    };
    let mut opts = base_options(&args.common)?;
    if let Some(n) = args.partition_rows {
        opts.partition_rows = n;
    }
    if let Some(c) = &args.compression {
        opts.compression = c.parse::<Compression>()?;
    }
    let pipeline = Pipeline::new(opts)?.with_observer(Arc::new(TracingObserver));
    pipeline.run(input, output_dir)
}

fn inspect(args: &InspectArgs) -> ConvertResult<InspectReport> {
    let mut opts = base_options(&args.common)?;
    if let Some(n) = args.rows {
        opts.inspect_rows = n;
    }
    Pipeline::new(opts)?.inspect(&args.input)
}

fn run_convert(args: ConvertArgs) -> i32 {
    init_tracing(&args.common.log_level);
    let json = args.common.json;

    match convert(&args) {
        Ok(report) => {
            if json {
                match report.to_json() {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: cannot serialize report: {e}"),
                }
            } else {
                print!("{}", render_text(&report));
            }
            report.status().exit_code()
        }
        Err(e) => fail(&e, json),
    }
}

fn run_inspect(args: InspectArgs) -> i32 {
    init_tracing(&args.common.log_level);
    let json = args.common.json;

    match inspect(&args) {
        Ok(report) => {
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: cannot serialize report: {e}"),
                }
            } else {
                print!("{}", render_inspect(&report));
            }
            RunStatus::Ok.exit_code()
        }
        Err(e) => fail(&e, json),
    }
}

fn fail(e: &ConvertError, json: bool) -> i32 {
    let status = e.status();
    if json {
        let body = serde_json::json!({ "status": status, "error": e.to_string() });
        println!("{body}");
    } else {
        eprintln!("error: {e}");
    }
    status.exit_code()
}
