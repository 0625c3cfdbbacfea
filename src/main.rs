use std::{
    fs::File,
    io::{stderr, stdout, BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use upi_insights::{
    aggregate::{ScatterAxis, DEFAULT_TOP_N},
    export, FilterCriteria, ReportOptions, Session,
};

const DEFAULT_DATASET: &str = "filtered_upi_transactions.csv";

/// Filter a UPI transaction export and summarize what is left
#[derive(Debug, Parser)]
#[clap(version)]
struct Cli {
    /// Transactions file: delimited text, or a spreadsheet (.xlsx, .xls, .ods)
    #[clap(env = "UPI_INSIGHTS_INPUT", default_value = DEFAULT_DATASET)]
    input: PathBuf,

    /// Field delimiter of the input file
    #[clap(long, default_value = ",")]
    delimiter: char,

    /// Earliest transaction date to keep (YYYY-MM-DD)
    #[clap(long)]
    from: Option<NaiveDate>,

    /// Latest transaction date to keep (YYYY-MM-DD)
    #[clap(long)]
    to: Option<NaiveDate>,

    /// Keep only these cities (repeatable)
    #[clap(long = "city")]
    cities: Vec<String>,

    /// Keep only these payment methods (repeatable)
    #[clap(long = "method")]
    payment_methods: Vec<String>,

    /// Keep only these statuses (repeatable)
    #[clap(long = "status")]
    statuses: Vec<String>,

    #[clap(long)]
    min_amount: Option<Decimal>,

    #[clap(long)]
    max_amount: Option<Decimal>,

    /// Number of merchants in the top merchants view
    #[clap(long, default_value_t = DEFAULT_TOP_N)]
    top: usize,

    /// Add an amount scatter against `remaining-balance` or `customer-age`
    #[clap(long)]
    scatter_x: Option<ScatterAxis>,

    /// Fit a least squares trendline to the scatter
    #[clap(long)]
    trendline: bool,

    /// Write the filtered rows as CSV to this path
    #[clap(long)]
    export: Option<PathBuf>,

    /// Print the available filter values instead of a report
    #[clap(long)]
    options: bool,

    /// error, warn, info, debug or trace
    #[clap(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            date_from: self.from,
            date_to: self.to,
            cities: self.cities.iter().cloned().collect(),
            payment_methods: self.payment_methods.iter().cloned().collect(),
            statuses: self.statuses.iter().cloned().collect(),
            amount_min: self.min_amount,
            amount_max: self.max_amount,
        }
    }

    fn report_options(&self) -> ReportOptions {
        ReportOptions {
            top_n: self.top,
            scatter: self.scatter_x,
            trendline: self.trendline,
        }
    }

    fn delimiter(&self) -> Result<u8> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got `{}`", self.delimiter);
        }
        Ok(self.delimiter as u8)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(parse_log_level(&cli.log_level));

    let timer = Instant::now();
    let session = Session::load_from_path(&cli.input, cli.delimiter()?)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    info!("Loaded {} in {:?}", cli.input.display(), timer.elapsed());

    if cli.options {
        return write_json(&session.options());
    }

    let report = session.run(&cli.criteria(), &cli.report_options())?;

    if let Some(path) = &cli.export {
        let file = File::create(path)
            .with_context(|| format!("creating export file {}", path.display()))?;
        export::export(&report.rows, BufWriter::new(file))?;
        info!("Exported {} rows to {}", report.rows.len(), path.display());
    }

    write_json(&report)
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'warn'", level);
            LevelFilter::WARN
        }
    }
}

fn setup_logging(level: LevelFilter) {
    // stdout carries the report
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry().with(terminal_log).init();
}

fn write_json(value: &impl Serialize) -> Result<()> {
    let mut output = BufWriter::new(stdout().lock());
    serde_json::to_writer_pretty(&mut output, value)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
