// Version information constants
const VERSION: &str = env!("CARGO_PKG_VERSION");

use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use tonicity_heatmap::config::HeatmapConfig;
use tonicity_heatmap::cooccurrence::{
    write_matrix_csv, CoOccurrenceMatrix, DiagonalPolicy, HeatmapBuilder, PositionSet,
    PositionSummary, ValueCheck,
};
use tonicity_heatmap::error::AppError;
use tonicity_heatmap::table::ObservationTable;
use tonicity_heatmap::{corpus, plot};

/// Timestamped log file writer
pub struct Logger {
    writer: BufWriter<File>,
}

impl Logger {
    pub fn new(file: File) -> Self {
        Self {
            writer: BufWriter::new(file),
        }
    }

    /// Record detailed log information
    pub fn log(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.writer, "[{}] {}", timestamp, message)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Record log and print to the console simultaneously
    pub fn log_and_print(&mut self, message: &str) -> std::io::Result<()> {
        self.log(message)?;
        println!("{}", message);
        Ok(())
    }

    /// Record command header: version, runtime, and parameters
    pub fn log_header(&mut self, command: &str, params: &[(&str, String)]) -> std::io::Result<()> {
        self.log(&format!("=== Tonicity Heatmap {} Log ===", command))?;
        self.log(&format!("Software Version: v{}", VERSION))?;
        self.log(&format!(
            "Runtime: {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        ))?;
        for (name, value) in params {
            self.log(&format!("{}: {}", name, value))?;
        }
        Ok(())
    }
}

fn open_logger(log: &Option<String>, default_path: &str) -> Result<Logger, Box<dyn Error>> {
    let log_file = if let Some(log_path) = log {
        File::create(log_path)?
    } else {
        File::create(default_path)?
    };
    Ok(Logger::new(log_file))
}

fn format_time_used(elapsed: std::time::Duration) -> String {
    let total_secs = elapsed.as_secs_f64();
    let minutes = (total_secs / 60.0) as u64;
    if minutes > 0 {
        format!("[Time used] {:02} m {:05.3} s", minutes, total_secs % 60.0)
    } else {
        format!("[Time used] {:05.3} s", total_secs)
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the co-occurrence heatmap of a stress-indicator CSV
    Render(RenderArgs),
    /// Render the heatmap of a synthesized example corpus
    Demo(DemoArgs),
    /// Compute the co-occurrence matrix and export it as CSV
    Matrix(MatrixArgs),
}

/// Options shared by every command that computes a matrix
#[derive(Args, Debug, Clone)]
struct ComputeArgs {
    /// Comma-separated position labels (exactly 10)
    #[arg(long = "positions", default_value = "1,2,3,4,5,6,7,8,9,10")]
    pub positions: String,
    /// Leave the diagonal undefined for positions without observations
    #[arg(long = "empirical-diagonal", default_value_t = false)]
    pub empirical_diagonal: bool,
    /// Reject indicator values other than 0, 1 or missing
    #[arg(long = "strict-binary", default_value_t = false)]
    pub strict_binary: bool,
}

impl ComputeArgs {
    fn builder(&self) -> HeatmapBuilder {
        let diagonal = if self.empirical_diagonal {
            DiagonalPolicy::Empirical
        } else {
            DiagonalPolicy::ForceHundred
        };
        let value_check = if self.strict_binary {
            ValueCheck::StrictBinary
        } else {
            ValueCheck::Lenient
        };
        HeatmapBuilder::new()
            .with_diagonal(diagonal)
            .with_value_check(value_check)
    }
}

/// Rendering options layered over the config file
#[derive(Args, Debug, Clone)]
struct StyleArgs {
    /// TOML configuration file (optional)
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,
    /// Output resolution in dots per inch
    #[arg(long = "dpi")]
    pub dpi: Option<u32>,
    /// Color scale: viridis or heat
    #[arg(long = "scale")]
    pub scale: Option<String>,
    /// Title drawn above the grid
    #[arg(long = "title")]
    pub title: Option<String>,
}

impl StyleArgs {
    fn load_config(&self) -> Result<HeatmapConfig, AppError> {
        let mut cfg = HeatmapConfig::load(self.config.as_deref().map(Path::new))?;
        if let Some(dpi) = self.dpi {
            cfg.dpi = dpi;
        }
        if let Some(scale) = &self.scale {
            cfg.color_scale = scale.clone();
        }
        if let Some(title) = &self.title {
            cfg.title = Some(title.clone());
        }
        cfg.validate()?;
        plot::ColorScale::from_name(&cfg.color_scale)?;
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Input CSV with one indicator column per position
    #[arg(short = 'i', long = "input")]
    pub input: String,
    /// Output image path (.png or .svg); defaults to the configured path
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,
    /// Field delimiter of the input file
    #[arg(short = 'd', long = "delimiter", default_value = ",")]
    pub delimiter: String,
    /// Also write the matrix and summaries as CSV
    #[arg(long = "matrix-csv")]
    pub matrix_csv: Option<String>,
    #[command(flatten)]
    pub compute: ComputeArgs,
    #[command(flatten)]
    pub style: StyleArgs,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Output image path (.png or .svg); defaults to the configured path
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,
    /// Use a seeded random corpus instead of the fixed example
    #[arg(long = "random", default_value_t = false)]
    pub random: bool,
    /// Number of lines of the random corpus
    #[arg(long = "rows", default_value_t = 200)]
    pub rows: usize,
    /// Seed of the random corpus
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
    /// Also write the matrix and summaries as CSV
    #[arg(long = "matrix-csv")]
    pub matrix_csv: Option<String>,
    #[command(flatten)]
    pub style: StyleArgs,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

#[derive(Args, Debug)]
struct MatrixArgs {
    /// Input CSV with one indicator column per position
    #[arg(short = 'i', long = "input")]
    pub input: String,
    /// Output CSV path
    #[arg(short = 'o', long = "output")]
    pub output: String,
    /// Field delimiter of the input file
    #[arg(short = 'd', long = "delimiter", default_value = ",")]
    pub delimiter: String,
    #[command(flatten)]
    pub compute: ComputeArgs,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

fn validate_input_path(input: &str) -> Result<(), AppError> {
    if input.trim().is_empty() {
        return Err(AppError::InvalidArgument("Input file path cannot be empty".to_string()));
    }
    if !Path::new(input).exists() {
        return Err(AppError::InvalidArgument(format!("Input file does not exist: {}", input)));
    }
    Ok(())
}

fn validate_image_path(output: &str) -> Result<(), AppError> {
    let lower = output.to_lowercase();
    if output.trim().is_empty() {
        return Err(AppError::InvalidArgument("Output file path cannot be empty".to_string()));
    }
    if !(lower.ends_with(".png") || lower.ends_with(".svg")) {
        return Err(AppError::InvalidArgument(format!(
            "Output image path must end with .png or .svg: {}",
            output
        )));
    }
    Ok(())
}

fn parse_delimiter(delimiter: &str) -> Result<char, AppError> {
    match delimiter {
        "\\t" | "tab" => Ok('\t'),
        d if d.chars().count() == 1 => Ok(d.chars().next().unwrap_or(',')),
        d => Err(AppError::InvalidArgument(format!(
            "Delimiter must be a single character, current: {:?}",
            d
        ))),
    }
}

fn validate_render_args(args: &RenderArgs) -> Result<(), AppError> {
    validate_input_path(&args.input)?;
    if let Some(output) = &args.output {
        validate_image_path(output)?;
    }
    parse_delimiter(&args.delimiter)?;
    PositionSet::parse(&args.compute.positions)?;
    Ok(())
}

fn validate_demo_args(args: &DemoArgs) -> Result<(), AppError> {
    if let Some(output) = &args.output {
        validate_image_path(output)?;
    }
    if args.random && args.rows == 0 {
        return Err(AppError::InvalidArgument("Row count must be positive".to_string()));
    }
    Ok(())
}

fn validate_matrix_args(args: &MatrixArgs) -> Result<(), AppError> {
    validate_input_path(&args.input)?;
    if !args.output.to_lowercase().ends_with(".csv") {
        return Err(AppError::InvalidArgument(format!(
            "Output file path must end with .csv: {}",
            args.output
        )));
    }
    parse_delimiter(&args.delimiter)?;
    PositionSet::parse(&args.compute.positions)?;
    Ok(())
}

/// Print and log the per-position stress distribution
fn report_distribution(
    summaries: &[PositionSummary],
    total_rows: usize,
    logger: &mut Logger,
) -> Result<(), Box<dyn Error>> {
    logger.log_and_print(&format!("[Distribution] {} lines", total_rows))?;
    for summary in summaries {
        logger.log_and_print(&format!(
            "    Position {:>2}: {}",
            summary.label,
            summary.annotation()
        ))?;
    }
    Ok(())
}

fn compute(
    table: &ObservationTable,
    positions: &PositionSet,
    builder: &HeatmapBuilder,
    logger: &mut Logger,
) -> Result<(CoOccurrenceMatrix, Vec<PositionSummary>), Box<dyn Error>> {
    logger.log(&format!("Diagonal Policy: {:?}", builder.diagonal))?;
    logger.log(&format!("Value Check: {:?}", builder.value_check))?;
    let result = builder.build(table, positions);
    match &result {
        Ok((matrix, _)) => logger.log(&format!(
            "Co-occurrence matrix computed: {} defined cells",
            matrix.defined_cells().count()
        ))?,
        Err(e) => logger.log(&format!("Co-occurrence computation failed: {}", e))?,
    }
    Ok(result?)
}

fn export_matrix(
    matrix: &CoOccurrenceMatrix,
    summaries: &[PositionSummary],
    path: &str,
    logger: &mut Logger,
) -> Result<(), Box<dyn Error>> {
    write_matrix_csv(matrix, summaries, path)?;
    logger.log(&format!("Matrix CSV written to {}", path))?;
    println!("[Output] Matrix: {}", path);
    Ok(())
}

fn render(
    matrix: &CoOccurrenceMatrix,
    summaries: &[PositionSummary],
    cfg: &HeatmapConfig,
    output: &str,
    logger: &mut Logger,
) -> Result<(), Box<dyn Error>> {
    let (width, height) = cfg.canvas_px();
    logger.log(&format!(
        "Rendering {}x{} px ({} dpi, scale {}) to {}",
        width, height, cfg.dpi, cfg.color_scale, output
    ))?;
    match plot::render_heatmap(matrix, summaries, cfg, output) {
        Ok(()) => {
            logger.log("Heatmap rendering completed")?;
            println!("[Output] Heatmap: {}", output);
            Ok(())
        }
        Err(e) => {
            logger.log(&format!("Heatmap rendering failed: {}", e))?;
            Err(e.into())
        }
    }
}

fn run_render(args: &RenderArgs, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let cfg = args.style.load_config()?;
    let output = args.output.clone().unwrap_or_else(|| cfg.output.clone());
    validate_image_path(&output)?;
    let positions = PositionSet::parse(&args.compute.positions)?;
    let delimiter = parse_delimiter(&args.delimiter)?;

    logger.log_header(
        "Render",
        &[
            ("Input File", args.input.clone()),
            ("Output File", output.clone()),
            ("Positions", positions.labels().join(",")),
            ("Config File", args.style.config.clone().unwrap_or_else(|| "-".to_string())),
        ],
    )?;

    println!("[Loading data]");
    println!("    Observations: {}", args.input);
    let table = ObservationTable::from_csv(&args.input, delimiter)?;
    logger.log(&format!("Loaded {} lines", table.n_rows()))?;

    let (matrix, summaries) = compute(&table, &positions, &args.compute.builder(), logger)?;
    report_distribution(&summaries, table.n_rows(), logger)?;
    if let Some(path) = &args.matrix_csv {
        export_matrix(&matrix, &summaries, path, logger)?;
    }
    render(&matrix, &summaries, &cfg, &output, logger)?;

    let used = format_time_used(start.elapsed());
    logger.log(&used)?;
    println!("{}", used);
    Ok(())
}

fn run_demo(args: &DemoArgs, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let cfg = args.style.load_config()?;
    let output = args.output.clone().unwrap_or_else(|| cfg.output.clone());
    validate_image_path(&output)?;

    let corpus_name = if args.random {
        format!("random ({} lines, seed {})", args.rows, args.seed)
    } else {
        "example".to_string()
    };
    logger.log_header(
        "Demo",
        &[("Corpus", corpus_name.clone()), ("Output File", output.clone())],
    )?;

    println!("[Corpus] {}", corpus_name);
    let table = if args.random {
        corpus::random_corpus(args.rows, args.seed)?
    } else {
        corpus::example_corpus()?
    };
    let positions = PositionSet::syllables();

    let (matrix, summaries) = compute(&table, &positions, &HeatmapBuilder::new(), logger)?;
    report_distribution(&summaries, table.n_rows(), logger)?;
    if let Some(path) = &args.matrix_csv {
        export_matrix(&matrix, &summaries, path, logger)?;
    }
    render(&matrix, &summaries, &cfg, &output, logger)?;

    let used = format_time_used(start.elapsed());
    logger.log(&used)?;
    println!("{}", used);
    Ok(())
}

fn run_matrix(args: &MatrixArgs, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let positions = PositionSet::parse(&args.compute.positions)?;
    let delimiter = parse_delimiter(&args.delimiter)?;
    logger.log_header(
        "Matrix",
        &[
            ("Input File", args.input.clone()),
            ("Output File", args.output.clone()),
            ("Positions", positions.labels().join(",")),
        ],
    )?;

    let table = ObservationTable::from_csv(&args.input, delimiter)?;
    logger.log(&format!("Loaded {} lines", table.n_rows()))?;
    let (matrix, summaries) = compute(&table, &positions, &args.compute.builder(), logger)?;
    report_distribution(&summaries, table.n_rows(), logger)?;
    export_matrix(&matrix, &summaries, &args.output, logger)?;

    let used = format_time_used(start.elapsed());
    logger.log(&used)?;
    println!("{}", used);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => {
            validate_render_args(&args)?;
            let mut logger = open_logger(&args.log, "render.log")?;
            run_render(&args, &mut logger)
        }
        Commands::Demo(args) => {
            validate_demo_args(&args)?;
            let mut logger = open_logger(&args.log, "demo.log")?;
            run_demo(&args, &mut logger)
        }
        Commands::Matrix(args) => {
            validate_matrix_args(&args)?;
            let mut logger = open_logger(&args.log, "matrix.log")?;
            run_matrix(&args, &mut logger)
        }
    }
}
