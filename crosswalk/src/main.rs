//! Crosswalk CLI - normalize heritage metadata exports
//!
//! # Main Command
//!
//! ```bash
//! crosswalk run -c crosswalks/museum.json export.json   # Records as NDJSON on stdout
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! crosswalk parse-date "1850-55"             # Parse one date expression
//! crosswalk parse-date "1021" --calendar hijri
//! crosswalk to-hijri 1850 1860               # Convert a Gregorian range
//! crosswalk steps                            # Show available steps
//! crosswalk example-config                   # Show an example crosswalk
//! crosswalk validate-config crosswalk.json   # Check and compile a crosswalk
//! ```

mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use crosswalk::{
    run_crosswalk, steps_description, to_hijri, validate_output_record, write_records,
    CrosswalkConfig, DateParser, DateRange, Engine, JsonExtractor, RangePolicy,
    ReaderKind, WriterKind,
};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::logging::{init_logging, LogConfig, LogFormat};

#[derive(Parser)]
#[command(name = "crosswalk")]
#[command(about = "Normalize heritage metadata with declarative crosswalks", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crosswalk over a source file
    Run {
        /// Source file (format set by the crosswalk's reader)
        input: PathBuf,

        /// Crosswalk JSON file
        #[arg(short, long)]
        config: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the crosswalk's writer
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Check every record for empty or duplicate values
        #[arg(long)]
        check_output: bool,
    },

    /// Parse a date expression and print the normalized range
    ParseDate {
        /// Date expression
        text: String,

        /// Calendar for unmarked years
        #[arg(long, value_enum, default_value_t = CalendarArg::Gregorian)]
        calendar: CalendarArg,

        /// Reject reversed ranges instead of swapping them
        #[arg(long)]
        strict: bool,
    },

    /// Convert a Gregorian year range to Hijri
    #[command(allow_negative_numbers = true)]
    ToHijri {
        start: i32,
        end: Option<i32>,
    },

    /// Show available steps
    Steps,

    /// Show example crosswalk
    ExampleConfig,

    /// Validate a crosswalk against the schema and compile it
    ValidateConfig {
        /// Crosswalk JSON file
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Ndjson,
    Json,
}

impl From<OutputFormat> for WriterKind {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Ndjson => WriterKind::Ndjson,
            OutputFormat::Json => WriterKind::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CalendarArg {
    Gregorian,
    Hijri,
    SolarHijri,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(
        &LogConfig::from_verbosity(cli.verbose)
            .with_format(cli.log_format)
            .with_ansi(io::stderr().is_terminal()),
    );

    let result = match cli.command {
        Commands::Run {
            input,
            config,
            output,
            format,
            check_output,
        } => cmd_run(&input, &config, output.as_deref(), format, check_output),

        Commands::ParseDate {
            text,
            calendar,
            strict,
        } => cmd_parse_date(&text, calendar, strict),

        Commands::ToHijri { start, end } => cmd_to_hijri(start, end),

        Commands::Steps => cmd_steps(),

        Commands::ExampleConfig => cmd_example_config(),

        Commands::ValidateConfig { input } => cmd_validate_config(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    input: &Path,
    config_path: &Path,
    output: Option<&Path>,
    format: Option<OutputFormat>,
    check_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CrosswalkConfig::from_path(config_path)?;
    info!(
        crosswalk = %config_path.display(),
        reader = config.settings.reader.as_str(),
        fields = config.fields.len(),
        "Loaded crosswalk"
    );

    let text = fs::read_to_string(input)?;
    let report = run_crosswalk(&config, &text)?;

    if check_output {
        let mut invalid = 0;
        for (i, record) in report.records.iter().enumerate() {
            if let Err(errors) = validate_output_record(record, config.settings.allow_duplicate_values) {
                invalid += 1;
                for err in errors.iter().take(3) {
                    warn!(record = i, "{}", err);
                }
            }
        }
        eprintln!("Output check: {} valid, {} invalid", report.records.len() - invalid, invalid);
    }

    let kind = format.map(WriterKind::from).unwrap_or(config.settings.writer);
    match output {
        Some(path) => {
            write_records(io::BufWriter::new(fs::File::create(path)?), kind, &report.records)?;
            eprintln!("Output written to: {}", path.display());
        }
        None => write_records(io::stdout().lock(), kind, &report.records)?,
    }

    eprintln!("{}", report.summary());
    for (field, count) in report.failure_counts() {
        eprintln!("   {}: {} failures", field, count);
    }
    Ok(())
}

fn cmd_parse_date(text: &str, calendar: CalendarArg, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let policy = if strict { RangePolicy::Strict } else { RangePolicy::Swap };
    let parser = DateParser::new(policy);

    let range = match calendar {
        CalendarArg::Gregorian => {
            if let Some(parsed) = parser.parse_expression(text) {
                eprintln!("Written in: {:?} calendar", parsed.calendar);
            }
            parser.parse(text)
        }
        CalendarArg::Hijri => parser.parse_hijri(text),
        CalendarArg::SolarHijri => parser.parse_solar_hijri(text),
    };

    match range {
        Some(range) => println!("{}", serde_json::to_string(&range)?),
        None => {
            eprintln!("Unparseable date: '{}'", text);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_to_hijri(start: i32, end: Option<i32>) -> Result<(), Box<dyn std::error::Error>> {
    let range = DateRange::ordered(start, end.unwrap_or(start));
    match to_hijri(range) {
        Some(hijri) => println!("{}", serde_json::to_string(&hijri)?),
        None => {
            eprintln!("No Hijri equivalent for {}", range);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_steps() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", steps_description());
    Ok(())
}

fn cmd_example_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = crosswalk::example_crosswalk();
    let json = config.to_json()?;
    println!("{}", json);
    Ok(())
}

fn cmd_validate_config(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Validating: {}", input.display());

    let config = CrosswalkConfig::from_path(input)?;
    // Compiling checks paths, patterns and tables; the reader decides the path language.
    match config.settings.reader {
        ReaderKind::Json => drop(Engine::new(&config, JsonExtractor)?),
        ReaderKind::Csv => drop(Engine::new(&config, config.settings.csv_extractor())?),
        ReaderKind::Xml => drop(Engine::new(&config, config.settings.xml_extractor())?),
        ReaderKind::Marc => drop(Engine::new(&config, config.settings.marc_extractor())?),
    }

    let mut stdout = io::stdout().lock();
    writeln!(
        stdout,
        "Crosswalk is valid: {} field chains, {} output fields",
        config.fields.len(),
        config.target_fields().len()
    )?;
    Ok(())
}
