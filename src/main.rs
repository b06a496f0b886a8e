//! nima-report: NIMA score extraction and reporting CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use nima_report::config::{load_config, write_default_config, CliOverrides, EffectiveConfig, CONFIG_FILENAME};
use nima_report::pipeline::{Pipeline, PipelineOptions};
use nima_report::report::{ConsoleReporter, JsonReporter};
use nima_report::store::ResultStore;
use nima_report::tool::{CapturedOutput, CommandPredictor};
use nima_report::{Error, ModelVariant, VariantFilter, Warning, WarningKind};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// nima-report: extract, persist and visualize NIMA image quality scores
#[derive(Parser, Debug)]
#[command(name = "nima-report")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

/// Options shared by every command that touches images, records or reports
#[derive(clap::Args, Debug, Clone, Default)]
struct CommonArgs {
    /// Path to config file (default: search .nimarc.json in current dir and parents)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Quiet mode (warnings and errors only)
    #[arg(long, short)]
    quiet: bool,

    /// Directory holding the source images
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Directory for JSON score records
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Directory for rendered reports (default: results directory)
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Model variant(s) to assess, load and render
    #[arg(long, value_enum)]
    model_type: Option<VariantFilter>,
}

#[derive(clap::Args, Debug, Clone, Default)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Assessment tool program (default: ./assess_images.sh)
    #[arg(long)]
    tool: Option<String>,

    /// Argument passed to the assessment tool (repeatable)
    #[arg(long = "tool-arg", value_name = "ARG", allow_hyphen_values = true)]
    tool_args: Vec<String>,

    /// Echo tool output line by line while it runs
    #[arg(long)]
    stream: bool,

    /// Persist records without rendering reports
    #[arg(long)]
    skip_report: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the assessment tool, persist its scores and render reports (default)
    Run(RunArgs),

    /// Extract scores from captured tool output and persist them
    Parse {
        /// Captured output file, or `-` for stdin
        input: PathBuf,

        /// Print the extracted distributions as JSON
        #[arg(long)]
        json: bool,

        /// Also render reports for the stored records
        #[arg(long)]
        render: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Render reports from stored records
    Render {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Print mean, dispersion and overall score per image from stored records
    Scores {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// List each distribution under its statistics
        #[arg(long, short)]
        verbose: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Score one image (or every image in a directory) with the predictor
    Evaluate {
        /// Image file or directory of images
        image: PathBuf,

        /// Model variant to predict: aesthetic or technical
        #[arg(long)]
        variant: ModelVariant,

        /// Predictor program, invoked as `<PROGRAM> <ARGS...> <IMAGE> <VARIANT>`
        #[arg(long)]
        predictor: Option<String>,

        /// Argument passed to the predictor before the image (repeatable)
        #[arg(long = "predictor-arg", value_name = "ARG", allow_hyphen_values = true)]
        predictor_args: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Create .nimarc.json with the default settings
    Init {
        /// Directory in which to create config (default: current)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let outcome = match args.command {
        None => run_pipeline(args.run),
        Some(Commands::Run(run_args)) => run_pipeline(run_args),
        Some(Commands::Parse {
            input,
            json,
            render,
            common,
        }) => run_parse(&input, json, render, common),
        Some(Commands::Render { common }) => run_render(common),
        Some(Commands::Scores {
            json,
            verbose,
            common,
        }) => run_scores(json, verbose, common),
        Some(Commands::Evaluate {
            image,
            variant,
            predictor,
            predictor_args,
            common,
        }) => run_evaluate(&image, variant, predictor, predictor_args, common),
        Some(Commands::Init { dir }) => return run_init(dir.as_deref()),
    };

    match outcome {
        Ok(code) => Ok(code),
        // Tool failures and empty result sets exit 1; anything else is exit 2
        Err(CommandError::Pipeline(e)) if e.is_fatal() => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            Ok(ExitCode::from(1))
        }
        Err(CommandError::Pipeline(e)) => Err(e.into()),
        Err(CommandError::Other(e)) => Err(e),
    }
}

/// Keeps library errors typed until the exit code is chosen
enum CommandError {
    Pipeline(Error),
    Other(anyhow::Error),
}

impl From<Error> for CommandError {
    fn from(e: Error) -> Self {
        CommandError::Pipeline(e)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        CommandError::Other(e)
    }
}

type CommandResult = std::result::Result<ExitCode, CommandError>;

fn info(quiet: bool, message: impl std::fmt::Display) {
    if !quiet {
        eprintln!("{}: {}", "Info".blue(), message);
    }
}

fn print_warnings<'a>(warnings: impl IntoIterator<Item = &'a Warning>) {
    for warning in warnings {
        eprintln!("{}: {}", "Warning".yellow(), warning);
    }
}

/// Load config (CLI flags override config file)
fn effective_config(common: &CommonArgs, mut overrides: CliOverrides) -> Result<EffectiveConfig> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    overrides.image_dir = common.image_dir.clone();
    overrides.results_dir = common.results_dir.clone();
    overrides.report_dir = common.report_dir.clone();
    overrides.model_type = common.model_type;
    Ok(load_config(&cwd, common.config.as_deref())?.merge_with_cli(overrides))
}

fn pipeline_for(config: &EffectiveConfig, skip_render: bool) -> Pipeline {
    Pipeline::new(PipelineOptions {
        image_dir: config.image_dir.clone(),
        results_dir: config.results_dir.clone(),
        report_dir: config.report_dir.clone(),
        filter: config.model_type,
        skip_render,
    })
}

fn run_pipeline(args: RunArgs) -> CommandResult {
    let quiet = args.common.quiet;
    let config = effective_config(
        &args.common,
        CliOverrides {
            tool_command: args.tool.clone(),
            tool_args: args.tool_args.clone(),
            stream: args.stream,
            ..CliOverrides::default()
        },
    )?;

    let tool = config
        .tool
        .command(config.model_type, &config.image_dir, config.stream);
    info(
        quiet,
        format!(
            "Assessing {} ({} quality) with {}",
            config.image_dir.display(),
            config.model_type,
            tool.display()
        ),
    );

    let pipeline = pipeline_for(&config, args.skip_report);
    let mut echo = |line: &str| {
        if !quiet {
            println!("{}", line);
        }
    };
    let report = pipeline.run_with(&tool, &mut echo)?;

    print_warnings(report.warnings());
    info(
        quiet,
        format!(
            "Extracted {} score distribution(s) for {} image(s)",
            report.parsed.record_count(),
            report.parsed.table.len()
        ),
    );
    info(
        quiet,
        format!(
            "Saved {} record(s) to {}",
            report.written.len(),
            config.results_dir.display()
        ),
    );
    if let Some(render) = &report.render {
        info(
            quiet,
            format!(
                "Rendered {} report(s) to {}",
                render.rendered.len(),
                config.report_dir.display()
            ),
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_parse(input: &Path, json: bool, render: bool, common: CommonArgs) -> CommandResult {
    let config = effective_config(&common, CliOverrides::default())?;

    let text = if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read tool output from stdin")?;
        text
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read tool output: {}", input.display()))?
    };

    let pipeline = pipeline_for(&config, !render);
    let report = pipeline.run(&CapturedOutput(text))?;

    if json {
        println!(
            "{}",
            JsonReporter::new()
                .pretty()
                .report_extraction(&report.parsed.table, &report.parsed.warnings)
        );
        print_warnings(report.render.iter().flat_map(|r| r.warnings.iter()));
    } else {
        print_warnings(report.warnings());
    }

    info(
        common.quiet,
        format!(
            "Saved {} record(s) to {}",
            report.written.len(),
            config.results_dir.display()
        ),
    );
    if let Some(render) = &report.render {
        info(
            common.quiet,
            format!("Rendered {} report(s)", render.rendered.len()),
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_render(common: CommonArgs) -> CommandResult {
    let config = effective_config(&common, CliOverrides::default())?;
    if !config.results_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Results directory not found: {}",
            config.results_dir.display()
        )
        .into());
    }

    let report = pipeline_for(&config, false).render_stored()?;
    print_warnings(&report.warnings);
    let nothing_matched = report
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::NoMatchingRecords);
    if report.rendered.is_empty() && nothing_matched {
        return Err(Error::NoResults.into());
    }
    for path in &report.rendered {
        info(common.quiet, format!("Saved {}", path.display()));
    }
    info(
        common.quiet,
        format!(
            "Rendered {} report(s) to {}",
            report.rendered.len(),
            config.report_dir.display()
        ),
    );
    Ok(ExitCode::SUCCESS)
}

fn run_scores(json: bool, verbose: bool, common: CommonArgs) -> CommandResult {
    let config = effective_config(&common, CliOverrides::default())?;
    let loaded = ResultStore::new(&config.results_dir).read_all(config.model_type)?;
    print_warnings(&loaded.warnings);
    if loaded.table.is_empty() {
        return Err(Error::NoResults.into());
    }

    if json {
        println!("{}", JsonReporter::new().pretty().report(&loaded.table));
    } else {
        let reporter = if verbose {
            ConsoleReporter::new().verbose()
        } else {
            ConsoleReporter::new()
        };
        reporter.report(&loaded.table);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_evaluate(
    image: &Path,
    variant: ModelVariant,
    predictor: Option<String>,
    predictor_args: Vec<String>,
    common: CommonArgs,
) -> CommandResult {
    let config = effective_config(
        &common,
        CliOverrides {
            predictor_command: predictor,
            predictor_args,
            ..CliOverrides::default()
        },
    )?;
    let Some((program, args)) = config.predictor.clone() else {
        return Err(anyhow::anyhow!(
            "No predictor configured; pass --predictor or set predictor.command in {}",
            CONFIG_FILENAME
        )
        .into());
    };
    let predictor = CommandPredictor::new(program, args);
    let pipeline = pipeline_for(&config, true);

    let written = if image.is_dir() {
        let report = pipeline.evaluate_dir(image, variant, &predictor)?;
        print_warnings(&report.warnings);
        if report.written.is_empty() {
            return Err(Error::NoResults.into());
        }
        report.written
    } else {
        vec![pipeline.evaluate_single(image, variant, &predictor)?]
    };

    for path in &written {
        for record in ResultStore::read_record(path)? {
            println!(
                "{} {} score: {:.2}/10",
                record.image_identifier.bold(),
                record.model_variant.label(),
                nima_report::stats::mean(&record.distribution)
            );
        }
        info(common.quiet, format!("Saved {}", path.display()));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_init(dir: Option<&Path>) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let dir = dir.unwrap_or(&cwd);
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() {
        eprintln!(
            "{}: {} already exists; use --dir to write elsewhere or remove it first",
            "Warning".yellow(),
            config_path.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let path = write_default_config(dir)?;
    println!("{} Created {}", "✓".green(), path.display());
    Ok(ExitCode::SUCCESS)
}
