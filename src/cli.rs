//! The command line interface for the pipeline.
use crate::hydro::HydroSource;
use crate::id::{IsoCode, parse_iso_code};
use crate::log;
use crate::output::metadata::write_metadata;
use crate::pipeline::{Pipeline, write_configs};
use crate::settings::Settings;
use crate::template::load_template;
use crate::workspace::Workspace;
use ::log::info;
use anyhow::{Context, Result, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
pub mod template;
use settings::SettingsSubcommands;
use template::TemplateSubcommands;

/// The command line interface for the pipeline.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the prep command
#[derive(Args)]
pub struct PrepOpts {
    /// Also prepare hydropower plants for SPIDER
    #[arg(long)]
    pub hydro: bool,
    /// Project directory containing the raw data
    #[arg(short, long, default_value = ".")]
    pub project_dir: PathBuf,
    /// SPIDER config template to use instead of the built-in one
    #[arg(short, long)]
    pub template: Option<PathBuf>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Stage data, calculate land exclusions and write SPIDER configs for countries.
    Prep {
        /// Names of the countries, as they appear in the country boundaries
        #[arg(required = true)]
        countries: Vec<String>,
        /// Other prep options
        #[command(flatten)]
        opts: PrepOpts,
    },
    /// Attach placements to SPIDER's hexagons and tag them with their country.
    Finalise {
        /// Names of the countries, as they appear in the country boundaries
        #[arg(required = true)]
        countries: Vec<String>,
        /// ISO codes for the countries, in the same order. Used to name the final files.
        #[arg(short, long, num_args = 1.., required = true)]
        isocodes: Vec<String>,
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Write SPIDER configs for countries.
    Configs {
        /// Names of the countries
        #[arg(required = true)]
        countries: Vec<String>,
        /// Use the template with hydropower features
        #[arg(long)]
        hydro: bool,
        /// SPIDER config template to use instead of the built-in one
        #[arg(short, long)]
        template: Option<PathBuf>,
        /// Directory for the configs (defaults to spider/prep)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Prepare a hydropower plant database for SPIDER.
    Hydro {
        /// Which database to prepare
        #[arg(long, value_enum, default_value_t)]
        source: HydroSource,
        /// Project directory containing the raw data
        #[arg(short, long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Manage the built-in SPIDER config templates.
    Templates {
        /// The available subcommands for managing templates.
        #[command(subcommand)]
        subcommand: TemplateSubcommands,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Prep { countries, opts } => handle_prep_command(&countries, &opts, None),
            Self::Finalise {
                countries,
                isocodes,
                project_dir,
            } => handle_finalise_command(&countries, &isocodes, &project_dir, None),
            Self::Configs {
                countries,
                hydro,
                template,
                output_dir,
            } => handle_configs_command(
                &countries,
                hydro,
                template.as_deref(),
                output_dir.as_deref(),
                None,
            ),
            Self::Hydro {
                source,
                project_dir,
            } => handle_hydro_command(source, &project_dir, None),
            Self::Templates { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the pipeline
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ geox-prep --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    if let Some(settings) = settings {
        Ok(settings)
    } else {
        Settings::load().context("Failed to load settings.")
    }
}

/// Create the project's output folders and start logging to files in the project directory
fn init_project(project_dir: &Path, settings: &Settings) -> Result<Workspace> {
    let workspace = Workspace::new(project_dir);
    workspace
        .create_dirs()
        .context("Failed to create output directories.")?;
    log::init(&settings.log_level, Some(project_dir)).context("Failed to initialise logging.")?;
    info!("Project directory: {}", project_dir.display());

    Ok(workspace)
}

/// Handle the `prep` command.
pub fn handle_prep_command(
    countries: &[String],
    opts: &PrepOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let workspace = init_project(&opts.project_dir, &settings)?;
    let template = load_template(opts.template.as_deref(), opts.hydro)?;

    let pipeline = Pipeline::new(workspace, settings)?;
    pipeline.prep(countries, opts.hydro, &template)?;
    write_metadata(&opts.project_dir, "prep", &opts.project_dir, countries)?;
    info!("Prep complete!");

    Ok(())
}

/// Pair each country with its ISO code.
///
/// There must be exactly one ISO code per country.
pub fn pair_iso_codes(countries: &[String], iso_codes: &[String]) -> Result<Vec<(String, IsoCode)>> {
    ensure!(
        !iso_codes.is_empty(),
        "Please enter the ISO codes. These are used in naming the final files."
    );
    ensure!(
        iso_codes.len() == countries.len(),
        "Got {} ISO codes for {} countries. Please enter one ISO code per country.",
        iso_codes.len(),
        countries.len()
    );

    countries
        .iter()
        .zip(iso_codes)
        .map(|(country, code)| Ok((country.clone(), parse_iso_code(code)?)))
        .collect()
}

/// Handle the `finalise` command.
pub fn handle_finalise_command(
    countries: &[String],
    iso_codes: &[String],
    project_dir: &Path,
    settings: Option<Settings>,
) -> Result<()> {
    // Check arguments before doing anything else
    let pairs = pair_iso_codes(countries, iso_codes)?;

    let settings = load_settings(settings)?;
    let workspace = init_project(project_dir, &settings)?;

    let pipeline = Pipeline::new(workspace, settings)?;
    pipeline.finalise(&pairs)?;
    write_metadata(project_dir, "finalise", project_dir, countries)?;
    info!("Finalise complete!");

    Ok(())
}

/// Handle the `configs` command.
pub fn handle_configs_command(
    countries: &[String],
    hydro: bool,
    template: Option<&Path>,
    output_dir: Option<&Path>,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    // We don't save log files when only writing configs
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let default_dir;
    let output_dir = if let Some(dir) = output_dir {
        dir
    } else {
        default_dir = Workspace::new(Path::new(".")).spider_prep_dir();
        &default_dir
    };
    crate::output::create_output_directory(output_dir)?;

    let template = load_template(template, hydro)?;
    write_configs(countries, &template, output_dir)?;
    write_metadata(output_dir, "configs", output_dir, countries)?;

    Ok(())
}

/// Handle the `hydro` command.
pub fn handle_hydro_command(
    source: HydroSource,
    project_dir: &Path,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let workspace = init_project(project_dir, &settings)?;

    let pipeline = Pipeline::new(workspace, settings)?;
    pipeline.prepare_hydro(source)?;
    write_metadata(project_dir, "hydro", project_dir, &[])?;

    Ok(())
}
