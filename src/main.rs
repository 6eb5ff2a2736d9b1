// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info};
use std::io::Write;
use std::path::PathBuf;

use quillsync::app_config::{self, Config};
use quillsync::app_controller::Controller;
use quillsync::glossary::{Category, ImportStrategy};
use quillsync::providers::models::pricing_label;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for ImportStrategy to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliImportStrategy {
    Merge,
    Replace,
}

impl From<CliImportStrategy> for ImportStrategy {
    fn from(strategy: CliImportStrategy) -> Self {
        match strategy {
            CliImportStrategy::Merge => ImportStrategy::Merge,
            CliImportStrategy::Replace => ImportStrategy::Replace,
        }
    }
}

/// QuillSync - Chinese to English translation with AI and a project glossary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CommandLineOptions {
    /// Configuration file path
    #[arg(short = 'c', long = "config", default_value = "conf.json", global = true)]
    config_path: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long = "log-level", value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a text file
    Translate(TranslateArgs),

    /// Manage the project glossary
    #[command(subcommand)]
    Glossary(GlossaryCommand),

    /// Talk to the assistant
    Chat(ChatArgs),

    /// List available OpenRouter models
    Models {
        /// Ignore the cached model list
        #[arg(long)]
        refresh: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Text file with the Chinese source
    input_path: PathBuf,

    /// Where to write the translation (default: <name>.en.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of an existing translation
    #[arg(short = 'f', long = "force")]
    force_overwrite: bool,

    /// Model id override, e.g. anthropic/claude-3.5-sonnet
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Check the translation with the model afterwards
    #[arg(long)]
    verify: bool,

    /// Send the text without glossary substitution
    #[arg(long)]
    no_glossary: bool,
}

#[derive(Subcommand, Debug)]
enum GlossaryCommand {
    /// Import entries from a JSON array
    Import {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "merge")]
        strategy: CliImportStrategy,
    },

    /// Export entries as a JSON array (stdout when no file is given)
    Export { file: Option<PathBuf> },

    /// List the project's entries
    List,

    /// Add one entry
    Add {
        chinese_term: String,
        translation: String,
        #[arg(long, default_value = "other")]
        category: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Extract terms from a text file with the model
    Generate {
        file: PathBuf,
        /// Store the extracted terms instead of only printing them
        #[arg(long)]
        add: bool,
        /// Setting hint, detected from the text when omitted
        #[arg(long)]
        fandom: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Message for the assistant
    #[arg(default_value = "")]
    message: String,

    /// Source text the assistant can work with
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Forget the stored conversation first
    #[arg(long)]
    clear: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI color for a level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌ ", "1;31"),
            Level::Warn => ("🚧 ", "1;33"),
            Level::Info => (" ", "1;32"),
            Level::Debug => ("🔍 ", "1;36"),
            Level::Trace => ("📋 ", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, color) = Self::decoration(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color,
                now,
                emoji,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the max level does the filtering
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "quillsync", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config_path, cli.log_level)?;
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Translate(args) => run_translate(config, args).await,
        Commands::Glossary(command) => run_glossary(config, command).await,
        Commands::Chat(args) => {
            let controller = Controller::with_config(config)?;
            let reply = controller
                .chat(&args.message, args.input.as_deref(), args.clear)
                .await?;
            println!("{}", reply);
            Ok(())
        }
        Commands::Models { refresh } => {
            let controller = Controller::with_config(config)?;
            let models = controller.list_models(refresh).await?;
            for model in &models {
                println!("{:<10} {:<50} {}", model.category, model.id, pricing_label(model));
            }
            info!("{} models available", models.len());
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

/// Load or create the config, then apply environment and CLI overrides
fn load_config(config_path: &str, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = Config::load_or_create(config_path)?;
    config.apply_env_overrides();

    if let Some(log_level) = log_level {
        config.log_level = log_level.into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run_translate(mut config: Config, args: TranslateArgs) -> Result<()> {
    if let Some(model) = args.model {
        config.openrouter.model = model;
    }
    if args.verify {
        config.project.auto_verify = true;
    }
    if args.no_glossary {
        config.project.apply_glossary = false;
    }

    let controller = Controller::with_config(config)?;
    controller
        .translate_file(&args.input_path, args.output, args.force_overwrite)
        .await
}

async fn run_glossary(config: Config, command: GlossaryCommand) -> Result<()> {
    let controller = Controller::with_config(config)?;

    match command {
        GlossaryCommand::Import { file, strategy } => {
            let stats = controller.import_glossary(&file, strategy.into()).await?;
            info!("Import finished: {}", stats);
        }
        GlossaryCommand::Export { file } => {
            let json = controller.export_glossary(file.as_deref()).await?;
            if file.is_none() {
                println!("{}", json);
            }
        }
        GlossaryCommand::List => {
            let entries = controller.list_glossary().await?;
            for entry in &entries {
                if entry.notes.is_empty() {
                    println!("{} → {} [{}]", entry.chinese_term, entry.translation, entry.category);
                } else {
                    println!(
                        "{} → {} [{}] {}",
                        entry.chinese_term, entry.translation, entry.category, entry.notes
                    );
                }
            }
            info!("{} glossary entries", entries.len());
        }
        GlossaryCommand::Add {
            chinese_term,
            translation,
            category,
            notes,
        } => {
            let category: Category = category.parse().map_err(anyhow::Error::msg)?;
            let entry = controller
                .add_glossary_entry(&chinese_term, &translation, category, &notes)
                .await?;
            info!("Added {} → {}", entry.chinese_term, entry.translation);
        }
        GlossaryCommand::Generate { file, add, fandom } => {
            let generated = controller.generate_glossary(&file, add, fandom.as_deref()).await?;
            for entry in &generated.proposed {
                println!("{} → {} [{}]", entry.chinese_term, entry.translation, entry.category);
            }
            if add {
                info!("Generated glossary: {}", generated.stats);
            } else {
                info!("{} terms proposed (use --add to store them)", generated.proposed.len());
            }
        }
    }

    Ok(())
}
