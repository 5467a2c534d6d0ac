mod app;

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};

use rulebook_core::{
    config::{self, AppConfig},
    ModuleId, RuleLibrary, RuleSource, SessionConfig,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Session rulebook for High Frontier.
#[derive(Debug, Parser)]
#[command(name = "rulebook", version, about)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Rule database file or directory.
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Activate a module (repeatable).
    #[arg(long = "module", value_name = "ID")]
    modules: Vec<ModuleId>,

    /// Select the scenario being played.
    #[arg(long, value_name = "NAME")]
    scenario: Option<String>,

    /// Activate a variant (repeatable).
    #[arg(long = "variant", value_name = "NAME")]
    variants: Vec<String>,

    /// Print the resolved rulebook and exit.
    #[arg(long, conflicts_with = "validate")]
    print: bool,

    /// Check the rule database and exit non-zero if problems are found.
    #[arg(long)]
    validate: bool,
}

impl Cli {
    fn has_session_overrides(&self) -> bool {
        !self.modules.is_empty() || self.scenario.is_some() || !self.variants.is_empty()
    }

    /// Selection given on the command line, or the configured default.
    fn session(&self, config: &AppConfig) -> SessionConfig {
        if !self.has_session_overrides() {
            return config.default_session.clone();
        }
        let mut session = SessionConfig::new();
        session.active_modules.extend(self.modules.iter().copied());
        session.active_variants.extend(self.variants.iter().cloned());
        if let Some(scenario) = &self.scenario {
            session.scenario = scenario.clone();
        }
        session
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging()?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => {
            config::ensure_default_config()?;
            AppConfig::load()?
        }
    };
    if let Some(database) = &cli.database {
        config.database = Some(database.clone());
    }

    let source: RuleSource = config.rule_source();
    let library = RuleLibrary::open(source)?;
    let session = cli.session(&config);
    info!(source = %library.source(), session = %session.summary(), "Starting");

    if cli.validate {
        let issues = library.issues();
        if issues.is_empty() {
            println!("{}: no problems found", library.source());
            return Ok(ExitCode::SUCCESS);
        }
        for issue in &issues {
            println!("{issue}");
        }
        println!("{} problem(s) in {}", issues.len(), library.source());
        return Ok(ExitCode::FAILURE);
    }

    if cli.print {
        let store = library.store();
        println!("{}", store.meta().display_name());
        println!("{}\n", config.session_summary(&session));
        print!("{}", store.resolve(&session).to_plain_text());
        return Ok(ExitCode::SUCCESS);
    }

    let mut app = app::RulebookApp::new(library, config, session);
    app.run().await?;
    Ok(ExitCode::SUCCESS)
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("rulebook.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
