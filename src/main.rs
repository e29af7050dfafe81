use anyhow::{bail, Context, Result};
use assetcook::app::{handle_fatal_error, init_logging, AppConfig};
use assetcook::config::CookerSettings;
use assetcook::content::{FileType, Platform, COOKER_VERSION};
use assetcook::cooker::{sync_generated_sources, Cooker, SessionOptions};
use assetcook::scc::PerforceClient;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};

/// Cook authored source content into platform content
#[derive(Parser)]
#[command(name = "assetcook")]
#[command(about = "Incremental asset cooker", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a settings file (defaults to the user config file)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Target platform
    #[arg(long)]
    platform: Option<Platform>,

    /// Project root containing Source/ and Data/Content/
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Cook a single source file instead of the whole tree
    #[arg(long)]
    single: Option<PathBuf>,

    /// Never touch source control
    #[arg(long)]
    local: bool,

    /// Cook debug-only content
    #[arg(long)]
    debug_only: bool,

    /// Worker threads for parallel batches
    #[arg(long)]
    workers: Option<usize>,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Fail unless the built-in cooker version is N
    #[arg(long, value_name = "N")]
    cooker_version: Option<u32>,

    /// Fail unless the built-in data version of TYPE is N (repeatable)
    #[arg(long = "data-version", value_name = "TYPE=N")]
    data_versions: Vec<String>,
}

impl Cli {
    fn apply(&self, settings: &mut CookerSettings) {
        if let Some(platform) = self.platform {
            settings.platform = platform;
        }
        if let Some(base_dir) = &self.base_dir {
            settings.base_dir = base_dir.clone();
        }
        if let Some(single) = &self.single {
            settings.single_cook_path = Some(single.clone());
        }
        if self.local {
            settings.local = true;
        }
        if self.debug_only {
            settings.debug_only = true;
        }
        if let Some(workers) = self.workers {
            settings.workers = Some(workers);
        }
    }
}

/// Abort when the versions a build script expects differ from this binary's
fn check_versions(cli: &Cli) -> Result<()> {
    if let Some(expected) = cli.cooker_version {
        if expected != COOKER_VERSION {
            bail!(
                "Cooker version mismatch: expected {}, this cooker is version {}",
                expected,
                COOKER_VERSION
            );
        }
    }

    for arg in &cli.data_versions {
        let (name, version) = arg
            .split_once('=')
            .with_context(|| format!("Malformed --data-version '{arg}', expected TYPE=N"))?;
        let file_type: FileType = name.parse().map_err(anyhow::Error::msg)?;
        let expected: u32 = version
            .parse()
            .with_context(|| format!("Malformed version in --data-version '{arg}'"))?;
        if expected != file_type.data_version() {
            bail!(
                "{} data version mismatch: expected {}, this cooker writes version {}",
                file_type,
                expected,
                file_type.data_version()
            );
        }
    }
    Ok(())
}

async fn run(cli: Cli, app: &AppConfig) -> Result<()> {
    check_versions(&cli)?;

    let mut settings = CookerSettings::load_or_default(cli.config.as_deref())
        .context("Failed to load cooker settings")?;
    cli.apply(&mut settings);
    debug!("Settings: {:?}", settings);

    if let Some(p4) = settings.active_p4() {
        let client = PerforceClient::new(p4.clone());
        sync_generated_sources(&settings, &client).context("Failed to sync generated sources")?;
    }

    let single = settings.single_cook_path.clone();
    let options = SessionOptions {
        progress: app.progress,
        ..SessionOptions::default()
    };
    let mut cooker = Cooker::with_options(settings, options);

    match single {
        Some(path) => {
            info!("Cooking {}", path.display());
            cooker.cook_single(path).await?;
        }
        None => cooker.cook_all_out_of_date_content().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app = AppConfig::new(cli.verbose)
        .with_progress(!cli.no_progress && std::io::stderr().is_terminal());
    init_logging(&app);

    let verbose = cli.verbose;
    if let Err(e) = run(cli, &app).await {
        handle_fatal_error(e, verbose);
    }
}
