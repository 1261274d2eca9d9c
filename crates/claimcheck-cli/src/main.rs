//! claimcheck CLI - verify documentation against the live application
//!
//! Usage:
//!   claimcheck init                 Write a default .claimcheck/config.toml
//!   claimcheck extract              Print the claims found in the docs
//!   claimcheck verify               Verify every claim and write a report
//!   claimcheck classify <file>      Classify failures from a test report

use anyhow::{Context, Result};
use chrono::Utc;
use claimcheck_browser::session::SESSION_ID_ENV;
use claimcheck_browser::{
    ChromeDriver, Credentials, DriverConfig, ResilientNavigator, SessionResolver,
};
use claimcheck_core::{
    ArtifactStore, Claim, ClaimcheckConfig, ClassifiedFailure, FailureSource, TestFailure,
};
use claimcheck_triage::{FailureClassifier, ReportWriter, RunSummary};
use claimcheck_verify::{ClaimExtractor, ClaimVerifier, PageMap};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "claimcheck")]
#[command(author, version, about = "Verify documentation claims against a live application")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root containing .claimcheck/config.toml
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Extract claims from the documentation corpus and print them as JSON
    Extract {
        /// Documentation directory (overrides config)
        #[arg(long)]
        docs: Option<PathBuf>,
    },

    /// Verify every claim against the running application
    Verify {
        /// Documentation directory (overrides config)
        #[arg(long)]
        docs: Option<PathBuf>,

        /// Application base URL (overrides config)
        #[arg(long)]
        base_url: Option<String>,

        /// Workspace id to use if discovery fails
        #[arg(long, env = SESSION_ID_ENV)]
        session_id: Option<String>,

        /// Connect to a browser started with --remote-debugging-port
        #[arg(long)]
        port: Option<u16>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Exit non-zero when any failure is found
        #[arg(long)]
        strict: bool,
    },

    /// Classify end-to-end test failures read from a JSON file
    Classify {
        /// JSON array of failures ({"name", "message", "file", "screenshot"})
        file: PathBuf,

        /// Exit non-zero when any failure is found
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let code = match cli.command {
        Commands::Init => cmd_init(&cli.root).await?,
        Commands::Extract { docs } => cmd_extract(&cli.root, docs).await?,
        Commands::Verify {
            docs,
            base_url,
            session_id,
            port,
            headed,
            strict,
        } => cmd_verify(&cli.root, docs, base_url, session_id, port, headed, strict).await?,
        Commands::Classify { file, strict } => cmd_classify(&cli.root, file, strict).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn load_config(root: &Path) -> Result<ClaimcheckConfig> {
    ClaimcheckConfig::load_or_default(root).context("Failed to load .claimcheck/config.toml")
}

async fn cmd_init(root: &Path) -> Result<i32> {
    let path = ClaimcheckConfig::write_default(root).context("Failed to write default config")?;
    println!("Initialized claimcheck in {:?}", root);
    println!("Created:");
    println!("  {}", path.display());
    println!("\nNext steps:");
    println!("  1. Set base_url and docs_dir in the config");
    println!("  2. Export CLAIMCHECK_EMAIL and CLAIMCHECK_PASSWORD");
    println!("  3. Run 'claimcheck verify'");
    Ok(0)
}

async fn cmd_extract(root: &Path, docs: Option<PathBuf>) -> Result<i32> {
    let config = load_config(root)?;
    let docs_dir = root.join(docs.unwrap_or_else(|| config.docs_dir.clone()));
    let claims = extract_corpus(root, &docs_dir, &config).await?;

    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_verify(
    root: &Path,
    docs: Option<PathBuf>,
    base_url: Option<String>,
    session_id: Option<String>,
    port: Option<u16>,
    headed: bool,
    strict: bool,
) -> Result<i32> {
    let started_at = Utc::now();
    let mut config = load_config(root)?;
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }

    let docs_dir = root.join(docs.unwrap_or_else(|| config.docs_dir.clone()));
    let claims = extract_corpus(root, &docs_dir, &config).await?;
    if claims.is_empty() {
        warn!("No claims found under {}", docs_dir.display());
    }

    let driver = match port {
        Some(port) => ChromeDriver::connect(port).await,
        None => {
            ChromeDriver::launch_with_config(DriverConfig {
                headless: !headed,
                ..DriverConfig::default()
            })
            .await
        }
    }
    .context("Failed to start browser")?;

    let resolver = SessionResolver::new(&driver, config.session.clone());
    let credentials = Credentials::from_env();
    let session = resolver
        .resolve(credentials.as_ref(), &config.base_url, session_id.as_deref())
        .await
        .context("Failed to resolve session")?;
    info!("Using workspace {}", session.session_id);

    let store = ArtifactStore::new(root.join(&config.artifacts_dir));
    let navigator = ResilientNavigator::new(&driver, config.navigation.clone())
        .with_login_inputs(
            config.session.password_selectors.clone(),
            config.session.email_selectors.clone(),
        )
        .with_artifacts(store.clone());

    let verifier = ClaimVerifier::new(navigator, root.join(&config.assets_root), config.verify.clone())
        .with_pages(PageMap::new(&config.pages, &config.extract.route_segments));
    let results = verifier.verify_all(&claims, &session).await;

    let failures: Vec<FailureSource> = results
        .iter()
        .filter(|result| !result.verified)
        .cloned()
        .map(FailureSource::from)
        .collect();
    let classified = FailureClassifier::new().classify_all(&failures);

    let summary = RunSummary::new(started_at, &results, &classified);
    let paths = ReportWriter::new(store)
        .write(&summary, &results, &classified)
        .await
        .context("Failed to write report")?;

    print_summary(&summary, &classified);
    println!("\nReport: {}", paths.markdown.display());
    Ok(summary.exit_code(strict))
}

async fn cmd_classify(root: &Path, file: PathBuf, strict: bool) -> Result<i32> {
    let started_at = Utc::now();
    let config = load_config(root)?;

    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let tests: Vec<TestFailure> =
        serde_json::from_str(&content).context("Failed to parse test failures JSON")?;
    info!("Classifying {} test failure(s)", tests.len());

    let failures: Vec<FailureSource> = tests.into_iter().map(FailureSource::from).collect();
    let classified = FailureClassifier::new().classify_all(&failures);

    let summary = RunSummary::new(started_at, &[], &classified);
    let paths = ReportWriter::new(ArtifactStore::new(root.join(&config.artifacts_dir)))
        .write(&summary, &[], &classified)
        .await
        .context("Failed to write report")?;

    print_summary(&summary, &classified);
    println!("\nReport: {}", paths.markdown.display());
    Ok(summary.exit_code(strict))
}

/// Extract claims from every markdown file under `docs_dir`, in path order
async fn extract_corpus(root: &Path, docs_dir: &Path, config: &ClaimcheckConfig) -> Result<Vec<Claim>> {
    let extractor = ClaimExtractor::new(&config.extract).context("Invalid extraction config")?;
    let files = discover_docs(docs_dir)?;
    info!("Found {} documentation file(s) in {}", files.len(), docs_dir.display());

    let mut claims = Vec::new();
    for path in files {
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let source = path.strip_prefix(root).unwrap_or(&path).display().to_string();
        claims.extend(extractor.extract(&text, &source));
    }

    info!("Extracted {} claim(s)", claims.len());
    Ok(claims)
}

fn discover_docs(docs_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for extension in ["md", "mdx"] {
        let pattern = format!("{}/**/*.{}", docs_dir.display(), extension);
        for entry in glob::glob(&pattern).with_context(|| format!("Invalid glob {}", pattern))? {
            match entry {
                Ok(path) if path.is_file() => {
                    files.insert(path);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path: {}", e),
            }
        }
    }
    Ok(files.into_iter().collect())
}

fn print_summary(summary: &RunSummary, classified: &[ClassifiedFailure]) {
    println!("claimcheck run {}", summary.run_id);
    println!("===================");
    println!(
        "Checked: {}  Verified: {}  Failures: {}",
        summary.checked, summary.verified, summary.failures
    );

    for (classification, count) in &summary.by_classification {
        println!("  {}: {}", classification, count);
    }

    if !classified.is_empty() {
        println!("\nFailures:");
        for failure in classified {
            println!(
                "  [{}] {} ({}): {}",
                failure.severity,
                failure.failure.name(),
                failure.classification,
                failure.failure.detail()
            );
        }
    }
}
