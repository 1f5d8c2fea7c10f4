//! CLI binary for edgequake-pdf2ocr.
//!
//! A thin shim over the library crate: maps flags to `ConversionConfig`,
//! builds the engine registry from the environment and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_pdf2ocr::config::effective_dpi;
use edgequake_pdf2ocr::engine::job::PollStatus;
use edgequake_pdf2ocr::engine::mathpix::MATHPIX_ENGINE;
use edgequake_pdf2ocr::engine::mock::MOCK_ENGINE;
use edgequake_pdf2ocr::{
    inspect, CallContext, ConversionConfig, Converter, DocumentSource, EngineRegistry, JobObserver,
    JobState, LocalSource, MathpixConfig, MathpixEngine, MockEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Job spinner using indicatif ──────────────────────────────────────────────

/// Spinner that follows the remote job through submit → poll → fetch.
struct JobSpinner {
    bar: ProgressBar,
}

impl JobSpinner {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("OCR");
        bar.set_message("Uploading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl JobObserver for JobSpinner {
    fn on_transition(&self, _from: Option<&JobState>, to: &JobState) {
        match to {
            JobState::Submitted { job_id } => {
                self.bar.println(format!("  {} submitted {}", green("✓"), dim(job_id)));
                self.bar.set_message("Waiting for results…");
            }
            JobState::Completed { text, polls, .. } => {
                self.bar.println(format!(
                    "  {} completed after {} polls  {}",
                    green("✓"),
                    polls,
                    dim(&format!("{} chars", text.len()))
                ));
            }
            JobState::Failed { detail, .. } => {
                self.bar.println(format!("  {} {}", red("✗"), red(detail)));
            }
            JobState::TimedOut { polls, .. } => {
                self.bar
                    .println(format!("  {} timed out after {} polls", red("✗"), polls));
            }
            JobState::Processing { .. } => {}
        }
    }

    fn on_poll(&self, _job_id: &str, polls: u32, status: &PollStatus) {
        self.bar.set_message(format!("poll #{polls}: {status:?}"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a local PDF (path relative to --root)
  pdf2ocr convert paper.pdf

  # Convert from URL, emit tool-response JSON (text + base64 PNG pages)
  pdf2ocr convert https://arxiv.org/pdf/1706.03762 --json > packet.json

  # Offline run with the mock engine
  pdf2ocr convert --engine mock scan.pdf

  # Find PDFs under a directory
  pdf2ocr --root ~/papers search attention

  # Print PDF metadata (no credentials needed)
  pdf2ocr inspect paper.pdf

  # List registered engines
  pdf2ocr engines

ENVIRONMENT VARIABLES:
  MATHPIX_APP_ID      Mathpix application id (enables the mathpix engine)
  MATHPIX_APP_KEY     Mathpix application key
  MATHPIX_BASE_URL    Override the API base URL (default https://api.mathpix.com)
  PDFIUM_LIB_PATH     Path to libpdfium; otherwise the system library is used
  RUST_LOG            tracing filter, e.g. edgequake_pdf2ocr=debug
"#;

/// Rasterise PDFs and OCR them into a multi-modal packet.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2ocr",
    version,
    about = "Rasterise PDFs and OCR them into text + page images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory that document ids are resolved against.
    #[arg(long, global = true, env = "PDF2OCR_ROOT", default_value = ".")]
    root: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2OCR_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rasterise a document and recognise its text.
    Convert {
        /// Document id: a path under --root or an HTTP/HTTPS URL.
        id: String,

        /// Rendering DPI; zero or negative falls back to 150.
        #[arg(long, env = "PDF2OCR_DPI", allow_negative_numbers = true)]
        dpi: Option<i64>,

        /// Engine that receives the whole PDF (default: mathpix when configured, else mock).
        #[arg(long, env = "PDF2OCR_ENGINE")]
        engine: Option<String>,

        /// Overall deadline in seconds.
        #[arg(long, env = "PDF2OCR_TIMEOUT")]
        timeout: Option<u64>,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "PDF2OCR_PASSWORD")]
        password: Option<String>,

        /// Rasterise while the remote job runs.
        #[arg(long, env = "PDF2OCR_OVERLAP")]
        overlap: bool,

        /// Print the tool response (text block + base64 PNG blocks) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List PDFs under --root whose name contains QUERY.
    Search {
        #[arg(default_value = "")]
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Print PDF metadata only, no conversion.
    Inspect {
        id: String,

        #[arg(long, env = "PDF2OCR_PASSWORD")]
        password: Option<String>,
    },

    /// List registered recognition engines.
    Engines,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let source = Arc::new(LocalSource::new(&cli.root));

    match cli.command {
        Command::Convert {
            ref id,
            dpi,
            ref engine,
            timeout,
            ref password,
            overlap,
            json,
        } => {
            let spinner = (!cli.quiet && !json && !cli.verbose).then(JobSpinner::new);
            let registry = build_registry(spinner.clone())?;
            let engine = engine
                .clone()
                .or_else(|| registry.default_name().map(str::to_string))
                .unwrap_or_else(|| MOCK_ENGINE.to_string());

            let mut builder = ConversionConfig::builder()
                .dpi(effective_dpi(dpi))
                .remote_engine(engine)
                .overlap_stages(overlap);
            if let Some(pwd) = password {
                builder = builder.password(pwd.clone());
            }
            let config = builder.build().context("Invalid configuration")?;

            let mut ctx = CallContext::new();
            if let Some(secs) = timeout {
                ctx = ctx.with_timeout(Duration::from_secs(secs));
            }
            let cancel = ctx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let converter = Converter::new(source, Arc::new(registry), config);
            let outcome = converter.convert(&ctx, id).await;
            if let Some(ref s) = spinner {
                s.finish();
            }
            let result = outcome.with_context(|| format!("Conversion of '{id}' failed"))?;

            if json {
                let blocks = result
                    .to_content_blocks()
                    .context("Failed to build tool response")?;
                let out =
                    serde_json::to_string_pretty(&blocks).context("Failed to serialise output")?;
                println!("{out}");
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(result.recognized_text.as_bytes())
                    .context("Failed to write to stdout")?;
                if !result.recognized_text.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }

            if !cli.quiet {
                eprintln!(
                    "{}  {} pages  {}  confidence {:.2}  {}ms",
                    green("✔"),
                    result.page_count(),
                    bold(&result.engine_used),
                    result.confidence,
                    result.processing_time.as_millis(),
                );
            }
        }

        Command::Search { ref query, json } => {
            let hits = source.search(query).await.context("Search failed")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&hits).context("Failed to serialise results")?
                );
            } else if hits.is_empty() {
                if !cli.quiet {
                    eprintln!("No PDFs matching '{query}' under {}", cli.root.display());
                }
            } else {
                for hit in &hits {
                    println!("{:>10}  {}", dim(&format!("{} B", hit.size)), hit.id);
                }
            }
        }

        Command::Inspect {
            ref id,
            ref password,
        } => {
            let bytes = source
                .fetch(id)
                .await
                .with_context(|| format!("Failed to read '{id}'"))?;
            let meta = inspect(bytes.into(), password.as_deref())
                .await
                .context("Failed to inspect PDF")?;
            println!("Document:     {}", id);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
        }

        Command::Engines => {
            let registry = build_registry(None)?;
            for info in registry.infos() {
                let marker = if registry.default_name() == Some(info.name.as_str()) {
                    green("*")
                } else {
                    " ".to_string()
                };
                println!(
                    "{} {:<10} {}  {}",
                    marker,
                    bold(&info.name),
                    if info.is_local { "local " } else { "remote" },
                    dim(&info.features.join(", ")),
                );
            }
            if registry.default_name() != Some(MATHPIX_ENGINE) && !cli.quiet {
                eprintln!(
                    "{}",
                    dim("Set MATHPIX_APP_ID and MATHPIX_APP_KEY to enable the mathpix engine.")
                );
            }
        }
    }

    Ok(())
}

/// Registry with `mock` always and `mathpix` (as default) when configured.
fn build_registry(spinner: Option<Arc<JobSpinner>>) -> Result<EngineRegistry> {
    let mut builder = EngineRegistry::builder().register(MOCK_ENGINE, Arc::new(MockEngine::new()));
    if let Some(config) = MathpixConfig::from_env() {
        let mut engine = MathpixEngine::new(config).context("Failed to set up Mathpix client")?;
        if let Some(s) = spinner {
            engine = engine.with_observer(s);
        }
        builder = builder
            .register(MATHPIX_ENGINE, Arc::new(engine))
            .set_default(MATHPIX_ENGINE)
            .context("Failed to register Mathpix engine")?;
    }
    Ok(builder.build())
}
