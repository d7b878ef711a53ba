//! CLI binary for edgequake-pdf2latex.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig`, runs one job, and writes its artifacts.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2latex::{
    inspect, process_to_dir, Credential, JobReport, JobState, PipelineConfig,
    PipelineProgressCallback, ProgressCallback, SkipReason, Stage, StageError, StageStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Lines of compiler output shown when compilation fails.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner for the running stage, one log line per
/// finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_start: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            stage_start: Mutex::new(None),
        })
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .stage_start
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Generation => "Generating LaTeX",
        Stage::Compilation => "Compiling PDF",
        Stage::Conversion => "Converting to DOCX",
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_job_start(&self, source_name: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {source_name}…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut t) = self.stage_start.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_prefix(format!("Step {}/3", stage.step()));
        self.bar.set_message(stage_label(stage));
    }

    fn on_stage_complete(&self, stage: Stage, artifact: &Path) {
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} {:<20} {:<32} {}",
            green("✓"),
            stage_label(stage),
            dim(&name),
            self.stage_elapsed(),
        ));
    }

    fn on_stage_skipped(&self, stage: Stage, reason: &SkipReason) {
        self.bar.println(format!(
            "  {} {:<20} {}",
            dim("–"),
            stage_label(stage),
            dim(&format!("skipped: {reason}")),
        ));
    }

    fn on_stage_failed(&self, stage: Stage, error: &StageError) {
        let first_line = error.to_string().lines().next().unwrap_or_default().to_string();
        self.bar.println(format!(
            "  {} {:<20} {}  {}",
            red("✗"),
            stage_label(stage),
            red(&first_line),
            self.stage_elapsed(),
        ));
    }

    fn on_job_complete(&self, _state: &JobState) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Replicate a PDF; artifacts land in the current directory
  pdf2latex report.pdf

  # Write artifacts elsewhere
  pdf2latex report.pdf -o out/

  # Faster, cheaper model
  pdf2latex --model gemini-2.5-flash report.pdf

  # Use xelatex for documents with non-Latin scripts
  pdf2latex --compiler xelatex thesis.pdf

  # From a URL
  pdf2latex https://arxiv.org/pdf/1706.03762 -o attention/

  # Inspect PDF metadata (no API key needed)
  pdf2latex --inspect-only report.pdf

  # Machine-readable job report
  pdf2latex --json report.pdf > report.json

ARTIFACTS:
  <base>.tex              LaTeX generated by the model
  <base>_recompiled.pdf   PDF compiled from that LaTeX (two passes)
  <base>.docx             DOCX converted from the recompiled PDF

  When a stage fails, the artifacts of the stages before it are still written.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Gemini API key
  PDF2LATEX_MODEL         Override model ID
  PDF2LATEX_COMPILER      Override compiler program
  RUST_LOG                Override log filter (e.g. edgequake_pdf2latex=debug)

SETUP:
  1. Install TeX:     apt install texlive-latex-base texlive-latex-extra
  2. Set API key:     export GEMINI_API_KEY=...
  3. Convert:         pdf2latex document.pdf
"#;

/// Replicate PDFs as LaTeX with Gemini, recompile, and convert to DOCX.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2latex",
    version,
    about = "Replicate PDFs as LaTeX with Gemini, recompile them, and convert to DOCX",
    long_about = "Upload a PDF to a multimodal model, ask it for a LaTeX replica, compile that \
LaTeX twice with pdflatex, and convert the recompiled PDF to DOCX. Every artifact produced \
before a failure is kept.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory the artifacts are written to.
    #[arg(short, long, env = "PDF2LATEX_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID (e.g. gemini-2.5-pro, gemini-2.5-flash).
    #[arg(long, env = "PDF2LATEX_MODEL")]
    model: Option<String>,

    /// Base URL of the Gemini API.
    #[arg(long, env = "PDF2LATEX_API_BASE")]
    api_base: Option<String>,

    /// Sampling temperature (0.0–2.0). Service default when unset.
    #[arg(long, env = "PDF2LATEX_TEMPERATURE")]
    temperature: Option<f32>,

    /// Path to a text file containing a custom instruction prompt.
    #[arg(long, env = "PDF2LATEX_PROMPT")]
    prompt: Option<PathBuf>,

    /// LaTeX compiler program.
    #[arg(long, env = "PDF2LATEX_COMPILER")]
    compiler: Option<String>,

    /// Parent directory for the per-job workspace.
    #[arg(long, env = "PDF2LATEX_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Keep the workspace (with intermediate files) after the job.
    #[arg(long, env = "PDF2LATEX_KEEP_WORKSPACE")]
    keep_workspace: bool,

    /// Per-request timeout for the model service, in seconds.
    #[arg(long, env = "PDF2LATEX_REQUEST_TIMEOUT", default_value_t = 600)]
    request_timeout: u64,

    /// HTTP download timeout for URL inputs, in seconds.
    #[arg(long, env = "PDF2LATEX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the job report as JSON.
    #[arg(long, env = "PDF2LATEX_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2LATEX_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no processing.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2LATEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2LATEX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already says which stage is running; INFO lines would
    // only tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = PipelineConfig::builder()
            .download_timeout_secs(cli.download_timeout)
            .build()
            .context("Invalid configuration")?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = process_to_dir(&cli.input, &cli.output_dir, &config)
        .await
        .context("Processing failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(if matches!(report.state, JobState::Failed(_)) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .request_timeout_secs(cli.request_timeout)
        .download_timeout_secs(cli.download_timeout)
        .keep_workspace(cli.keep_workspace);

    if let Some(credential) = cli.api_key.as_deref().and_then(Credential::new) {
        builder = builder.credential(credential);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref base) = cli.api_base {
        builder = builder.api_base(base);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref compiler) = cli.compiler {
        builder = builder.compiler(compiler);
    }
    if let Some(ref root) = cli.workspace_root {
        builder = builder.workspace_root(root);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &JobReport) {
    let exported = report.exported.as_ref().unwrap_or(&report.artifacts);
    for (stage, path) in exported.iter() {
        eprintln!(
            "{}  {:<12} →  {}",
            green("✔"),
            stage.to_string(),
            bold(&path.display().to_string())
        );
    }

    if let Some(usage) = report.usage {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&usage.input_tokens.to_string()),
            dim(&usage.output_tokens.to_string()),
        );
    }

    if let JobState::Failed(stage) = report.state {
        let Some(error) = report
            .stages
            .iter()
            .find(|s| s.stage == stage)
            .and_then(|s| match &s.status {
                StageStatus::Failed { error } => Some(error),
                _ => None,
            })
        else {
            return;
        };
        eprintln!(
            "{} {} stage failed ({}):\n{}",
            red("✘"),
            stage,
            error.kind(),
            error
        );
        if let Some(diagnostics) = error.diagnostics() {
            let lines: Vec<&str> = diagnostics.lines().collect();
            let tail = &lines[lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES)..];
            eprintln!("{}", dim("── compiler output (tail) ──"));
            for line in tail {
                eprintln!("{}", dim(line));
            }
        }
    }

    if let Some(ref dir) = report.workspace {
        eprintln!("   workspace kept at {}", dim(&dir.display().to_string()));
    }
}
