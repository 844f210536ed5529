//! CLI binary for stegaudio-client.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ClientConfig`, runs one flow and prints its final state.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use stegaudio_client::{
    ClientConfig, DirectoryDownloader, EmbedFlow, EmbedMode, ExtractFlow, FileSelection, Flow,
    FlowContext, FlowKind, FlowObserver, FlowOutcome, FlowState, HttpTransferClient, ObserverRef,
    SavedArtifact, VerifyFlow, DEFAULT_BASE_URL,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner naming the current step, plus one line per
/// saved artifact.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("reading inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl FlowObserver for CliObserver {
    fn on_state_change(&self, _flow: FlowKind, state: &FlowState) {
        if state.is_terminal() {
            self.bar.finish_and_clear();
        }
    }

    fn on_step_start(&self, flow: FlowKind, step: usize, total: usize, endpoint: &str) {
        self.bar.set_prefix(format!("{flow} {step}/{total}"));
        self.bar.set_message(endpoint.to_string());
    }

    fn on_artifact_saved(&self, _flow: FlowKind, artifact: &SavedArtifact) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            artifact.path.display(),
            dim(&format!("{} bytes", artifact.size_bytes)),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Hide secret.txt in sample.wav (combined endpoint, prints capacity and links)
  stegaudio embed --audio sample.wav --file secret.txt --key qwerty

  # Two-step contract: saves embedded_sample.wav and qr_sample.png
  stegaudio --mode two-step -o out/ embed --audio sample.wav --file secret.txt --key qwerty

  # Combined endpoint, but also download the produced files
  stegaudio --fetch-links embed --audio sample.wav --file secret.txt --key qwerty

  # Recover the hidden file
  stegaudio -o out/ extract --audio embedded_sample.wav --key qwerty

  # Check that a QR image belongs to a WAV (exit code 2 when it does not)
  stegaudio verify --audio embedded_sample.wav --qr qr_sample.png

  # Machine-readable final state
  stegaudio --json verify --audio embedded_sample.wav --qr qr_sample.png

EXIT CODES:
  0  flow succeeded (verify: QR matches)
  1  flow failed, or inputs were refused before submission
  2  verify completed but the QR does not match the audio

ENVIRONMENT VARIABLES:
  STEGAUDIO_BASE_URL      Service base URL (default http://localhost:8000)
  STEGAUDIO_KEY           Password for embed / extract
  STEGAUDIO_OUTPUT_DIR    Where received files are saved
  STEGAUDIO_EMBED_MODE    combined | two-step
  RUST_LOG                Overrides the log filter (e.g. stegaudio_client=debug)
"#;

/// Embed, extract and verify files hidden in WAV audio through a stegaudio service.
#[derive(Parser, Debug)]
#[command(
    name = "stegaudio",
    version,
    about = "Embed, extract and verify files hidden in WAV audio",
    long_about = "Client for an audio steganography service. All encoding, encryption and QR \
work happens on the service; this tool uploads the inputs, sequences the calls and saves \
what comes back.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Service base URL.
    #[arg(long, global = true, env = "STEGAUDIO_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Directory for received files.
    #[arg(short, long, global = true, env = "STEGAUDIO_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Replace existing files instead of adding a " (n)" suffix.
    #[arg(long, global = true, env = "STEGAUDIO_OVERWRITE")]
    overwrite: bool,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "STEGAUDIO_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Embed contract spoken by the service.
    #[arg(long, global = true, env = "STEGAUDIO_EMBED_MODE", value_enum, default_value = "combined")]
    mode: ModeArg,

    /// Combined embed: download the produced audio and QR as well.
    #[arg(long, global = true, env = "STEGAUDIO_FETCH_LINKS")]
    fetch_links: bool,

    /// Print the final flow state as JSON.
    #[arg(long, global = true, env = "STEGAUDIO_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "STEGAUDIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STEGAUDIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "STEGAUDIO_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hide a file inside a WAV carrier.
    Embed {
        /// Carrier WAV file.
        #[arg(long)]
        audio: PathBuf,
        /// File to hide.
        #[arg(long)]
        file: PathBuf,
        /// Password protecting the hidden file.
        #[arg(long, env = "STEGAUDIO_KEY", hide_env_values = true)]
        key: String,
    },
    /// Recover a hidden file from an embedded WAV.
    Extract {
        /// Embedded WAV file.
        #[arg(long)]
        audio: PathBuf,
        /// Password used at embed time.
        #[arg(long, env = "STEGAUDIO_KEY", hide_env_values = true)]
        key: String,
    },
    /// Check that a QR image belongs to an embedded WAV.
    Verify {
        /// Embedded WAV file.
        #[arg(long)]
        audio: PathBuf,
        /// QR image produced at embed time.
        #[arg(long)]
        qr: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Combined,
    TwoStep,
}

impl From<ModeArg> for EmbedMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Combined => EmbedMode::Combined,
            ModeArg::TwoStep => EmbedMode::TwoStep,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already says what is happening; keep INFO logs out of its way.
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

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let client = HttpTransferClient::new(&config).context("Failed to create HTTP client")?;
    let downloader = DirectoryDownloader::new(&config.output_dir, config.overwrite);
    let ctx = FlowContext::new(client, downloader, config);
    let observer: Option<ObserverRef> = if show_progress {
        Some(CliObserver::new() as ObserverRef)
    } else {
        None
    };

    // ── Run the flow ─────────────────────────────────────────────────────
    let (kind, state) = match &cli.command {
        Command::Embed { audio, file, key } => {
            let mut flow = EmbedFlow::new(ctx);
            if let Some(o) = observer {
                flow = flow.with_observer(o);
            }
            flow.set_audio(Some(read_input(audio).await?));
            flow.set_data(Some(read_input(file).await?));
            flow.set_credential(key);
            (flow.kind(), run(&mut flow).await?)
        }
        Command::Extract { audio, key } => {
            let mut flow = ExtractFlow::new(ctx);
            if let Some(o) = observer {
                flow = flow.with_observer(o);
            }
            flow.set_audio(Some(read_input(audio).await?));
            flow.set_credential(key);
            (flow.kind(), run(&mut flow).await?)
        }
        Command::Verify { audio, qr } => {
            let mut flow = VerifyFlow::new(ctx);
            if let Some(o) = observer {
                flow = flow.with_observer(o);
            }
            flow.set_audio(Some(read_input(audio).await?));
            flow.set_qr(Some(read_input(qr).await?));
            (flow.kind(), run(&mut flow).await?)
        }
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("Failed to serialise flow state")?
        );
    } else {
        print_state(kind, &state, cli.quiet);
    }

    Ok(exit_code(&state))
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    ClientConfig::builder()
        .base_url(&cli.base_url)
        .embed_mode(cli.mode.into())
        .request_timeout_secs(cli.timeout)
        .output_dir(&cli.output_dir)
        .overwrite(cli.overwrite)
        .fetch_links(cli.fetch_links)
        .build()
        .context("Invalid configuration")
}

async fn read_input(path: &Path) -> Result<FileSelection> {
    FileSelection::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Submit once and hand back the terminal state.
async fn run<F: Flow>(flow: &mut F) -> Result<FlowState> {
    let kind = flow.kind();
    let state = flow
        .submit()
        .await
        .with_context(|| format!("Cannot start {kind}"))?;
    Ok(state.clone())
}

fn print_state(kind: FlowKind, state: &FlowState, quiet: bool) {
    match state {
        FlowState::Succeeded(outcome) => {
            match outcome {
                FlowOutcome::Embedded { audio, qr } => {
                    println!("{}", audio.path.display());
                    if let Some(qr) = qr {
                        println!("{}", qr.path.display());
                    }
                }
                FlowOutcome::EmbedReport(report) => {
                    if let (Some(used), Some(max)) = (report.used_bytes, report.max_bytes) {
                        println!("capacity:  {used}/{max} bytes used");
                    }
                    if let Some(left) = report.remaining_bytes {
                        println!("remaining: {left} bytes");
                    }
                    if let Some(url) = &report.audio_url {
                        println!("audio:     {url}");
                    }
                    if let Some(url) = &report.qr_url {
                        println!("qr:        {url}");
                    }
                    for artifact in &report.fetched {
                        println!("{}", artifact.path.display());
                    }
                }
                FlowOutcome::Extracted(artifact) => println!("{}", artifact.path.display()),
                FlowOutcome::Verified { valid: true, .. } => {
                    println!("{}", green("valid"));
                }
                FlowOutcome::Verified { valid: false, note } => match note {
                    Some(note) => println!("{}  {}", red("not valid"), dim(note)),
                    None => println!("{}", red("not valid")),
                },
            }
            if !quiet {
                eprintln!("{} {} done", green("✔"), bold(&kind.to_string()));
            }
        }
        FlowState::Failed(detail) => {
            eprintln!("{} {} {}", red("✘"), bold(&kind.to_string()), red(&detail.to_string()));
        }
        other => {
            eprintln!("{} {} ended in state {}", cyan("⚠"), kind, other.label());
        }
    }
}

fn exit_code(state: &FlowState) -> ExitCode {
    match state {
        FlowState::Succeeded(FlowOutcome::Verified { valid: false, .. }) => ExitCode::from(2),
        FlowState::Succeeded(_) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
