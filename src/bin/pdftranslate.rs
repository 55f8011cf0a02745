//! CLI binary for pdftranslate-client.
//!
//! A thin shim over the library crate: maps CLI flags to `ClientConfig` /
//! `TranslationConfig`, drives a `TranslationController` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pdftranslate_client::config::DEFAULT_BASE_URL;
use pdftranslate_client::download::{self, DownloadOutcome};
use pdftranslate_client::presenter::format_elapsed;
use pdftranslate_client::session::TaskOutcome;
use pdftranslate_client::{
    build_form, poller, ClientConfig, FileHandle, FileId, HttpApi, PageRange, ProgressCallback,
    TaskId, TaskProgressCallback, TaskSnapshot, TaskState, TranslateApi, TranslationConfig,
    TranslationController, UploadedFile, Variant, WatermarkMode,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar from 0 to 100 % whose message tracks
/// the server's stage label and part counters.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl TaskProgressCallback for CliProgressCallback {
    fn on_upload_complete(&self, handle: &FileHandle) {
        self.bar.println(format!(
            "{} Uploaded {}  {}",
            green("✓"),
            bold(&handle.filename),
            dim(&format!("{} · {} bytes", handle.file_id, handle.size)),
        ));
        self.bar.set_prefix("Submitting");
    }

    fn on_task_started(&self, task_id: &TaskId) {
        self.bar
            .println(format!("{} Task {}", cyan("◆"), bold(&task_id.to_string())));
        self.bar.set_prefix("Translating");
        self.bar.reset_elapsed();
    }

    fn on_progress(&self, snapshot: &TaskSnapshot) {
        self.bar
            .set_position(snapshot.progress.clamp(0.0, 100.0).round() as u64);
        self.bar.set_message(stage_label(snapshot));
    }

    fn on_task_finished(&self, _task_id: &TaskId, outcome: &TaskOutcome) {
        self.bar.finish_and_clear();
        match outcome {
            TaskOutcome::Completed(result) => eprintln!(
                "{} Translation completed{}",
                green("✔"),
                result
                    .total_seconds
                    .map(|s| format!("  {}", dim(&format_elapsed(s))))
                    .unwrap_or_default()
            ),
            TaskOutcome::Failed { message } => eprintln!("{} {}", red("✘"), red(message)),
            TaskOutcome::Cancelled => eprintln!("{} Translation cancelled", cyan("⚠")),
        }
    }
}

/// `Translate Paragraphs · part 1/3 · 12/40`
fn stage_label(s: &TaskSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(stage) = s.stage.as_deref().filter(|st| !st.is_empty()) {
        parts.push(stage.to_string());
    }
    if let (Some(i), Some(n)) = (s.part_index, s.total_parts) {
        if n > 1 {
            parts.push(format!("part {i}/{n}"));
        }
    }
    if let (Some(c), Some(t)) = (s.stage_current, s.stage_total) {
        if t > 0 {
            parts.push(format!("{c}/{t}"));
        }
    }
    parts.join(" · ")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate a paper with the default service (English → Simplified Chinese)
  pdftranslate translate paper.pdf

  # Pick a service, languages and pages; write results to ./out
  pdftranslate translate paper.pdf --service claude-sonnet-4-20250514 \
      --lang-from English --lang-to Japanese --pages 1,3,5-7 -o out

  # Pass engine-specific fields from the service schema
  pdftranslate translate paper.pdf --set temperature=0.2

  # Follow, cancel, download and clean up an existing task
  pdftranslate watch 3f2a…
  pdftranslate cancel 3f2a…
  pdftranslate download 3f2a… --variant dual -o out
  pdftranslate cleanup --task 3f2a…

  # Inspect the server
  pdftranslate health
  pdftranslate services --json

ENVIRONMENT VARIABLES:
  PDFTRANSLATE_API_URL           API server root (default http://localhost:8000)
  PDFTRANSLATE_POLL_INTERVAL_MS  Status poll interval in milliseconds (default 1000)
  PDFTRANSLATE_SERVICE           Default translation service
  PDFTRANSLATE_LANG_FROM         Default source language
  PDFTRANSLATE_LANG_TO           Default target language
  RUST_LOG                       Override the log filter (e.g. pdftranslate_client=debug)

Press Ctrl-C during `translate` to cancel the running task.
"#;

/// Translate PDF documents through a pdf translation server.
#[derive(Parser, Debug)]
#[command(
    name = "pdftranslate",
    version,
    about = "Translate PDF documents through a PDF translation server",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// API server root URL.
    #[arg(long, global = true, env = "PDFTRANSLATE_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Status poll interval in milliseconds.
    #[arg(long, global = true, env = "PDFTRANSLATE_POLL_INTERVAL_MS", default_value_t = 1000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFTRANSLATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFTRANSLATE_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDFTRANSLATE_NO_PROGRESS")]
    no_progress: bool,

    /// Print machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is up.
    Health,
    /// List supported languages.
    Languages,
    /// List translation services and their configurable fields.
    Services,
    /// Upload a PDF, translate it and download the results.
    Translate(TranslateArgs),
    /// Print the current status of a task.
    Status { task: String },
    /// Follow a task until it finishes.
    Watch { task: String },
    /// Cancel a running task.
    Cancel { task: String },
    /// Download the results of a completed task.
    Download {
        task: String,
        /// Only this variant (default: every generated variant).
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Delete a task and/or an uploaded file on the server.
    Cleanup {
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        file: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct TranslateArgs {
    /// PDF file to translate.
    input: PathBuf,

    /// Output directory for translated PDFs.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Translation service (see `pdftranslate services`).
    #[arg(long, env = "PDFTRANSLATE_SERVICE", default_value = "gpt-4o-mini")]
    service: String,

    /// Source language display name.
    #[arg(long, env = "PDFTRANSLATE_LANG_FROM", default_value = "English")]
    lang_from: String,

    /// Target language display name.
    #[arg(long, env = "PDFTRANSLATE_LANG_TO", default_value = "Simplified Chinese")]
    lang_to: String,

    /// Pages: all, first, first5, or a list such as 1,3,5-7.
    #[arg(long, default_value = "all")]
    pages: String,

    /// Engine-specific field, repeatable: --set name=value.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    settings: Vec<(String, String)>,

    /// Do not produce the target-language-only PDF.
    #[arg(long)]
    no_mono: bool,

    /// Do not produce the bilingual PDF.
    #[arg(long)]
    no_dual: bool,

    /// Put the translated page first in the bilingual PDF.
    #[arg(long)]
    dual_translate_first: bool,

    /// Alternate original and translated pages in the bilingual PDF.
    #[arg(long)]
    alternating_pages: bool,

    /// Omit the watermark.
    #[arg(long)]
    no_watermark: bool,

    /// Custom prompt passed to the engine.
    #[arg(long)]
    prompt: Option<String>,

    /// Engine request concurrency.
    #[arg(long, default_value_t = 4)]
    threads: u32,

    /// Paragraphs shorter than this are left untranslated.
    #[arg(long, default_value_t = 10)]
    min_text_length: u32,

    /// Split large documents into parts of this many pages (0 = off).
    #[arg(long, default_value_t = 0)]
    max_pages_per_part: u32,

    /// Translate text inside tables.
    #[arg(long)]
    translate_table_text: bool,

    /// Enable the OCR workaround for scanned documents.
    #[arg(long)]
    ocr_workaround: bool,

    /// Skip PDF cleaning.
    #[arg(long)]
    skip_clean: bool,

    /// Favour compatibility over fidelity.
    #[arg(long)]
    enhance_compatibility: bool,

    /// Bypass the server's translation cache.
    #[arg(long)]
    ignore_cache: bool,

    /// Leave results on the server; do not download them.
    #[arg(long)]
    no_download: bool,

    /// Delete the task and uploaded file on the server afterwards.
    #[arg(long)]
    cleanup: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    Mono,
    Dual,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Mono => Variant::Mono,
            VariantArg::Dual => Variant::Dual,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    Ok((k.trim().to_string(), v.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    let config = ClientConfig::builder()
        .base_url(&cli.api_url)
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .build()
        .context("Invalid client configuration")?;
    let api = Arc::new(HttpApi::new(&config).context("Failed to create HTTP client")?);

    match &cli.command {
        Command::Health => {
            let health = api.health().await.context("Health check failed")?;
            if cli.json {
                print_json(&health)?;
            } else {
                println!(
                    "{} {}  {} active · {} completed",
                    green("●"),
                    bold(&health.status),
                    health.active_tasks,
                    health.completed_tasks
                );
            }
        }
        Command::Languages => {
            let languages = api.languages().await.context("Failed to list languages")?;
            if cli.json {
                print_json(&languages)?;
            } else {
                for l in &languages {
                    println!("{:<24} {}", l.display_name, dim(&l.code));
                }
            }
        }
        Command::Services => {
            let services = api.services().await.context("Failed to list services")?;
            if cli.json {
                print_json(&services)?;
            } else {
                for service in &services {
                    println!("{}", bold(&service.name));
                    for field in build_form(service).fields() {
                        let flag = if field.kind.is_editable() { "" } else { " (read-only)" };
                        println!(
                            "  {:<16} {}{}  {}",
                            field.name,
                            dim(&field.description),
                            dim(flag),
                            field.display_value()
                        );
                    }
                }
            }
        }
        Command::Translate(args) => {
            run_translate(&cli, args, api, config, show_progress).await?;
        }
        Command::Status { task } => {
            let snapshot = api
                .task_status(&TaskId(task.clone()))
                .await
                .with_context(|| format!("Failed to fetch status of task {task}"))?;
            if cli.json {
                print_json(&snapshot)?;
            } else {
                print_snapshot(&snapshot);
            }
        }
        Command::Watch { task } => {
            let task_id = TaskId(task.clone());
            let cb = show_progress.then(CliProgressCallback::new);
            if let Some(cb) = &cb {
                cb.on_task_started(&task_id);
            }
            let mut stream =
                poller::spawn(api.clone(), task_id.clone(), 1, config.poll_interval).into_stream();
            let mut last = None;
            while let Some(snapshot) = stream.next().await {
                match &cb {
                    Some(cb) => cb.on_progress(&snapshot),
                    None if cli.json => print_json(&snapshot)?,
                    None => print_snapshot(&snapshot),
                }
                last = Some(snapshot);
            }
            if let (Some(cb), Some(last)) = (&cb, &last) {
                cb.bar.finish_and_clear();
                print_snapshot(last);
            }
        }
        Command::Cancel { task } => {
            let ack = api
                .cancel_task(&TaskId(task.clone()))
                .await
                .with_context(|| format!("Failed to cancel task {task}"))?;
            if cli.json {
                print_json(&ack)?;
            } else {
                eprintln!("{} Task {} {}", cyan("⚠"), task, ack.status);
            }
        }
        Command::Download {
            task,
            variant,
            output_dir,
        } => {
            let task_id = TaskId(task.clone());
            let snapshot = api
                .task_status(&task_id)
                .await
                .with_context(|| format!("Failed to fetch status of task {task}"))?;
            if snapshot.status != TaskState::Completed {
                bail!("Task {task} is {:?}; nothing to download", snapshot.status);
            }
            let result = snapshot.result.as_ref();
            let prefer = config.prefer_storage_download;
            let outcomes = match variant {
                Some(v) => {
                    let v = Variant::from(*v);
                    let path = download::download_to_dir(api.as_ref(), &task_id, result, v, output_dir, prefer)
                        .await
                        .with_context(|| format!("Failed to download {v} output"))?;
                    vec![(v, DownloadOutcome::Saved(path))]
                }
                None => download::download_all(api.as_ref(), &task_id, result, output_dir, prefer)
                    .await
                    .context("Download failed")?,
            };
            report_downloads(&cli, &outcomes)?;
        }
        Command::Cleanup { task, file } => {
            if task.is_none() && file.is_none() {
                bail!("Nothing to clean up: pass --task and/or --file");
            }
            if let Some(task) = task {
                api.cleanup_task(&TaskId(task.clone()))
                    .await
                    .with_context(|| format!("Failed to clean up task {task}"))?;
                eprintln!("{} Task {} cleaned", green("✓"), task);
            }
            if let Some(file) = file {
                api.cleanup_file(&FileId(file.clone()))
                    .await
                    .with_context(|| format!("Failed to clean up file {file}"))?;
                eprintln!("{} File {} cleaned", green("✓"), file);
            }
        }
    }

    Ok(())
}

/// Upload → configure → translate → poll → download.
async fn run_translate(
    cli: &Cli,
    args: &TranslateArgs,
    api: Arc<HttpApi>,
    config: ClientConfig,
    show_progress: bool,
) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn TaskProgressCallback>)
    } else {
        None
    };

    let mut controller = TranslationController::new(api, config);
    if let Some(cb) = progress_cb {
        controller = controller.with_progress_callback(cb);
    }

    // ── Service form ─────────────────────────────────────────────────────
    controller
        .load_services()
        .await
        .context("Failed to load translation services")?;
    let form = controller
        .select_service(&args.service)
        .with_context(|| format!("Service '{}' is not offered by the server", args.service))?;
    for (name, value) in &args.settings {
        form.set_value(name, value)
            .with_context(|| format!("Invalid --set {name}"))?;
    }

    let translation = build_translation_config(args)?;

    // ── Upload ───────────────────────────────────────────────────────────
    let file = UploadedFile::from_path(&args.input)
        .with_context(|| format!("Cannot open {}", args.input.display()))?;
    controller.select_file(file).await.context("Upload failed")?;

    // ── Translate + poll ─────────────────────────────────────────────────
    let task_id = controller
        .start_translation(translation)
        .await
        .context("Failed to start translation")?;

    let finished = tokio::select! {
        r = controller.wait() => Some(r),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(finished) = finished else {
        let ack = controller.cancel().context("Failed to cancel")?;
        if !show_progress {
            eprintln!("{} Cancelling task {}…", cyan("⚠"), task_id);
        }
        match tokio::time::timeout(Duration::from_secs(5), ack.confirmed()).await {
            Ok(Ok(_)) => eprintln!("{} Server confirmed cancellation", dim("·")),
            Ok(Err(e)) => eprintln!("{} Cancel request failed: {e}", red("✘")),
            Err(_) => eprintln!("{} No cancel confirmation from server", dim("·")),
        }
        return Ok(());
    };
    let result = finished.context("Translation failed")?;
    if !show_progress && !cli.quiet {
        eprintln!(
            "{} Task {} completed{}",
            green("✔"),
            task_id,
            result
                .total_seconds
                .map(|s| format!(" in {}", format_elapsed(s)))
                .unwrap_or_default()
        );
    }

    // ── Download ─────────────────────────────────────────────────────────
    if !args.no_download {
        let outcomes = controller
            .download_all(&args.output_dir)
            .await
            .context("Download failed")?;
        report_downloads(cli, &outcomes)?;
    } else if cli.json {
        print_json(&result)?;
    } else if !cli.quiet {
        if let Some(panel) = controller.view().result {
            for d in &panel.downloads {
                let mark = if d.available { green("✓") } else { dim("–") };
                let source = if d.storage_backed { "storage" } else { "api" };
                println!("  {} {:<4} {}", mark, d.variant, dim(source));
            }
        }
    }

    if args.cleanup {
        controller
            .cleanup()
            .await
            .context("Failed to clean up server resources")?;
    }
    Ok(())
}

/// Map CLI args to `TranslationConfig`.
fn build_translation_config(args: &TranslateArgs) -> Result<TranslationConfig> {
    let pages = PageRange::parse(&args.pages)
        .with_context(|| format!("Invalid --pages '{}'", args.pages))?;
    Ok(TranslationConfig {
        service: args.service.clone(),
        lang_from: args.lang_from.clone(),
        lang_to: args.lang_to.clone(),
        pages,
        no_mono: args.no_mono,
        no_dual: args.no_dual,
        dual_translate_first: args.dual_translate_first,
        use_alternating_pages_dual: args.alternating_pages,
        watermark_output_mode: if args.no_watermark {
            WatermarkMode::NoWatermark
        } else {
            WatermarkMode::Watermarked
        },
        prompt: args.prompt.clone(),
        threads: args.threads,
        min_text_length: args.min_text_length,
        max_pages_per_part: args.max_pages_per_part,
        translate_table_text: args.translate_table_text,
        ocr_workaround: args.ocr_workaround,
        skip_clean: args.skip_clean,
        enhance_compatibility: args.enhance_compatibility,
        ignore_cache: args.ignore_cache,
        ..TranslationConfig::default()
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

fn print_snapshot(s: &TaskSnapshot) {
    let state = match s.status {
        TaskState::Running => cyan("running"),
        TaskState::Completed => green("completed"),
        TaskState::Error => red("error"),
        TaskState::Cancelled => dim("cancelled"),
    };
    println!("{state}  {:>5.1}%  {}", s.progress, stage_label(s));
    if let Some(e) = &s.error {
        println!("  {}", red(e));
    }
    if let Some(r) = &s.result {
        for v in Variant::ALL {
            let mark = if r.has(v) { green("✓") } else { dim("–") };
            println!("  {} {}", mark, v);
        }
        if let Some(secs) = r.total_seconds {
            println!("  {}", dim(&format_elapsed(secs)));
        }
    }
}

fn report_downloads(cli: &Cli, outcomes: &[(Variant, DownloadOutcome)]) -> Result<()> {
    if cli.json {
        let saved: Vec<_> = outcomes
            .iter()
            .map(|(v, o)| {
                serde_json::json!({
                    "variant": v,
                    "path": match o {
                        DownloadOutcome::Saved(p) => Some(p),
                        DownloadOutcome::NotGenerated => None,
                    },
                })
            })
            .collect();
        return print_json(&saved);
    }
    if cli.quiet {
        return Ok(());
    }
    for (variant, outcome) in outcomes {
        match outcome {
            DownloadOutcome::Saved(path) => eprintln!(
                "  {} {:<4} →  {}",
                green("✓"),
                variant,
                bold(&display_path(path))
            ),
            DownloadOutcome::NotGenerated => {
                eprintln!("  {} {:<4} {}", dim("–"), variant, dim("not generated"))
            }
        }
    }
    Ok(())
}

fn display_path(p: &Path) -> String {
    p.display().to_string()
}
