//! Presenter: derive what the user sees from session state.
//!
//! The presenter performs no I/O. [`Presenter::render`] turns the session,
//! the current form and the live banners into a [`ViewModel`] that a
//! front-end (the CLI, a TUI, a GUI) draws as it likes.
//!
//! Banners are transient: errors stay visible for 5 s, successes and
//! informational notices for 3 s (configurable). At most one banner of each
//! kind exists at a time; a new banner replaces the previous one of its kind.

use crate::api::{TaskSnapshot, Variant};
use crate::config::ClientConfig;
use crate::form::{FieldKind, FormModel};
use crate::session::{Phase, SessionState, TaskOutcome};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BannerKind {
    Error,
    Success,
    /// Non-alarming notices such as a cancellation.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
    shown_at: Instant,
    ttl: Duration,
}

impl Banner {
    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < self.ttl
    }
}

#[derive(Debug)]
pub struct Presenter {
    banners: BTreeMap<BannerKind, Banner>,
    error_ttl: Duration,
    success_ttl: Duration,
    info_ttl: Duration,
    prefer_storage: bool,
}

impl Presenter {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            banners: BTreeMap::new(),
            error_ttl: config.error_banner_ttl,
            success_ttl: config.success_banner_ttl,
            info_ttl: config.info_banner_ttl,
            prefer_storage: config.prefer_storage_download,
        }
    }

    /// Show a banner, replacing any banner of the same kind.
    pub fn show(&mut self, kind: BannerKind, message: impl Into<String>) {
        let ttl = match kind {
            BannerKind::Error => self.error_ttl,
            BannerKind::Success => self.success_ttl,
            BannerKind::Info => self.info_ttl,
        };
        self.banners.insert(
            kind,
            Banner {
                kind,
                message: message.into(),
                shown_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.show(BannerKind::Error, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.show(BannerKind::Success, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.show(BannerKind::Info, message);
    }

    pub fn dismiss(&mut self, kind: BannerKind) {
        self.banners.remove(&kind);
    }

    /// Banners that have not yet expired, errors first.
    pub fn visible_banners(&self) -> Vec<&Banner> {
        let now = Instant::now();
        self.banners.values().filter(|b| b.is_visible(now)).collect()
    }

    /// Build the full view model.
    pub fn render(&self, session: &SessionState, form: Option<&FormModel>) -> ViewModel {
        let phase = session.phase();
        ViewModel {
            phase,
            upload_enabled: matches!(phase, Phase::Idle | Phase::ReadyToTranslate)
                || phase.is_terminal(),
            translate_enabled: phase == Phase::ReadyToTranslate && session.file_handle().is_some(),
            cancel_enabled: phase == Phase::Running,
            file: session.selected_file().map(|f| FileView {
                filename: f.filename.clone(),
                size: format_size(f.size),
            }),
            form: form.map(render_form).unwrap_or_default(),
            progress: session
                .snapshot()
                .filter(|_| phase != Phase::Idle)
                .map(render_progress),
            result: match session.outcome() {
                Some(TaskOutcome::Completed(result)) => Some(ResultView {
                    downloads: Variant::ALL
                        .iter()
                        .map(|&variant| DownloadView {
                            variant,
                            available: result.has(variant),
                            storage_backed: self.prefer_storage
                                && result.storage_url(variant).is_some(),
                        })
                        .collect(),
                    elapsed: result.total_seconds.map(format_elapsed),
                }),
                _ => None,
            },
            banners: self
                .visible_banners()
                .into_iter()
                .map(|b| BannerView {
                    kind: b.kind,
                    message: b.message.clone(),
                })
                .collect(),
        }
    }
}

// ── View model ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub phase: Phase,
    pub upload_enabled: bool,
    pub translate_enabled: bool,
    pub cancel_enabled: bool,
    pub file: Option<FileView>,
    pub form: Vec<FieldView>,
    pub progress: Option<ProgressView>,
    pub result: Option<ResultView>,
    pub banners: Vec<BannerView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileView {
    pub filename: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub value: String,
    pub editable: bool,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    /// 0–100, clamped.
    pub percent: f64,
    pub stage: String,
    /// "Part 2/3" for multi-part documents.
    pub part: Option<String>,
    /// "12/40" within the current stage.
    pub stage_counter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub downloads: Vec<DownloadView>,
    /// Elapsed time, e.g. "23.50 秒".
    pub elapsed: Option<String>,
}

impl ResultView {
    pub fn download(&self, variant: Variant) -> Option<&DownloadView> {
        self.downloads.iter().find(|d| d.variant == variant)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadView {
    pub variant: Variant,
    pub available: bool,
    /// Served straight from object storage rather than through the API.
    pub storage_backed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerView {
    pub kind: BannerKind,
    pub message: String,
}

fn render_form(form: &FormModel) -> Vec<FieldView> {
    form.fields()
        .iter()
        .map(|f| FieldView {
            name: f.name.clone(),
            label: if f.description.is_empty() {
                f.name.clone()
            } else {
                f.description.clone()
            },
            kind: f.kind.clone(),
            value: f.display_value(),
            editable: f.kind.is_editable(),
            required: f.required,
        })
        .collect()
}

fn render_progress(s: &TaskSnapshot) -> ProgressView {
    let part = match (s.part_index, s.total_parts) {
        (Some(i), Some(n)) if n > 1 => Some(format!("Part {i}/{n}")),
        _ => None,
    };
    let stage_counter = match (s.stage_current, s.stage_total) {
        (Some(c), Some(t)) if t > 0 => Some(format!("{c}/{t}")),
        _ => None,
    };
    ProgressView {
        percent: s.progress.clamp(0.0, 100.0),
        stage: s.stage.clone().unwrap_or_default(),
        part,
        stage_counter,
    }
}

/// Human-readable size: `2.00 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Elapsed translation time as shown in the stats panel: `23.50 秒`.
pub fn format_elapsed(seconds: f64) -> String {
    format!("{seconds:.2} 秒")
}
