//! The translation request payload (`config` in `POST /api/translate`).
//!
//! [`TranslationConfig`] carries the fixed set of options the server
//! recognises plus an open-ended `engine_settings` map whose keys come from
//! the selected service's schema at runtime (see [`crate::form`]).

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar value of an engine-specific field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PrimitiveValue {
    /// Convert a JSON default into a primitive, if it is one.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Which pages of the document to translate.
///
/// On the wire this is two fields: `page_range` (the selector name) and
/// `page_input` (the explicit page string, `null` unless the selector is
/// `Range`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "PagesWire", into = "PagesWire")]
pub enum PageRange {
    /// Every page (default).
    #[default]
    All,
    /// The first page only.
    First,
    /// The first five pages.
    FirstFive,
    /// An explicit page list such as `"1,3,5-7"` (1-indexed).
    Range(String),
}

impl PageRange {
    /// Selector name as the server expects it.
    pub fn selector(&self) -> &'static str {
        match self {
            PageRange::All => "All",
            PageRange::First => "First",
            PageRange::FirstFive => "First 5 pages",
            PageRange::Range(_) => "Range",
        }
    }

    /// The explicit page string; `Some` only for [`PageRange::Range`].
    pub fn page_input(&self) -> Option<&str> {
        match self {
            PageRange::Range(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Build from the wire pair, enforcing the `page_input` invariant.
    pub fn from_parts(selector: &str, page_input: Option<&str>) -> Result<Self, ValidationError> {
        let input = page_input.map(str::trim).filter(|s| !s.is_empty());
        match (selector, input) {
            ("Range", Some(pages)) => Ok(PageRange::Range(pages.to_string())),
            ("Range", None) => Err(ValidationError::MissingPageInput),
            (_, Some(_)) => Err(ValidationError::UnexpectedPageInput),
            ("All", None) => Ok(PageRange::All),
            ("First", None) => Ok(PageRange::First),
            ("First 5 pages", None) => Ok(PageRange::FirstFive),
            (other, None) => Err(ValidationError::InvalidPageInput {
                input: other.to_string(),
            }),
        }
    }

    /// Parse a CLI-style selector: `all`, `first`, `first5`, or a page list.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        let range = match trimmed.to_lowercase().as_str() {
            "all" => PageRange::All,
            "first" => PageRange::First,
            "first5" | "first 5 pages" => PageRange::FirstFive,
            _ => PageRange::Range(trimmed.to_string()),
        };
        range.validate()?;
        Ok(range)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            PageRange::Range(pages) if pages.trim().is_empty() => {
                Err(ValidationError::MissingPageInput)
            }
            PageRange::Range(pages) if !RE_PAGE_LIST.is_match(pages) => {
                Err(ValidationError::InvalidPageInput {
                    input: pages.clone(),
                })
            }
            PageRange::Range(pages) if !ranges_ascending(pages) => {
                Err(ValidationError::InvalidPageInput {
                    input: pages.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

static RE_PAGE_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[1-9]\d*(\s*-\s*[1-9]\d*)?(\s*,\s*[1-9]\d*(\s*-\s*[1-9]\d*)?)*\s*$").unwrap()
});

/// Every `a-b` item in the list has `a <= b`.
fn ranges_ascending(pages: &str) -> bool {
    pages.split(',').all(|item| match item.split_once('-') {
        Some((a, b)) => match (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
            (Ok(a), Ok(b)) => a <= b,
            _ => false,
        },
        None => true,
    })
}

#[derive(Serialize, Deserialize)]
struct PagesWire {
    #[serde(default = "default_selector")]
    page_range: String,
    #[serde(default)]
    page_input: Option<String>,
}

fn default_selector() -> String {
    "All".to_string()
}

impl TryFrom<PagesWire> for PageRange {
    type Error = ValidationError;

    fn try_from(w: PagesWire) -> Result<Self, Self::Error> {
        PageRange::from_parts(&w.page_range, w.page_input.as_deref())
    }
}

impl From<PageRange> for PagesWire {
    fn from(r: PageRange) -> Self {
        PagesWire {
            page_range: r.selector().to_string(),
            page_input: r.page_input().map(str::to_string),
        }
    }
}

/// Watermark applied to generated PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WatermarkMode {
    #[default]
    Watermarked,
    #[serde(rename = "No Watermark")]
    NoWatermark,
}

/// Options for one translation job.
///
/// Field names and defaults mirror the server's request model; unknown
/// engine-specific options go into [`TranslationConfig::engine_settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    // ── Service ───────────────────────────────────────────────────────────
    /// Translation service name as listed by `GET /api/services`.
    pub service: String,
    /// Source language display name (e.g. "English").
    pub lang_from: String,
    /// Target language display name (e.g. "Simplified Chinese").
    pub lang_to: String,

    // ── Pages ─────────────────────────────────────────────────────────────
    #[serde(flatten)]
    pub pages: PageRange,

    // ── Output ────────────────────────────────────────────────────────────
    pub no_mono: bool,
    pub no_dual: bool,
    pub dual_translate_first: bool,
    pub use_alternating_pages_dual: bool,
    pub watermark_output_mode: WatermarkMode,

    // ── Translation ───────────────────────────────────────────────────────
    pub prompt: Option<String>,
    /// Requests per second / worker threads for the engine. Default: 4.
    pub threads: u32,
    /// Paragraphs shorter than this are left untranslated. Default: 10.
    pub min_text_length: u32,
    pub rpc_doclayout: Option<String>,
    pub custom_system_prompt_input: Option<String>,
    pub pool_max_workers: Option<u32>,
    pub no_auto_extract_glossary: bool,
    /// Font override; "Auto" lets the engine decide.
    pub primary_font_family: String,

    // ── PDF processing ────────────────────────────────────────────────────
    pub skip_clean: bool,
    pub disable_rich_text_translate: bool,
    pub enhance_compatibility: bool,
    pub split_short_lines: bool,
    pub short_line_split_factor: f32,
    pub translate_table_text: bool,
    pub skip_scanned_detection: bool,
    pub ocr_workaround: bool,
    pub auto_enable_ocr_workaround: bool,
    /// Split large documents into parts of this many pages; 0 disables.
    pub max_pages_per_part: u32,
    pub formular_font_pattern: Option<String>,
    pub formular_char_pattern: Option<String>,
    pub ignore_cache: bool,

    // ── Engine-specific ───────────────────────────────────────────────────
    pub engine_settings: BTreeMap<String, PrimitiveValue>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            service: "gpt-4o-mini".to_string(),
            lang_from: "English".to_string(),
            lang_to: "Simplified Chinese".to_string(),
            pages: PageRange::All,
            no_mono: false,
            no_dual: false,
            dual_translate_first: false,
            use_alternating_pages_dual: false,
            watermark_output_mode: WatermarkMode::Watermarked,
            prompt: None,
            threads: 4,
            min_text_length: 10,
            rpc_doclayout: None,
            custom_system_prompt_input: None,
            pool_max_workers: None,
            no_auto_extract_glossary: false,
            primary_font_family: "Auto".to_string(),
            skip_clean: false,
            disable_rich_text_translate: false,
            enhance_compatibility: false,
            split_short_lines: false,
            short_line_split_factor: 0.5,
            translate_table_text: false,
            skip_scanned_detection: false,
            ocr_workaround: false,
            auto_enable_ocr_workaround: false,
            max_pages_per_part: 0,
            formular_font_pattern: None,
            formular_char_pattern: None,
            ignore_cache: false,
            engine_settings: BTreeMap::new(),
        }
    }
}

impl TranslationConfig {
    /// Check the local invariants before the config is submitted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pages.validate()?;
        if self.no_mono && self.no_dual {
            return Err(ValidationError::NoOutputSelected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_input_is_null_unless_range() {
        let cfg = TranslationConfig::default();
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["page_range"], "All");
        assert!(v["page_input"].is_null());

        let cfg = TranslationConfig {
            pages: PageRange::Range("1,3,5-7".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["page_range"], "Range");
        assert_eq!(v["page_input"], "1,3,5-7");
    }

    #[test]
    fn wire_names_match_server_model() {
        let cfg = TranslationConfig {
            pages: PageRange::FirstFive,
            watermark_output_mode: WatermarkMode::NoWatermark,
            ..Default::default()
        };
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["page_range"], "First 5 pages");
        assert_eq!(v["watermark_output_mode"], "No Watermark");
        assert_eq!(v["threads"], 4);
        assert_eq!(v["primary_font_family"], "Auto");
        assert_eq!(v["engine_settings"], json!({}));
    }

    #[test]
    fn deserialize_rejects_range_without_pages() {
        let r: Result<TranslationConfig, _> =
            serde_json::from_value(json!({"page_range": "Range"}));
        assert!(r.is_err());
    }

    #[test]
    fn deserialize_missing_fields_uses_defaults() {
        let cfg: TranslationConfig = serde_json::from_value(json!({
            "service": "claude-sonnet-4-20250514",
            "page_range": "First"
        }))
        .unwrap();
        assert_eq!(cfg.pages, PageRange::First);
        assert_eq!(cfg.lang_to, "Simplified Chinese");
        assert_eq!(cfg.min_text_length, 10);
    }

    #[test]
    fn parse_page_selectors() {
        assert_eq!(PageRange::parse("all").unwrap(), PageRange::All);
        assert_eq!(PageRange::parse("First").unwrap(), PageRange::First);
        assert_eq!(PageRange::parse("first5").unwrap(), PageRange::FirstFive);
        assert_eq!(
            PageRange::parse("1, 3, 5-7").unwrap(),
            PageRange::Range("1, 3, 5-7".into())
        );
        assert!(PageRange::parse("0").is_err());
        assert!(PageRange::parse("3-1").is_err());
        assert!(PageRange::parse("1,,2").is_err());
        assert!(PageRange::parse("pages").is_err());
    }

    #[test]
    fn from_parts_enforces_invariant() {
        assert_eq!(
            PageRange::from_parts("Range", None),
            Err(ValidationError::MissingPageInput)
        );
        assert_eq!(
            PageRange::from_parts("All", Some("1-2")),
            Err(ValidationError::UnexpectedPageInput)
        );
        assert_eq!(PageRange::from_parts("All", Some("  ")), Ok(PageRange::All));
    }

    #[test]
    fn validate_rejects_no_outputs() {
        let cfg = TranslationConfig {
            no_mono: true,
            no_dual: true,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ValidationError::NoOutputSelected));
    }

    #[test]
    fn primitive_from_json() {
        assert_eq!(
            PrimitiveValue::from_json(&json!(3)),
            Some(PrimitiveValue::Int(3))
        );
        assert_eq!(
            PrimitiveValue::from_json(&json!(0.5)),
            Some(PrimitiveValue::Float(0.5))
        );
        assert_eq!(PrimitiveValue::from_json(&json!({"a": 1})), None);
        assert_eq!(PrimitiveValue::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn engine_settings_serialize_untagged() {
        let mut cfg = TranslationConfig::default();
        cfg.engine_settings
            .insert("temperature".into(), PrimitiveValue::Float(0.2));
        cfg.engine_settings
            .insert("stream".into(), PrimitiveValue::Bool(false));
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["engine_settings"], json!({"stream": false, "temperature": 0.2}));
    }
}
