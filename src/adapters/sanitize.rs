//! Log redaction for clinical values and secrets.
//!
//! Formatted log lines pass through [`SanitizingMakeWriter`], which rewrites:
//! - clinical `field=value` / `field: value` pairs for the ten schema fields
//! - record identifiers (UUIDs, MRNs) and email addresses
//! - key material (contextual secrets, long hex runs, PEM private keys)
//!
//! Clinical pairs are kept only when patient-data logging has been enabled
//! with [`set_patient_data_logging`]. Identifiers and secrets are always
//! redacted.
//!
//! Input is capped at `CARDIORISK_SANITIZE_MAX_BYTES` (default 16 KiB) per
//! call; longer input is truncated and marked `[TRUNCATED]`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();

static LOG_PATIENT_DATA: AtomicBool = AtomicBool::new(false);

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

const REDACTED_FIELD: &str = "${1}=[REDACTED]";

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct Patterns {
    clinical: Rule,
    always_set: RegexSet,
    always: Vec<Rule>,
    pem: Rule,
}

/// Allow clinical field values through the log sanitizer.
pub fn set_patient_data_logging(enabled: bool) {
    LOG_PATIENT_DATA.store(enabled, Ordering::Relaxed);
}

#[must_use]
pub fn patient_data_logging() -> bool {
    LOG_PATIENT_DATA.load(Ordering::Relaxed)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("CARDIORISK_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn rule(pattern: &str, replacement: &'static str) -> Option<Rule> {
    Some(Rule {
        regex: Regex::new(pattern).ok()?,
        replacement,
    })
}

/// `None` only if a pattern fails to compile; callers then redact everything.
fn patterns() -> Option<&'static Patterns> {
    let compiled = PATTERNS.get_or_init(|| {
        let always_rules: [(&str, &'static str); 6] = [
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-UUID]",
            ),
            (r"\bMRN[:\s]?\d{6,10}\b", "[REDACTED-MRN]"),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            (
                r"(?i)\b(?:secret|password|private[_-]?key|seed|signing[_-]?key|token)\b\s*[:=]\s*[A-Za-z0-9+/]{32,}={0,2}",
                "[REDACTED-SECRET]",
            ),
            (
                r"(?i)\b(?:secret|password|private[_-]?key|seed|signing[_-]?key|token)\b\s*[:=]\s*[0-9a-fA-F]{16,}\b",
                "[REDACTED-SECRET]",
            ),
            (r"\b[0-9a-fA-F]{64,}\b", "[REDACTED-KEY]"),
        ];

        Some(Patterns {
            clinical: rule(
                r#"(?i)\b(age|sbp|chol|ldl|adiposity|obesity|tobacco|alcohol|typea|famhist)"?\s*[:=]\s*"?[A-Za-z0-9.+-]+"?"#,
                REDACTED_FIELD,
            )?,
            always_set: RegexSet::new(always_rules.iter().map(|(p, _)| *p)).ok()?,
            always: always_rules
                .iter()
                .map(|&(p, r)| rule(p, r))
                .collect::<Option<Vec<_>>>()?,
            pem: rule(
                r"(?s)-----BEGIN [A-Z0-9 ]{0,40}PRIVATE KEY-----[\s\S]{0,8192}-----END [A-Z0-9 ]{0,40}PRIVATE KEY-----",
                "[REDACTED-PEM-PRIVATE-KEY]",
            )?,
        })
    });
    compiled.as_ref()
}

/// Redact a line of log text.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with(input, max_sanitize_bytes(), patient_data_logging())
}

fn sanitize_with(input: &str, max_bytes: usize, keep_clinical: bool) -> String {
    let Some(patterns) = patterns() else {
        return "[REDACTED]\n".to_string();
    };
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in patterns.always_set.matches(prefix).into_iter() {
        let rule = &patterns.always[idx];
        result = rule.regex.replace_all(&result, rule.replacement).into_owned();
    }
    if !keep_clinical {
        result = patterns
            .clinical
            .regex
            .replace_all(&result, patterns.clinical.replacement)
            .into_owned();
    }
    if result.contains("-----BEGIN ") {
        result = patterns
            .pem
            .regex
            .replace_all(&result, patterns.pem.replacement)
            .into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
        if input.ends_with('\n') {
            result.push('\n');
        }
    }
    result
}

/// A `tracing_subscriber` writer that sanitizes each formatted line before
/// it reaches the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let sanitized = sanitize(&String::from_utf8_lossy(bytes));
        self.inner.write_all(sanitized.as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A formatter that never emits a newline must not buffer without bound.
        if self.buffer.len() > max_sanitize_bytes().saturating_mul(2) {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}
