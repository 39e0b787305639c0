//! Version string normalization, ordering and current-version resolution.
//!
//! Vendors publish versions in every shape imaginable: `v2.3.1`,
//! `cobra_v125`, `Release 14`, `Config 2025`. The functions here turn those
//! strings into something comparable and pick the authoritative "current"
//! release out of a product's history.

use std::cmp::Ordering;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Leading marker stripped by [`normalize_version`] when a digit follows.
static NORMALIZE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:version|release|ver|v|r)\s*(\d.*)$").expect("valid regex")
});

/// Leading marker stripped by [`compare_versions`] when a digit follows.
static COMPARE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:version|v|r)\s*(\d.*)$").expect("valid regex"));

/// Prerelease channel markers recognised by [`is_beta_version`].
const PRERELEASE_TAGS: &[&str] = &["alpha", "beta", "rc", "preview", "pre", "dev", "canary"];

// ---------------------------------------------------------------------------
// VersionClassification
// ---------------------------------------------------------------------------

/// Semantic size of a release as reported by the extraction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionClassification {
    Major,
    Minor,
    Patch,
}

impl VersionClassification {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionClassification::Major => "major",
            VersionClassification::Minor => "minor",
            VersionClassification::Patch => "patch",
        }
    }

    /// Parse a stored or model-provided value. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Some(VersionClassification::Major),
            "minor" => Some(VersionClassification::Minor),
            "patch" => Some(VersionClassification::Patch),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Build the case-insensitive product-name prefix pattern.
///
/// The product's words may be joined by `_`, `-` or whitespace in the raw
/// version, and may be followed by a `v` / `version` token.
fn product_prefix_pattern(product_name: &str) -> Option<Regex> {
    let words: Vec<String> = product_name
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();

    if words.is_empty() {
        return None;
    }

    let name = words.join(r"[\s_-]*");
    Regex::new(&format!(r"(?i)^{name}[\s_-]*(?:version|v)?[\s_-]*(\d.*)$")).ok()
}

/// Clean a raw version string scraped for `product_name`.
///
/// Strips a product-name prefix (`cobra_v125` for "Cobra" becomes `125`),
/// then a leading `v`/`r`/`version`/`ver`/`release` token directly in front
/// of a digit (`v2.3.1` becomes `2.3.1`). Anything else is returned trimmed
/// but otherwise unchanged.
pub fn normalize_version(raw: &str, product_name: &str) -> String {
    let mut cleaned = raw.trim().to_string();

    if let Some(re) = product_prefix_pattern(product_name) {
        if let Some(rest) = re.captures(&cleaned).and_then(|c| c.get(1)) {
            cleaned = rest.as_str().to_string();
        }
    }

    if let Some(rest) = NORMALIZE_TOKEN_RE.captures(&cleaned).and_then(|c| c.get(1)) {
        cleaned = rest.as_str().to_string();
    }

    cleaned.trim().to_string()
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// A version split into numeric components and an optional prerelease tag.
#[derive(Debug, PartialEq, Eq)]
struct ParsedVersion<'a> {
    components: Vec<u64>,
    prerelease: Option<&'a str>,
}

impl<'a> ParsedVersion<'a> {
    fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        let stripped = COMPARE_TOKEN_RE
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(trimmed);

        let (main, prerelease) = match stripped.find(|c: char| c == '-' || c == '_') {
            Some(idx) => (&stripped[..idx], Some(&stripped[idx + 1..])),
            None => (stripped, None),
        };

        let components = main
            .split('.')
            .map(|seg| seg.trim().parse::<u64>().unwrap_or(0))
            .collect();

        Self {
            components,
            prerelease: prerelease.filter(|p| !p.is_empty()),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }

        match (self.prerelease, other.prerelease) {
            (None, None) => Ordering::Equal,
            // A final release outranks any prerelease of the same version.
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

/// Compare two version strings.
///
/// Numeric dotted components are compared left to right with missing
/// trailing components treated as `0`, so `1.0` equals `1.0.0`. When the
/// numeric parts tie, a version without a prerelease suffix ranks above one
/// with a suffix, and two suffixes compare lexicographically. Empty strings
/// sort lowest.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.trim().is_empty(), b.trim().is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => ParsedVersion::parse(a).compare(&ParsedVersion::parse(b)),
    }
}

/// [`compare_versions`] for nullable columns. `None` sorts lowest.
pub fn compare_versions_opt(a: Option<&str>, b: Option<&str>) -> Ordering {
    compare_versions(a.unwrap_or(""), b.unwrap_or(""))
}

// ---------------------------------------------------------------------------
// Channel filtering
// ---------------------------------------------------------------------------

/// Whether the version's prerelease segment marks an early-access build.
pub fn is_beta_version(version: &str) -> bool {
    let Some(prerelease) = ParsedVersion::parse(version).prerelease else {
        return false;
    };
    let prerelease = prerelease.to_ascii_lowercase();
    PRERELEASE_TAGS
        .iter()
        .any(|tag| prerelease.starts_with(tag))
}

/// Decide whether a version belongs to the channel this product does not
/// track.
///
/// Products whose name contains "beta" follow the beta channel, so stable
/// releases are ignored for them. Every other product ignores betas.
pub fn should_ignore_version(software_name: &str, version: &str) -> bool {
    let tracks_beta = software_name.to_ascii_lowercase().contains("beta");
    let is_beta = is_beta_version(version);
    if tracks_beta {
        !is_beta
    } else {
        is_beta
    }
}

/// Whether a version string starts with a digit once any leading marker is
/// removed.
pub fn looks_numeric(version: &str) -> bool {
    let trimmed = version.trim();
    let stripped = COMPARE_TOKEN_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);
    stripped.starts_with(|c: char| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Current version resolution
// ---------------------------------------------------------------------------

/// Read access to a version history row, implemented by the database model.
pub trait VersionRecord {
    fn version(&self) -> &str;
    fn release_date(&self) -> Option<NaiveDate>;
    fn detected_at(&self) -> Timestamp;
    fn is_verified(&self) -> bool;
    fn is_current_override(&self) -> bool;
}

/// Pick the authoritative current version from a product's history.
///
/// 1. A row with an active manual override always wins.
/// 2. If every version looks numeric, the highest by [`compare_versions`].
/// 3. Otherwise (name-based versions such as `Config 2025`), the row with the
///    latest release date, falling back to the detection date.
///
/// With `only_verified`, unverified rows are discarded first.
pub fn current_version_from_history<R: VersionRecord>(
    history: &[R],
    only_verified: bool,
) -> Option<&R> {
    let candidates: Vec<&R> = history
        .iter()
        .filter(|r| !only_verified || r.is_verified())
        .collect();

    if candidates.is_empty() {
        return None;
    }

    if let Some(overridden) = candidates.iter().find(|r| r.is_current_override()) {
        return Some(*overridden);
    }

    if candidates.iter().all(|r| looks_numeric(r.version())) {
        return candidates.into_iter().max_by(|a, b| {
            compare_versions(a.version(), b.version())
                .then_with(|| a.detected_at().cmp(&b.detected_at()))
        });
    }

    candidates.into_iter().max_by_key(|r| {
        (
            r.release_date()
                .unwrap_or_else(|| r.detected_at().date_naive()),
            r.detected_at(),
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
