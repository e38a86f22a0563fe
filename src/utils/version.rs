// Loose version comparison

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static COMPONENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+|[a-z]+|\.").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionComponent {
    /// Digit run without leading zeros (`"0"` for all zeros), so any length
    /// compares without overflow.
    Number(String),
    Text(String),
}

impl VersionComponent {
    fn number(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        Self::Number(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    }

    /// `None` when a number meets text.
    fn try_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                Some(a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            }
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Split a version string into numeric and text components.
///
/// Digit runs, lowercase letter runs, and whatever lies between them become
/// components; dots only separate. `"1.10rc1"` is `[1, 10, "rc", 1]`.
pub fn parse_loose_version(version: &str) -> Vec<VersionComponent> {
    let mut components = Vec::new();
    let mut push = |raw: &str| {
        if raw.is_empty() || raw == "." {
            return;
        }
        components.push(if raw.bytes().all(|b| b.is_ascii_digit()) {
            VersionComponent::number(raw)
        } else {
            VersionComponent::Text(raw.to_string())
        });
    };

    let mut last = 0;
    for m in COMPONENT_RE.find_iter(version) {
        push(&version[last..m.start()]);
        push(m.as_str());
        last = m.end();
    }
    push(&version[last..]);
    components
}

/// Compare two loose versions; `None` if the first differing components
/// have incomparable kinds.
pub fn compare_loose_versions(a: &str, b: &str) -> Option<Ordering> {
    let a = parse_loose_version(a);
    let b = parse_loose_version(b);

    for (left, right) in a.iter().zip(b.iter()) {
        if left != right {
            return left.try_cmp(right);
        }
    }
    Some(a.len().cmp(&b.len()))
}

/// Whether `version >= check`.
///
/// Dev and prerelease tags can make the comparison meaningless (a number
/// against text); the dependency is then assumed satisfied.
pub fn check_version(version: &str, check: &str) -> bool {
    compare_loose_versions(version, check).is_none_or(|ord| ord != Ordering::Less)
}
