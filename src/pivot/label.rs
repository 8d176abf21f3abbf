use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Natural label key
// ---------------------------------------------------------------------------

/// Sort key for sample labels and column names: a case-insensitive
/// non-numeric prefix plus the value of a trailing number, so `"Fe 2"`
/// sorts before `"Fe 10"` and both before `"Na 1"`.
///
/// Row order in pivot output never comes from this key (rows keep
/// first-seen order); it is used for column order and offered to callers
/// that want human-friendly label lists.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelKey {
    pub prefix: String,
    pub number: Option<f64>,
    /// Original string, lowercased, as the final tie-breaker.
    pub full: String,
}

/// Split `x` into its natural sort key.
pub fn label_key(x: &str) -> LabelKey {
    let trimmed = x.trim();
    let digits_start = trimmed
        .rfind(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|i| i + trimmed[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);

    let (prefix, tail) = trimmed.split_at(digits_start.min(trimmed.len()));
    let number = if tail.is_empty() {
        None
    } else {
        tail.parse::<f64>().ok()
    };

    LabelKey {
        prefix: prefix.trim_end().to_lowercase(),
        number,
        full: trimmed.to_lowercase(),
    }
}

impl Eq for LabelKey {}

impl PartialOrd for LabelKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LabelKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then_with(|| match (self.number, other.number) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                // unnumbered sorts before numbered within the same prefix
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.full.cmp(&other.full))
    }
}

/// Sort strings in place by their natural label key.
pub fn sort_by_label_key<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| label_key(a.as_ref()).cmp(&label_key(b.as_ref())));
}
