use std::collections::BTreeSet;

/// Prefix for opponents that resolve against no roster.
pub const EXTERNAL_PREFIX: &str = "ext::";

/// Club-suffix tokens that carry no identity: "Phoenix Rising FC" and
/// "Phoenix Rising Soccer Club" are the same team.
const SUFFIX_TOKENS: &[&str] = &["fc", "sc", "cf", "afc", "sa", "club", "soccer", "futbol"];

/// Abbreviations folded only in the matcher's normalized tier, not in the
/// canonical key, so an abbreviated listing still matches at reduced
/// confidence rather than colliding silently at full confidence.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("phx", "phoenix"),
    ("utd", "united"),
    ("acad", "academy"),
    ("ath", "athletic"),
    ("intl", "international"),
];

fn tokenize(raw: &str) -> Vec<String> {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

/// Canonical team key: lowercased, punctuation-stripped, club suffixes folded,
/// tokens sorted. Idempotent by construction.
pub fn normalize(raw: &str) -> String {
    let tokens = tokenize(raw);
    let mut kept: Vec<String> = tokens
        .iter()
        .filter(|t| !SUFFIX_TOKENS.contains(&t.as_str()))
        .cloned()
        .collect();
    // a name made entirely of suffix tokens keeps them rather than vanishing
    if kept.is_empty() {
        kept = tokens;
    }
    kept.sort();
    kept.join(" ")
}

fn is_age_gender_token(token: &str) -> bool {
    if token == "b" || token == "g" || token == "boys" || token == "girls" {
        return true;
    }
    // u11, u13 ...
    if let Some(rest) = token.strip_prefix('u') {
        if !rest.is_empty() && rest.len() <= 2 && rest.chars().all(|c| c.is_ascii_digit()) {
            return true;
        }
    }
    // 14b, 07g ...
    if token.len() >= 2 && token.len() <= 3 {
        let (digits, tail) = token.split_at(token.len() - 1);
        if (tail == "b" || tail == "g") && digits.chars().all(|c| c.is_ascii_digit()) {
            return true;
        }
    }
    false
}

/// Further reduction applied by the matcher's normalized tier: strips
/// age/gender tokens and expands common club abbreviations.
pub fn reduce(key: &str) -> String {
    let mut tokens: Vec<String> = normalize(key)
        .split_whitespace()
        .filter(|t| !is_age_gender_token(t))
        .map(|t| {
            ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == t)
                .map(|(_, full)| full.to_string())
                .unwrap_or_else(|| t.to_string())
        })
        .collect();
    if tokens.is_empty() {
        return normalize(key);
    }
    tokens.sort();
    tokens.join(" ")
}

/// Token-set similarity: intersection-over-union on whitespace tokens.
pub fn token_set_similarity(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Key for a synthesized external team.
pub fn external_key(raw: &str) -> String {
    format!("{}{}", EXTERNAL_PREFIX, normalize(raw))
}

pub fn is_external_key(key: &str) -> bool {
    key.starts_with(EXTERNAL_PREFIX)
}
