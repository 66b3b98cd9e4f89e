use std::sync::OnceLock;

use rand::rngs::OsRng;
use rand::Rng;
use regex::Regex;

use crate::error::ToolkitError;

const RANDOM_STRING_SOURCE: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890_+";

/// Generate a string of `length` characters drawn from `[a-zA-Z0-9_+]` using the OS CSPRNG.
pub fn random_string(length: usize) -> String {
    (0..length)
        .map(|_| RANDOM_STRING_SOURCE[OsRng.gen_range(0..RANDOM_STRING_SOURCE.len())] as char)
        .collect()
}

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-z0-9]+").expect("static slug pattern"))
}

/// Convert `s` into a URL safe slug: lower case, runs of anything outside
/// `[a-z0-9]` collapsed to a single `-`, no leading or trailing `-`.
pub fn slugify(s: &str) -> Result<String, ToolkitError> {
    if s.trim_matches(' ').is_empty() {
        return Err(ToolkitError::EmptySlugInput);
    }

    let lowered = s.to_lowercase();
    let slug = non_alphanumeric()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string();
    if slug.is_empty() {
        return Err(ToolkitError::EmptySlug);
    }

    Ok(slug)
}
