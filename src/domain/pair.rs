//! Pair naming helpers.
//!
//! Exchanges spell pairs differently (`ETH/DAI`, `ETH_DAI`, `eth-dai`). The
//! canonical foreign name used everywhere downstream is `BASE-QUOTE`.

use super::error::ScraperError;

/// Separator of the canonical `BASE-QUOTE` form.
pub const PAIR_SEPARATOR: char = '-';

/// Split `name` on `separator` into exactly two non-empty components.
pub fn split_pair(name: &str, separator: char) -> Result<(&str, &str), ScraperError> {
    let mut parts = name.split(separator);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(base), Some(quote), None) if !base.trim().is_empty() && !quote.trim().is_empty() => {
            Ok((base.trim(), quote.trim()))
        }
        _ => Err(ScraperError::InvalidPair(name.to_string())),
    }
}

/// Join base and quote into the canonical form.
pub fn canonical_name(base: &str, quote: &str) -> String {
    format!("{base}{PAIR_SEPARATOR}{quote}")
}

/// Rewrite a native pair name into the canonical form.
///
/// Idempotent: a name already in `BASE-QUOTE` form is returned unchanged.
pub fn canonicalize(name: &str, native_separator: char) -> Result<String, ScraperError> {
    let (base, quote) = if name.contains(native_separator) {
        split_pair(name, native_separator)?
    } else {
        split_pair(name, PAIR_SEPARATOR)?
    };
    Ok(canonical_name(base, quote))
}

/// Base component of a canonical foreign name, if it has one.
pub fn base_of(foreign_name: &str) -> Option<&str> {
    split_pair(foreign_name, PAIR_SEPARATOR).ok().map(|(base, _)| base)
}
