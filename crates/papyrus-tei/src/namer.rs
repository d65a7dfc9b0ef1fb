//! Output file naming.
//!
//! Derives a filesystem-safe, length-bounded name from a document title:
//! lowercase, whitespace runs become single underscores, everything else
//! non-alphanumeric is dropped, the base is capped and a fixed suffix is
//! appended. Total over all inputs; an empty or fully non-alphanumeric
//! title degenerates to the bare suffix.

/// Fixed suffix appended to every generated name.
pub const NAME_SUFFIX: &str = ".json";

/// Maximum length of the base name, before the suffix.
pub const MAX_BASE_LEN: usize = 250;

/// Derive the output file name for a document title.
pub fn file_name_for(title: &str) -> String {
    let mut base = String::new();

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            base.extend(ch.to_lowercase());
        } else if (ch.is_whitespace() || ch == '_') && !base.is_empty() && !base.ends_with('_') {
            base.push('_');
        }
    }

    while base.len() > MAX_BASE_LEN {
        base.pop();
    }
    while base.ends_with('_') {
        base.pop();
    }

    format!("{base}{NAME_SUFFIX}")
}
