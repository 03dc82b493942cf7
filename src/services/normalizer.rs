//! Filename normalization
//!
//! Pure text transform from a title candidate ("Artist - Title" or a raw
//! filename stem) to the output filename. The cleaning patterns run in a
//! fixed order, each substitution feeding the next, all case-insensitive.
//! No I/O happens here; identical input always yields identical output.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static DOUBLE_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"--").unwrap());

static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Leading 1-3 character tracker prefix ("01-", "a2.", "b - ") ahead of the
/// real title.
static TRACKER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-c0-9]{1,3}[\s\-_.]+").unwrap());

/// Embedded website/advertisement token, parenthesized or bare, keyed on a
/// top-level-domain fragment.
static WEBSITE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(*(?:_-\s)*(?:www\.*)*-*[a-z0-9(\-]+\.[\[(]*(?:net|com|org|ru)[)\]]*\d*")
        .unwrap()
});

/// Short 2-3 character token glued to the final dot ("-mix.", "_xy.").
static PRE_DOT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[-_)]+[a-z0-9]{2,3}\.").unwrap());

/// Release-group marker with its adjoining dash/underscore.
static SIBERIA_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[-_]*siberia").unwrap());

/// Clean a title candidate and reattach the extension.
///
/// `candidate` is the filename stem or an "Artist - Title" string; `extension`
/// is reappended unchanged (including its leading dot).
pub fn normalize(candidate: &str, extension: &str) -> String {
    let name = DOUBLE_DASH.replace_all(candidate, " - ");
    let name = UNDERSCORES.replace_all(&name, " ");
    let name = TRACKER_PREFIX.replace(&name, "");
    let name = WEBSITE_TOKEN.replace_all(&name, "");
    // A token preceded by ")-" is part of a legitimate parenthesized suffix,
    // not junk; leave those alone.
    let name = PRE_DOT_TOKEN.replace_all(&name, |caps: &Captures| {
        let matched = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if matched.starts_with(")-") {
            matched.to_string()
        } else {
            ".".to_string()
        }
    });
    let name = SIBERIA_MARKER.replace_all(&name, "");

    format!("{}{}", title_case(name.trim()), extension)
}

/// Capitalize the first letter of every word, lowercase the rest. Word
/// boundaries are any non-alphabetic character, digits included.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}
