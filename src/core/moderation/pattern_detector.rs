// Pattern heuristics that run independently of the lexicon.
//
// Both checks are pure functions over the submitted text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Share of all tokens that may be shouted before a comment is flagged.
const CAPS_TOKEN_RATIO: f64 = 0.3;
/// Tokens this short ("I", "OK", "TV") never count as shouting.
const MIN_CAPS_TOKEN_LEN: usize = 3;

static SPAM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Bare links
        r"(?i)\bhttps?://\S+",
        r"(?i)\bwww\.\S+",
        // Stock spam phrases
        r"(?i)\b(buy now|click here|free money|act now|limited time offer|work from home|make money fast|earn \$?\d+ (a|per) (day|week|hour))\b",
        // URL shorteners
        r"(?i)\b(bit\.ly|tinyurl\.com|goo\.gl|t\.co|ow\.ly|is\.gd|buff\.ly|cutt\.ly)/\S*",
        // Pharma
        r"(?i)\b(viagra|cialis|levitra|xanax|valium|tramadol|oxycodone|online pharmacy)\b",
    ]
    .iter()
    .filter_map(|p| match Regex::new(p) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(pattern = %p, error = %e, "Invalid spam pattern");
            None
        }
    })
    .collect()
});

/// True if the text matches any of the fixed spam patterns.
pub fn is_spam(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    SPAM_PATTERNS.iter().any(|re| re.is_match(text))
}

/// True if more than 30% of whitespace-separated tokens are shouted.
///
/// A token counts as shouted when it is at least three characters long,
/// contains a letter and has no lowercase letters.
pub fn is_excessive_caps(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return false;
    }

    let shouted = tokens.iter().filter(|t| is_shouted(t)).count();
    shouted as f64 > tokens.len() as f64 * CAPS_TOKEN_RATIO
}

fn is_shouted(token: &str) -> bool {
    token.chars().count() >= MIN_CAPS_TOKEN_LEN
        && token.chars().any(char::is_alphabetic)
        && !token.chars().any(char::is_lowercase)
}
