use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Derive the URL slug for a post title.
///
/// Lower-cases, strips diacritics via canonical decomposition, drops every
/// character outside `[a-z0-9 -]`, turns whitespace runs into single hyphens,
/// collapses hyphen runs, and trims hyphens from both ends. An empty title
/// yields an empty slug; required-field validation is the caller's job.
pub fn slugify(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | ' ' | '-'))
        .collect();

    let mut slug = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        let c = if c == ' ' { '-' } else { c };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    slug.trim_matches('-').to_string()
}

/// Split a comma-delimited tag field into trimmed, non-empty tags.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
