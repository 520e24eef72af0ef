// src/dag/suggestions.rs

//! "Did you mean ...?" hints for mistyped task names.

const MAX_DISTANCE: usize = 3;

/// Candidates within a small edit distance of `original`, closest first.
pub fn suggest_corrections<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    original: &str,
) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|c| *c != original)
        .map(|c| (levenshtein(c, original), c))
        .filter(|(distance, _)| *distance <= MAX_DISTANCE)
        .collect();

    scored.sort();
    scored.into_iter().map(|(_, c)| c.to_string()).collect()
}

/// Formats suggestions as a sentence fragment with a leading space, or an
/// empty string when there are none.
pub fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }

    let quoted: Vec<String> = suggestions.iter().map(|s| format!("'{s}'")).collect();
    format!(" Did you mean {}?", human_readable_list(&quoted, "or"))
}

/// `a`, `a or b`, `a, b or c`.
pub fn human_readable_list(items: &[String], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} {conjunction} {last}", init.join(", ")),
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

