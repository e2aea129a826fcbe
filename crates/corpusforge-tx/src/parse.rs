//! Text normalization and chunking.
//!
//! A document is first truncated at its first reserved trailing heading,
//! then run through `fix_bad_symbols` and `clean_newlines` — a closed,
//! ordered rewrite table for encoding artifacts and stray punctuation left
//! behind by wikitext stripping — then stripped of table-markup leftovers,
//! then chunked to the configured tokenizer's token budget.

use corpusforge_core::error::Error;

const TRAILING_SECTION_HEADINGS: [&str; 4] =
    ["See also", "References", "External links", "Notes"];

/// Ordered substitution table for encoding artifacts and stray punctuation.
/// Order matters: later substitutions assume earlier ones already ran (the
/// final double-space collapse, in particular, must run last).
pub fn fix_bad_symbols(input: &str) -> String {
    let mut s = input.to_string();
    let replacements: &[(&str, &str)] = &[
        ("\u{2013}", "-"),   // en dash
        ("(/", "("),
        ("/)", ")"),
        ("(, ", "("),
        ("( , ; ", "("),
        ("\u{00a0}", " "),   // non-breaking space
        ("\u{2032}", "`"),   // prime
        ("(: ", "("),
        ("(; ", "("),
        ("( ", "("),
        (" )", ")"),
        ("\u{7696}", ""),
        ("()", ""),
        ("(;)", ""),
        (" ; ", "; "),
        ("(,", "("),
        (",)", ")"),
        (",),", ","),
        (",\"", ", \u{201c}"),
        ("( ;)", ""),
        ("(;", "("),
        (" .", "."),
        (";;", ";"),
        (";\n", "\n"),
        (" ,", ","),
        (",,", ","),
        ("\u{2212}", "-"), // minus sign
        ("\u{0a5d} ", ""),
        ("\u{0a5d}", ""),
        ("\\'", "'"),
    ];
    for (from, to) in replacements {
        s = s.replace(from, to);
    }
    // must run last: prior substitutions can introduce new runs of spaces
    s = s.replace("  ", " ");
    s
}

/// Folds runs of blank lines down to at most one blank line between
/// paragraphs. The three consecutive passes over a run of exactly three
/// newlines (collapse to two, then to one, then back to two) are not
/// redundant: each pass only sees runs the prior pass left behind, and the
/// original collapses a bare triple to a single newline in between.
pub fn clean_newlines(input: &str) -> String {
    let mut s = input.replace(" \n", "\n");
    let folds: &[(&str, &str)] = &[
        ("\n\n\n\n\n\n", "\n\n"),
        ("\n\n\n\n\n", "\n\n"),
        ("\n\n\n\n", "\n\n"),
        ("\n\n\n", "\n\n"),
        ("\n\n\n", "\n"),
        ("\n\n\n", "\n\n"),
    ];
    for (from, to) in folds {
        s = s.replace(from, to);
    }
    s
}

/// Truncates a document at the first occurrence of any reserved trailing
/// heading, discarding the heading and everything after it, and trims the
/// dangling newline truncation leaves behind.
pub fn remove_trailing_sections(input: &str) -> String {
    let mut s = input.to_string();
    for heading in TRAILING_SECTION_HEADINGS {
        if let Some(idx) = s.find(heading) {
            s.truncate(idx);
        }
    }
    s.trim_end().to_string()
}

/// Drops lines that are leftover table/image markup, and strips leading
/// markup prefixes from the remaining lines.
pub fn remove_table_artifacts(input: &str) -> String {
    let mut cleaned = Vec::new();
    for line in input.split('\n') {
        if line.contains("thumb|")
            || line.contains("scope=\"")
            || line.contains("rowspan=\"")
            || line.contains("style=\"")
        {
            continue;
        }
        let mut line = line;
        if let Some(rest) = line.strip_prefix(' ') {
            line = rest;
        }
        for prefix in ["| ", "! ", "|-", "|}"] {
            if let Some(rest) = line.strip_prefix(prefix) {
                line = rest;
                break;
            }
        }
        cleaned.push(line);
    }
    cleaned.join("\n")
}

/// Runs the full cleanup pipeline in the contractual order: trailing-section
/// truncation, symbol fixes, newline folding, table-artifact removal.
pub fn clean_text(input: &str) -> String {
    let s = remove_trailing_sections(input);
    let s = fix_bad_symbols(&s);
    let s = clean_newlines(&s);
    remove_table_artifacts(&s)
}

/// Splits cleaned text into chunks no longer than `max_tokens`, measured by
/// whitespace-delimited word count as a tokenizer-agnostic approximation
/// when no tokenizer handle is supplied. Splits occur on paragraph
/// boundaries first, falling back to word boundaries for an overlong
/// paragraph.
pub fn split_into_chunks(input: &str, max_tokens: usize) -> Result<Vec<String>, Error> {
    if max_tokens == 0 {
        return Err(Error::Other(anyhow::anyhow!("max_tokens must be > 0")));
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for paragraph in input.split("\n\n") {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if words.len() > max_tokens {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            for window in words.chunks(max_tokens) {
                chunks.push(window.join(" "));
            }
            continue;
        }
        if current_len + words.len() > max_tokens {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
        current_len += words.len();
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_excess_blank_lines_and_trims_trailing_sections() {
        let input = "Hello\n\n\n\n\nworld.\nSee also\nignored";
        let cleaned = clean_text(input);
        assert_eq!(cleaned, "Hello\n\nworld.");
    }

    #[test]
    fn fix_bad_symbols_collapses_double_space_last() {
        let input = "a (  b )";
        let out = fix_bad_symbols(input);
        assert!(!out.contains("  "));
    }

    #[test]
    fn removes_table_artifact_lines_and_prefixes() {
        let input = "kept line\nthumb|some image\n| stripped\nanother";
        let out = remove_table_artifacts(input);
        assert_eq!(out, "kept line\nstripped\nanother");
    }

    #[test]
    fn chunks_respect_max_tokens() {
        let words: Vec<String> = (0..50).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let chunks = split_into_chunks(&text, 10).unwrap();
        assert!(chunks.iter().all(|c| c.split_whitespace().count() <= 10));
        assert_eq!(
            chunks.iter().map(|c| c.split_whitespace().count()).sum::<usize>(),
            50
        );
    }
}
