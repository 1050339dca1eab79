//! Recursive, separator-driven text splitter.
//!
//! A [`LanguageProfile`] supplies an ordered list of separators, coarsest
//! first (class/function openers, blank lines, newlines, spaces, and finally
//! the empty string). Text is cut on the coarsest separator present, pieces
//! that are still too long are split again with the finer separators, and
//! the small pieces are greedily merged back into windows of at most
//! `chunk_size` characters that overlap by up to `chunk_overlap` characters.
//!
//! One profile is applied to the whole corpus. A polyglot repository is
//! therefore split with one language's breakpoints; other languages fall
//! back to the generic blank-line/newline separators.

use std::collections::VecDeque;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LanguageProfile {
    Python,
    Rust,
    Go,
    Java,
    #[value(name = "javascript", alias = "js")]
    JavaScript,
    #[value(name = "typescript", alias = "ts")]
    TypeScript,
    Markdown,
    Html,
    Plain,
}

impl LanguageProfile {
    pub fn separators(self) -> &'static [&'static str] {
        match self {
            LanguageProfile::Python => &["\nclass ", "\ndef ", "\n\tdef ", "\n\n", "\n", " ", ""],
            LanguageProfile::Rust => &[
                "\nfn ", "\nconst ", "\nlet ", "\nif ", "\nwhile ", "\nfor ", "\nloop ",
                "\nmatch ", "\n\n", "\n", " ", "",
            ],
            LanguageProfile::Go => &[
                "\nfunc ", "\nvar ", "\nconst ", "\ntype ", "\nif ", "\nfor ", "\nswitch ",
                "\ncase ", "\n\n", "\n", " ", "",
            ],
            LanguageProfile::Java => &[
                "\nclass ", "\npublic ", "\nprotected ", "\nprivate ", "\nstatic ", "\nif ",
                "\nfor ", "\nwhile ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
            ],
            LanguageProfile::JavaScript => &[
                "\nfunction ", "\nconst ", "\nlet ", "\nvar ", "\nclass ", "\nif ", "\nfor ",
                "\nwhile ", "\nswitch ", "\ncase ", "\ndefault ", "\n\n", "\n", " ", "",
            ],
            LanguageProfile::TypeScript => &[
                "\nenum ", "\ninterface ", "\nnamespace ", "\ntype ", "\nclass ", "\nfunction ",
                "\nconst ", "\nlet ", "\nvar ", "\nif ", "\nfor ", "\nwhile ", "\nswitch ",
                "\ncase ", "\ndefault ", "\n\n", "\n", " ", "",
            ],
            LanguageProfile::Markdown => &[
                "\n# ", "\n## ", "\n### ", "\n#### ", "\n##### ", "\n###### ", "```\n",
                "\n\n", "\n", " ", "",
            ],
            LanguageProfile::Html => &[
                "<body", "<div", "<p", "<br", "<li", "<h1", "<h2", "<h3", "<h4", "<h5", "<h6",
                "<span", "<table", "<tr", "<td", "<th", "<ul", "<ol", "<header", "<footer",
                "<nav", "<head", "<style", "<script", "<meta", "<title", "",
            ],
            LanguageProfile::Plain => &["\n\n", "\n", " ", ""],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    profile: LanguageProfile,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(profile: LanguageProfile, chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            profile,
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    pub fn profile(&self) -> LanguageProfile {
        self.profile
    }

    /// Splits `text` into trimmed, contiguous spans no longer than `chunk_size`
    /// characters. Whitespace-only input yields no spans.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, self.profile.separators())
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = match separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
        {
            Some(idx) => (separators[idx], &separators[idx + 1..]),
            None => (separators.last().copied().unwrap_or(""), &separators[..0]),
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut out, &window);
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        push_joined(&mut out, &window);
        out
    }
}

/// Splits on `separator`, attaching each separator to the start of the piece
/// that follows it so that concatenating the pieces restores `text`.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(idx, ch)| &text[idx..idx + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_source(functions: usize, body_lines: usize) -> String {
        let mut source = String::from("import os\n");
        for f in 0..functions {
            source.push_str(&format!("\ndef handler_{f}(event):\n"));
            for line in 0..body_lines {
                source.push_str(&format!("    value_{line} = event.get('key_{line}')\n"));
            }
        }
        source
    }

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let splitter = TextSplitter::new(LanguageProfile::Python, 2000, 200);
        assert_eq!(splitter.split("  print('hi')\n\n"), vec!["print('hi')".to_string()]);
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        let splitter = TextSplitter::new(LanguageProfile::Python, 2000, 200);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split(" \n\n\t ").is_empty());
    }

    #[test]
    fn chunks_never_exceed_the_limit() {
        let source = python_source(40, 12);
        let splitter = TextSplitter::new(LanguageProfile::Python, 300, 50);
        let chunks = splitter.split(&source);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 300, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn python_profile_prefers_function_boundaries() {
        let source = python_source(6, 3);
        let splitter = TextSplitter::new(LanguageProfile::Python, 200, 0);
        let chunks = splitter.split(&source);

        assert!(chunks.iter().skip(1).all(|chunk| chunk.starts_with("def handler_")));
    }

    #[test]
    fn every_chunk_is_a_contiguous_span_of_the_input() {
        let source = python_source(10, 8);
        let splitter = TextSplitter::new(LanguageProfile::Python, 250, 60);
        for chunk in splitter.split(&source) {
            assert!(source.contains(&chunk));
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = (0..400)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = TextSplitter::new(LanguageProfile::Plain, 100, 30);
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().expect("non-empty chunk");
            assert!(pair[1].contains(last_word), "no overlap between {:?}", pair);
        }
    }

    #[test]
    fn resplitting_is_deterministic() {
        let source = python_source(25, 10);
        let splitter = TextSplitter::new(LanguageProfile::Python, 400, 80);
        assert_eq!(splitter.split(&source), splitter.split(&source));
    }

    #[test]
    fn overlong_token_is_hard_cut_at_the_limit() {
        // No separator but the empty string applies, so the token is cut per character.
        let token = "x".repeat(5000);
        let splitter = TextSplitter::new(LanguageProfile::Python, 2000, 200);
        let chunks = splitter.split(&token);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 2000));
        assert_eq!(chunks[0].len(), 2000);
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let text = "é".repeat(150);
        let splitter = TextSplitter::new(LanguageProfile::Plain, 100, 0);
        let chunks = splitter.split(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(chunks[1].chars().count(), 50);
    }

    #[test]
    fn profile_names_parse_case_insensitively() {
        assert_eq!(
            LanguageProfile::from_str("TypeScript", true),
            Ok(LanguageProfile::TypeScript)
        );
        assert_eq!(LanguageProfile::from_str("js", true), Ok(LanguageProfile::JavaScript));
        assert!(LanguageProfile::from_str("cobol", true).is_err());
    }
}
