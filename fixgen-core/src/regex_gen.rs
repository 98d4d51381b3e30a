//! Random string synthesis from regex patterns.
//!
//! Patterns are parsed to a `regex-syntax` HIR and sampled through
//! `rand_regex` with the shared PRNG. Anchors are stripped before parsing
//! and boundary escapes are rejected, since neither can be honored while
//! generating. With `suppress_random_bytes`, bare `.` is rewritten to `\w`
//! so output stays printable.

use regex_syntax::ParserBuilder;

use crate::error::ParseError;
use crate::random::RandomSource;

const FULL_STOP_LITERAL: &str = "[~{FULL_STOP_LITERAL}~]";

/// Options for the regex string synthesizer.
#[derive(Clone, Debug)]
pub struct RegexGeneratorOptions {
    /// Repeat count used for `*`, `+` and open-ended `{n,}` quantifiers.
    pub max_unbounded_repeat_count: u32,
    /// Rewrites `.` to `\w` so generated strings avoid arbitrary bytes.
    pub suppress_random_bytes: bool,
}

impl Default for RegexGeneratorOptions {
    fn default() -> Self {
        Self {
            max_unbounded_repeat_count: 10,
            suppress_random_bytes: true,
        }
    }
}

impl RegexGeneratorOptions {
    pub fn with_max_unbounded_repeat_count(mut self, count: u32) -> Self {
        self.max_unbounded_repeat_count = count;
        self
    }

    pub fn with_suppress_random_bytes(mut self, suppress: bool) -> Self {
        self.suppress_random_bytes = suppress;
        self
    }
}

/// A compiled pattern ready to produce matching strings.
pub(crate) struct RegexGenerator {
    distribution: rand_regex::Regex,
}

impl RegexGenerator {
    pub(crate) fn new(pattern: &str, options: &RegexGeneratorOptions) -> Result<Self, ParseError> {
        if contains_boundary_escape(pattern) {
            return Err(ParseError::InvalidRegex(format!(
                "pattern '{pattern}' uses boundary escapes which cannot be generated"
            )));
        }

        let mut source = pattern.to_string();
        if options.suppress_random_bytes {
            source = source.replace("\\.", FULL_STOP_LITERAL);
            source = source.replace('.', "\\w");
            source = source.replace(FULL_STOP_LITERAL, "\\.");
        }
        let source = strip_anchors(&source);

        let hir = ParserBuilder::new()
            .build()
            .parse(&source)
            .map_err(|err| ParseError::InvalidRegex(format!("pattern '{pattern}': {err}")))?;
        let distribution = rand_regex::Regex::with_hir(hir, options.max_unbounded_repeat_count)
            .map_err(|err| ParseError::InvalidRegex(format!("pattern '{pattern}': {err}")))?;

        Ok(Self { distribution })
    }

    pub(crate) fn generate(&self, rng: &mut RandomSource) -> String {
        rng.sample::<String, _>(&self.distribution)
    }
}

/// Strips a leading `^` and an unescaped trailing `$`.
fn strip_anchors(pattern: &str) -> String {
    let bytes = pattern.as_bytes();
    let mut start = 0;
    let mut end = bytes.len();
    if bytes.first() == Some(&b'^') {
        start = 1;
    }
    if end > start && bytes[end - 1] == b'$' && !is_escaped(bytes, end - 1) {
        end -= 1;
    }
    pattern[start..end].to_string()
}

fn contains_boundary_escape(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'\\' {
            match bytes.get(index + 1) {
                Some(b'b' | b'B' | b'A' | b'Z' | b'z' | b'G') => return true,
                Some(_) => {
                    index += 2;
                    continue;
                }
                None => break,
            }
        }
        index += 1;
    }
    false
}

fn is_escaped(bytes: &[u8], index: usize) -> bool {
    let mut count = 0;
    let mut position = index;
    while position > 0 {
        position -= 1;
        if bytes[position] == b'\\' {
            count += 1;
        } else {
            break;
        }
    }
    count % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn generated_strings_match_the_source_pattern() {
        let pattern = "^[a-z]{3,8}$";
        let generator = RegexGenerator::new(pattern, &RegexGeneratorOptions::default())
            .expect("compile pattern");
        let matcher = Regex::new(pattern).expect("valid regex");
        let mut rng = RandomSource::from_seed(11);
        for _ in 0..32 {
            let value = generator.generate(&mut rng);
            assert!(matcher.is_match(&value), "'{value}' should match {pattern}");
        }
    }

    #[test]
    fn dot_is_rewritten_to_word_characters() {
        let generator = RegexGenerator::new("a.c", &RegexGeneratorOptions::default())
            .expect("compile pattern");
        let matcher = Regex::new(r"^a\wc$").expect("valid regex");
        let mut rng = RandomSource::from_seed(3);
        for _ in 0..16 {
            let value = generator.generate(&mut rng);
            assert!(matcher.is_match(&value), "'{value}' should match a\\wc");
        }
    }

    #[test]
    fn boundary_escapes_are_rejected() {
        let result = RegexGenerator::new(r"\bfoo\b", &RegexGeneratorOptions::default());
        assert!(matches!(result, Err(ParseError::InvalidRegex(_))));
    }
}
