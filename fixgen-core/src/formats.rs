//! Format-string producers and the lorem text source for plain strings.

use chrono::{TimeZone, Utc};

use crate::random::RandomSource;

const LOREM_WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "dolore", "magna", "aliqua", "enim", "minim",
    "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip", "ex",
    "commodo", "consequat", "duis", "aute", "irure", "reprehenderit", "voluptate", "velit",
    "esse", "cillum", "fugiat", "nulla",
];

// Upper bound keeps random timestamps before the year 2100.
const MAX_UNIX_TIMESTAMP: i64 = 4_102_444_800;

pub(crate) fn lorem_word(rng: &mut RandomSource) -> String {
    (*rng.choice(LOREM_WORDS)).to_string()
}

/// One capitalized sentence of 6-12 words.
pub(crate) fn lorem_sentence(rng: &mut RandomSource) -> String {
    let count = rng.usize_between(6, 12);
    let mut words = Vec::with_capacity(count);
    for _ in 0..count {
        words.push(lorem_word(rng));
    }
    let mut sentence = words.join(" ");
    if let Some(first) = sentence.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    sentence.push('.');
    sentence
}

/// Produces a value for a named `format`. Unknown formats yield a clearly
/// marked placeholder rather than an error, so failures stay visible in
/// the generated output.
pub(crate) fn generate_format(format: &str, rng: &mut RandomSource) -> String {
    match format {
        "date-time" => rfc3339(rng),
        "date" => timestamp(rng).format("%Y-%m-%d").to_string(),
        "time" => format!("{}+00:00", timestamp(rng).format("%H:%M:%S")),
        "duration" => format!("P{}D", rng.int_between(0, 90)),
        "email" | "idn-email" => format!(
            "{}.{}@{}.com",
            lorem_word(rng),
            lorem_word(rng),
            lorem_word(rng)
        ),
        "hostname" | "idn-hostname" => format!("{}.{}.com", lorem_word(rng), lorem_word(rng)),
        "ipv4" => format!(
            "{}.{}.{}.{}",
            rng.int_between(0, 255),
            rng.int_between(0, 255),
            rng.int_between(0, 255),
            rng.int_between(0, 255)
        ),
        "ipv6" => {
            let mut groups = Vec::with_capacity(8);
            for _ in 0..8 {
                groups.push(format!("{:x}", rng.int_between(0, 0xffff)));
            }
            groups.join(":")
        }
        "uuid" => uuid(rng),
        "uri" | "uri-reference" | "iri" | "iri-reference" => {
            format!("https://{}.com/{}", lorem_word(rng), lorem_word(rng))
        }
        "json-pointer" => format!("/{}/{}", lorem_word(rng), lorem_word(rng)),
        "regex" => "[a-z]+".to_string(),
        "uri-template" | "relative-json-pointer" => {
            format!("Known but unsupported format: {format}")
        }
        other => format!("Unsupported Format: {other}"),
    }
}

/// Checks a string against a named format. `None` means the format is
/// unknown and cannot be used in a negated constraint.
pub(crate) fn matches_format(format: &str, value: &str) -> Option<bool> {
    let matched = match format {
        "date-time" => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        "date" => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        "time" => value
            .get(0..8)
            .map(|prefix| chrono::NaiveTime::parse_from_str(prefix, "%H:%M:%S").is_ok())
            .unwrap_or(false),
        "duration" => value.len() > 1 && value.starts_with('P'),
        "email" | "idn-email" => value
            .split_once('@')
            .map(|(user, host)| !user.is_empty() && host.contains('.'))
            .unwrap_or(false),
        "hostname" | "idn-hostname" => {
            !value.is_empty()
                && value
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.')
        }
        "ipv4" => value.parse::<std::net::Ipv4Addr>().is_ok(),
        "ipv6" => value.parse::<std::net::Ipv6Addr>().is_ok(),
        "uuid" => is_uuid(value),
        "uri" | "iri" => url::Url::parse(value).is_ok(),
        "uri-reference" | "iri-reference" => {
            url::Url::parse(value).is_ok() || !value.contains(' ')
        }
        "json-pointer" => value.is_empty() || value.starts_with('/'),
        "regex" => regex::Regex::new(value).is_ok(),
        _ => return None,
    };
    Some(matched)
}

fn timestamp(rng: &mut RandomSource) -> chrono::DateTime<Utc> {
    let seconds = rng.int_between(0, MAX_UNIX_TIMESTAMP);
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().expect("epoch timestamp"))
}

fn rfc3339(rng: &mut RandomSource) -> String {
    timestamp(rng).format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn uuid(rng: &mut RandomSource) -> String {
    let mut hex = String::with_capacity(32);
    for _ in 0..32 {
        hex.push(char::from_digit(rng.int_between(0, 15) as u32, 16).expect("hex digit"));
    }
    // Version 4 / RFC 4122 variant nibbles.
    format!(
        "{}-{}-4{}-{}{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[13..16],
        ['8', '9', 'a', 'b'][(hex.as_bytes()[16] as usize) % 4],
        &hex[17..20],
        &hex[20..32]
    )
}

fn is_uuid(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    for (index, byte) in bytes.iter().enumerate() {
        match index {
            8 | 13 | 18 | 23 => {
                if *byte != b'-' {
                    return false;
                }
            }
            _ => {
                if !byte.is_ascii_hexdigit() {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_formats_pass_their_own_validators() {
        let mut rng = RandomSource::from_seed(5);
        for format in [
            "date-time", "date", "time", "duration", "email", "hostname", "ipv4", "ipv6",
            "uuid", "uri", "json-pointer", "regex",
        ] {
            let value = generate_format(format, &mut rng);
            assert_eq!(
                matches_format(format, &value),
                Some(true),
                "format {format} produced non-matching '{value}'"
            );
        }
    }

    #[test]
    fn unknown_formats_yield_visible_placeholders() {
        let mut rng = RandomSource::from_seed(6);
        let value = generate_format("no-such-format", &mut rng);
        assert!(value.contains("Unsupported Format"));
        assert_eq!(matches_format("no-such-format", "anything"), None);
    }

    #[test]
    fn lorem_sentences_are_capitalized_and_terminated() {
        let mut rng = RandomSource::from_seed(7);
        let sentence = lorem_sentence(&mut rng);
        assert!(sentence.ends_with('.'));
        assert!(sentence.chars().next().is_some_and(|ch| ch.is_ascii_uppercase()));
    }
}
