//! I/O utilities: encoding detection, decoding, delimiter sniffing, and CSV
//! reader construction.
//!
//! Everything here is best effort. Detection never fails: an unknown or
//! ambiguous byte sample is treated as UTF-8, and a failed decode is retried
//! as lossy UTF-8 so misdetection surfaces as replacement characters instead
//! of an error.

use std::{io::Read, path::Path};

use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};

use crate::error::{ProfileError, ProfileResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

const SNIFF_MAX_LINES: usize = 20;
const SNIFF_CONSISTENCY: f64 = 0.9;

pub fn resolve_encoding(label: Option<&str>) -> ProfileResult<Option<&'static Encoding>> {
    match label.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("auto") => Ok(None),
        Some(value) => Encoding::for_label(value.as_bytes())
            .map(Some)
            .ok_or_else(|| ProfileError::UnknownEncoding(value.to_string())),
    }
}

pub fn read_all(path: &Path) -> ProfileResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| ProfileError::io(path, err))
}

/// Guess the text encoding of a byte sample.
///
/// A BOM wins outright. ASCII and valid UTF-8 (allowing a sequence cut off at
/// the end of the sample) resolve to UTF-8 without consulting the detector.
pub fn detect_encoding(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }
    if sample.is_ascii() || looks_like_utf8(sample) {
        return UTF_8;
    }
    statistical_guess(sample)
}

fn looks_like_utf8(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    }
}

#[cfg(feature = "charset-detect")]
fn statistical_guess(sample: &[u8]) -> &'static Encoding {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, true);
    let guess = detector.guess(None, true);
    debug!("Charset detector guessed {}", guess.name());
    if guess == encoding_rs::REPLACEMENT {
        UTF_8
    } else {
        guess
    }
}

#[cfg(not(feature = "charset-detect"))]
fn statistical_guess(_sample: &[u8]) -> &'static Encoding {
    debug!("Charset detection disabled; assuming UTF-8");
    UTF_8
}

/// Decode `bytes`, retrying as lossy UTF-8 when the chosen encoding rejects them.
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, had_errors) = encoding.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    if encoding == UTF_8 {
        warn!("Input is not valid UTF-8; invalid bytes were replaced");
        return text.into_owned();
    }
    warn!(
        "Failed to decode input as {}; falling back to UTF-8 with replacement",
        encoding.name()
    );
    let (fallback, _, _) = UTF_8.decode(bytes);
    fallback.into_owned()
}

/// Pick the field separator of a delimited text sample.
///
/// Dialect sniffing looks for a candidate whose per-line count is non-zero and
/// repeats across lines. Samples it cannot judge (one line, irregular rows)
/// fall back to raw occurrence counts, and to a comma when nothing matches.
pub fn detect_delimiter(sample: &str) -> u8 {
    if let Some(delimiter) = sniff_dialect(sample) {
        debug!(
            "Dialect sniffing selected delimiter '{}'",
            printable_delimiter(delimiter)
        );
        return delimiter;
    }
    let delimiter = frequency_fallback(sample);
    debug!(
        "Delimiter fallback selected '{}'",
        printable_delimiter(delimiter)
    );
    delimiter
}

fn sniff_dialect(sample: &str) -> Option<u8> {
    let lines = sample
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_MAX_LINES)
        .collect::<Vec<_>>();
    // The last line of a truncated sample may be partial.
    let lines = if lines.len() > 2 && !sample.ends_with('\n') {
        &lines[..lines.len() - 1]
    } else {
        &lines[..]
    };
    if lines.len() < 2 {
        return None;
    }

    let mut best: Option<(f64, usize, u8)> = None;
    for candidate in DELIMITER_CANDIDATES {
        let counts = lines
            .iter()
            .map(|line| count_outside_quotes(line, candidate))
            .collect::<Vec<_>>();
        let Some(modal) = modal_count(&counts) else {
            continue;
        };
        if modal == 0 {
            continue;
        }
        let matching = counts.iter().filter(|&&count| count == modal).count();
        let consistency = matching as f64 / counts.len() as f64;
        if consistency < SNIFF_CONSISTENCY {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_consistency, best_count, _)) => {
                consistency > best_consistency
                    || (consistency == best_consistency && modal > best_count)
            }
        };
        if better {
            best = Some((consistency, modal, candidate));
        }
    }
    best.map(|(_, _, delimiter)| delimiter)
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

fn modal_count(counts: &[usize]) -> Option<usize> {
    let mut tallies: Vec<(usize, usize)> = Vec::new();
    for &count in counts {
        match tallies.iter_mut().find(|(value, _)| *value == count) {
            Some((_, tally)) => *tally += 1,
            None => tallies.push((count, 1)),
        }
    }
    tallies
        .into_iter()
        .max_by_key(|&(value, tally)| (tally, value))
        .map(|(value, _)| value)
}

fn frequency_fallback(sample: &str) -> u8 {
    let mut best = (0usize, DEFAULT_CSV_DELIMITER);
    for candidate in DELIMITER_CANDIDATES {
        let count = sample.bytes().filter(|&b| b == candidate).count();
        if count > best.0 {
            best = (count, candidate);
        }
    }
    best.1
}

/// Truncate `text` to at most `limit` bytes on a character boundary.
pub fn text_prefix(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "comma" => Ok(b','),
        "semicolon" => Ok(b';'),
        "pipe" => Ok(b'|'),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if ch.is_ascii() => Ok(ch as u8),
                _ => Err(format!(
                    "Delimiter must be a single ASCII character or one of tab, comma, semicolon, pipe (got '{other}')"
                )),
            }
        }
    }
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
