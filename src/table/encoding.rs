use encoding_rs::{Encoding, EUC_KR, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::fmt;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Encodings the tourism exports are known to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceEncoding {
    #[serde(rename = "utf-8-sig")]
    Utf8Sig,
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "cp949")]
    Cp949,
    #[serde(rename = "euc-kr")]
    EucKr,
    #[serde(rename = "latin1")]
    Latin1,
}

impl SourceEncoding {
    /// Detection order
    pub const CANDIDATES: [SourceEncoding; 5] = [
        SourceEncoding::Utf8Sig,
        SourceEncoding::Utf8,
        SourceEncoding::Cp949,
        SourceEncoding::EucKr,
        SourceEncoding::Latin1,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8Sig => "utf-8-sig",
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Cp949 => "cp949",
            SourceEncoding::EucKr => "euc-kr",
            SourceEncoding::Latin1 => "latin1",
        }
    }

    /// encoding_rs codec backing this label. EUC_KR is the windows-949 superset.
    fn codec(&self) -> &'static Encoding {
        match self {
            SourceEncoding::Utf8Sig | SourceEncoding::Utf8 => UTF_8,
            SourceEncoding::Cp949 | SourceEncoding::EucKr => EUC_KR,
            SourceEncoding::Latin1 => WINDOWS_1252,
        }
    }

    /// Strictly decode `bytes`, returning None on any malformed sequence.
    /// `utf-8-sig` only applies to input that starts with a BOM.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let body = match self {
            SourceEncoding::Utf8Sig => bytes.strip_prefix(UTF8_BOM)?,
            _ => bytes,
        };
        let (text, had_errors) = self.codec().decode_without_bom_handling(body);
        if had_errors {
            return None;
        }
        Some(text.trim_start_matches('\u{feff}').to_string())
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How to choose among encodings that decode cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStrategy {
    /// First candidate in order that decodes
    FirstMatch,
    /// Candidate whose header line scores highest (hangul weighted double)
    HeaderScore,
}

/// Score a header line: two points per hangul syllable, one per ASCII char
pub fn header_score(header: &str) -> usize {
    header
        .chars()
        .map(|c| match c {
            '가'..='힣' => 2,
            c if c.is_ascii() => 1,
            _ => 0,
        })
        .sum()
}

/// Raw bytes of the header line, without the line terminator
fn header_line(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
    let line = &bytes[..end];
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Detect the encoding of raw file contents and return it with the decoded text.
///
/// Every candidate must decode the whole file. `latin1` accepts any bytes, so
/// it is only a fallback for headers no earlier codec can read: a non-ASCII
/// header that decodes as UTF-8 or Korean but whose body does not is a broken
/// file, not a latin1 one.
pub fn detect(bytes: &[u8], strategy: DetectionStrategy) -> Option<(SourceEncoding, String)> {
    let header = header_line(bytes);
    let header_is_ascii = header.strip_prefix(UTF8_BOM).unwrap_or(header).is_ascii();
    let mut header_claimed = false;
    let mut best: Option<(SourceEncoding, String, usize)> = None;

    for candidate in SourceEncoding::CANDIDATES {
        if candidate == SourceEncoding::Latin1 && header_claimed {
            continue;
        }
        let Some(text) = candidate.decode(bytes) else {
            header_claimed |= !header_is_ascii && candidate.decode(header).is_some();
            continue;
        };
        if strategy == DetectionStrategy::FirstMatch {
            return Some((candidate, text));
        }
        let score = header_score(text.lines().next().unwrap_or(""));
        if best.as_ref().map_or(true, |(_, _, best_score)| score > *best_score) {
            best = Some((candidate, text, score));
        }
    }

    best.map(|(encoding, text, _)| (encoding, text))
}

/// Encode text as UTF-8 with a leading BOM
pub fn encode_utf8_sig(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
    out.extend_from_slice(UTF8_BOM);
    out.extend_from_slice(text.as_bytes());
    out
}
