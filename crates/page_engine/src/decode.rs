use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use page_logging::page_debug;

/// Number of leading bytes inspected when classifying input.
const SAMPLE_LEN: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
}

/// Decides whether raw bytes are text (and so carry front matter) or binary.
pub trait TextClassifier: Send + Sync {
    fn is_text(&self, bytes: &[u8]) -> bool;
}

/// Text/binary sniffing: BOM -> NUL bytes -> UTF-8 validity -> chardetng
/// decode, then a ratio check on control characters.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicClassifier {
    /// Highest tolerated share of control characters, in percent.
    pub max_control_percent: usize,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self {
            max_control_percent: 10,
        }
    }
}

impl TextClassifier for HeuristicClassifier {
    fn is_text(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() || Encoding::for_bom(bytes).is_some() {
            return true;
        }
        let sample = &bytes[..bytes.len().min(SAMPLE_LEN)];
        if sample.contains(&0) {
            return false;
        }

        let decoded = if is_utf8_prefix(sample, bytes.len() > SAMPLE_LEN) {
            String::from_utf8_lossy(sample).into_owned()
        } else {
            let mut detector = EncodingDetector::new();
            detector.feed(sample, true);
            let enc = detector.guess(None, false);
            let (text, _, had_errors) = enc.decode(sample);
            if had_errors {
                return false;
            }
            text.into_owned()
        };

        let total = decoded.chars().count();
        let suspicious = decoded.chars().filter(|c| is_suspicious_control(*c)).count();
        suspicious * 100 <= total * self.max_control_percent
    }
}

/// Decode text bytes into UTF-8 using: BOM -> UTF-8 -> chardetng fallback.
///
/// Undecodable sequences are replaced rather than rejected, so callers that
/// force a text classification still get a body.
pub fn decode_text(bytes: &[u8]) -> DecodedText {
    // 1) BOM aware decode using encoding_rs helper
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    // 2) already valid UTF-8
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            encoding_label: "UTF-8".to_string(),
        };
    }

    // 3) chardetng detection
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> DecodedText {
    let (text, used, had_errors) = enc.decode(bytes);
    if had_errors {
        page_debug!("decoding with {} replaced malformed sequences", used.name());
    }
    DecodedText {
        text: text.into_owned(),
        encoding_label: used.name().to_string(),
    }
}

/// UTF-8 check that tolerates a multi-byte character cut by the sample boundary.
fn is_utf8_prefix(sample: &[u8], truncated: bool) -> bool {
    let valid_up_to = Encoding::utf8_valid_up_to(sample);
    if valid_up_to == sample.len() {
        return true;
    }
    truncated && sample.len() - valid_up_to < 4
}

fn is_suspicious_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\u{0c}' | '\u{1b}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_and_plain_text_are_text() {
        let classifier = HeuristicClassifier::default();
        assert!(classifier.is_text(b""));
        assert!(classifier.is_text(b"---\na: b\n---\nhello"));
        assert!(classifier.is_text("caf\u{e9} \u{95a2}\u{897f}".as_bytes()));
    }

    #[test]
    fn nul_and_control_heavy_bytes_are_binary() {
        let classifier = HeuristicClassifier::default();
        assert!(!classifier.is_text(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00]));
        assert!(!classifier.is_text(&[0x90, 0x20, 0x14]));
    }

    #[test]
    fn legacy_encodings_are_still_text() {
        let classifier = HeuristicClassifier::default();
        assert!(classifier.is_text(b"caf\xe9 au lait, cr\xe8me br\xfbl\xe9e"));
    }

    #[test]
    fn decode_handles_utf8_bom() {
        let decoded = decode_text(b"\xEF\xBB\xBFhello");
        assert_eq!(decoded.text, "hello");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn decode_keeps_utf8_intact() {
        let decoded = decode_text("h\u{e9}llo \u{95a2}\u{897f}".as_bytes());
        assert_eq!(decoded.text, "h\u{e9}llo \u{95a2}\u{897f}");
    }
}
