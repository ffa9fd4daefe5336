// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Label charmaps and key sanitizing

use serde::{Deserialize, Serialize};

/// Charmap used to decode the 16-byte label fields stored in panel EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelEncoding {
    /// ASCII with the keypad's Western European extension.
    #[default]
    #[serde(rename = "paradox-en")]
    ParadoxEn,
    /// Hungarian keypad charset.
    #[serde(rename = "paradox-hu")]
    ParadoxHu,
    #[serde(rename = "latin-1", alias = "iso-8859-1")]
    Latin1,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

/// Hungarian keypad positions above 0x7F.
const HU_CHARMAP: &[(u8, char)] = &[
    (0x81, 'ü'),
    (0x82, 'é'),
    (0x8A, 'Ő'),
    (0x8B, 'ő'),
    (0x90, 'É'),
    (0x94, 'ö'),
    (0x99, 'Ö'),
    (0x9A, 'Ü'),
    (0xA0, 'á'),
    (0xA1, 'í'),
    (0xA2, 'ó'),
    (0xA3, 'ú'),
    (0xB5, 'Á'),
    (0xD6, 'Í'),
    (0xE0, 'Ó'),
    (0xE9, 'Ú'),
    (0xEB, 'Ű'),
    (0xFB, 'ű'),
];

/// English keypad positions above 0x7F.
const EN_CHARMAP: &[(u8, char)] = &[
    (0x80, 'Ç'),
    (0x81, 'ü'),
    (0x82, 'é'),
    (0x83, 'â'),
    (0x84, 'ä'),
    (0x85, 'à'),
    (0x87, 'ç'),
    (0x88, 'ê'),
    (0x89, 'ë'),
    (0x8A, 'è'),
    (0x8E, 'Ä'),
    (0x90, 'É'),
    (0x93, 'ô'),
    (0x94, 'ö'),
    (0x96, 'û'),
    (0x99, 'Ö'),
    (0x9A, 'Ü'),
    (0xA4, 'ñ'),
    (0xA5, 'Ñ'),
];

impl LabelEncoding {
    fn decode_byte(self, b: u8) -> char {
        if b.is_ascii() {
            return if b < 0x20 { ' ' } else { b as char };
        }
        let table = match self {
            LabelEncoding::ParadoxEn => EN_CHARMAP,
            LabelEncoding::ParadoxHu => HU_CHARMAP,
            LabelEncoding::Latin1 | LabelEncoding::Utf8 => return b as char,
        };
        table
            .iter()
            .find(|(code, _)| *code == b)
            .map(|(_, ch)| *ch)
            .unwrap_or('?')
    }

    /// Decode raw label bytes, trimming the space/NUL padding.
    pub fn decode(self, bytes: &[u8]) -> String {
        let decoded: String = match self {
            LabelEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            _ => bytes.iter().map(|b| self.decode_byte(*b)).collect(),
        };
        decoded
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string()
    }
}

/// Fold a label into an addressing key.
///
/// Letters and digits (any script) and `_` are kept; runs of anything else
/// collapse into one `_`, and leading/trailing separators are dropped.
pub fn sanitize_key(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Előtér"), "Előtér");
        assert_eq!(sanitize_key("Zone 1"), "Zone_1");
        assert_eq!(sanitize_key("  Front -- Door! "), "Front_Door");
        assert_eq!(sanitize_key("garage_door"), "garage_door");
        assert_eq!(sanitize_key("***"), "");
    }

    #[test]
    fn test_decode_ascii_label() {
        assert_eq!(LabelEncoding::ParadoxEn.decode(b"Office          "), "Office");
        assert_eq!(LabelEncoding::ParadoxEn.decode(b"XXXXXXXXXXX     "), "XXXXXXXXXXX");
        assert_eq!(LabelEncoding::ParadoxEn.decode(b"Hall\0\0\0\0"), "Hall");
        assert_eq!(LabelEncoding::ParadoxEn.decode(b"                "), "");
    }

    #[test]
    fn test_decode_hungarian_label() {
        let raw = [b'E', b'l', 0x8B, b't', 0x82, b'r', b' ', b' '];
        assert_eq!(LabelEncoding::ParadoxHu.decode(&raw), "Előtér");
        assert_eq!(sanitize_key(&LabelEncoding::ParadoxHu.decode(&raw)), "Előtér");
    }

    #[test]
    fn test_decode_other_charsets() {
        assert_eq!(LabelEncoding::Latin1.decode(&[0x45, 0xE9]), "Eé");
        assert_eq!(LabelEncoding::Utf8.decode("Kertész ".as_bytes()), "Kertész");
        assert_eq!(LabelEncoding::ParadoxEn.decode(&[b'A', 0xFE]), "A?");
    }

    #[test]
    fn test_encoding_names() {
        let enc: LabelEncoding = serde_json::from_str("\"paradox-hu\"").unwrap();
        assert_eq!(enc, LabelEncoding::ParadoxHu);
        let enc: LabelEncoding = serde_json::from_str("\"iso-8859-1\"").unwrap();
        assert_eq!(enc, LabelEncoding::Latin1);
    }
}
