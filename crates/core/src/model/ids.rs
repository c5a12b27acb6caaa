use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Number of hex characters in a bank id.
pub const BANK_ID_HEX_LEN: usize = 8;

/// Identifier for a question bank.
///
/// Derived from the source document identifier: the first 32 bits of its
/// SHA-256 digest, rendered as 8 lowercase hex characters. The keyspace is
/// small enough for unrelated documents to collide, so stores must reject a
/// put whose document id differs from the one already held under the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BankId(u32);

impl BankId {
    /// Derives the bank id for a source document.
    #[must_use]
    pub fn from_document(document_id: &str) -> Self {
        let digest = Sha256::digest(document_id.as_bytes());
        Self(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }

    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the 8-character hex form used as the persisted key.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

/// Stable identifier of a question within its bank.
///
/// Assigned once at bank creation (the question's position in generation
/// order) and carried into every lesson copy of the question.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(u32);

impl QuestionId {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Position of a lesson within a bank's lesson sequence.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LessonNumber(u32);

impl LessonNumber {
    /// The stratified diagnostic lesson. Never regenerated by finalize.
    pub const DIAGNOSTIC: LessonNumber = LessonNumber(0);

    /// First lesson produced by finalize.
    pub const FIRST_FOLLOWUP: LessonNumber = LessonNumber(1);

    #[must_use]
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        self.0 == 0
    }

    /// The lesson that follows this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BankId({})", self.to_hex())
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Debug for LessonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LessonNumber({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LessonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for BankId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError {
            kind: "BankId".to_string(),
        };
        if s.len() != BANK_ID_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }
        u32::from_str_radix(s, 16).map(BankId).map_err(|_| err())
    }
}

impl FromStr for LessonNumber {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(LessonNumber::new)
            .map_err(|_| ParseIdError {
                kind: "LessonNumber".to_string(),
            })
    }
}

impl From<BankId> for String {
    fn from(id: BankId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for BankId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_id_matches_sha256_prefix() {
        // sha256("103A.pdf") starts with the same 8 hex characters.
        let id = BankId::from_document("103A.pdf");
        let digest = hex::encode(Sha256::digest(b"103A.pdf"));
        assert_eq!(id.to_string(), &digest[..8]);
        assert_eq!(id.to_hex(), id.to_string());
    }

    #[test]
    fn bank_id_is_stable_per_document() {
        assert_eq!(
            BankId::from_document("notes.pdf"),
            BankId::from_document("notes.pdf")
        );
        assert_ne!(
            BankId::from_document("notes.pdf"),
            BankId::from_document("other.pdf")
        );
    }

    #[test]
    fn bank_id_display_is_zero_padded() {
        assert_eq!(BankId::new(0xab).to_string(), "000000ab");
    }

    #[test]
    fn bank_id_from_str() {
        let id: BankId = "deadbeef".parse().unwrap();
        assert_eq!(id, BankId::new(0xdead_beef));
    }

    #[test]
    fn bank_id_from_str_rejects_wrong_length_and_sign() {
        assert!("abc".parse::<BankId>().is_err());
        assert!("+0000001".parse::<BankId>().is_err());
        assert!("zzzzzzzz".parse::<BankId>().is_err());
    }

    #[test]
    fn bank_id_serializes_as_hex_string() {
        let id = BankId::new(0x0102_0304);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"01020304\"");
        let back: BankId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn lesson_number_diagnostic() {
        assert!(LessonNumber::DIAGNOSTIC.is_diagnostic());
        assert!(!LessonNumber::FIRST_FOLLOWUP.is_diagnostic());
        assert_eq!(LessonNumber::DIAGNOSTIC.next(), LessonNumber::FIRST_FOLLOWUP);
    }

    #[test]
    fn lesson_number_from_str_invalid() {
        assert!("-1".parse::<LessonNumber>().is_err());
        assert_eq!("7".parse::<LessonNumber>().unwrap(), LessonNumber::new(7));
    }
}
