use std::fmt;
use std::str::FromStr;

/// Identifier of a public key
///
/// Displayed as lowercase hex, which is also how exchange artifacts are
/// named. Parsing accepts either case, an optional "0x" prefix, and the
/// space-separated groups `gpg` prints.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<u8>);

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("empty fingerprint")]
    Empty,
    #[error("fingerprint is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl From<&[u8]> for Fingerprint {
    fn from(bytes: &[u8]) -> Self {
        Fingerprint(bytes.to_vec())
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(FingerprintError::Empty);
        }
        Ok(Fingerprint(hex::decode(compact)?))
    }
}

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}
