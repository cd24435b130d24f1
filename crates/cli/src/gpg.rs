//! [`PgpEngine`] backed by the `gpg` binary
//!
//! Public keys handed to us are inspected in a throwaway home directory so
//! that listing a key file never touches the operator's keyring. Encryption
//! uses `--recipient-file`, so recipients need not be imported either.
//! Only decryption and secret key listing use the real keyring.

use std::io::Write;
use std::process::{Command, Output};

use anyhow::{anyhow, Context};
use chrono::{DateTime, TimeZone, Utc};
use common::pgp::{Fingerprint, PgpEngine, PgpError, PublicKeyInfo};

use crate::subprocess;

pub const DEFAULT_PROGRAM: &str = "gpg";

#[derive(Debug, Clone)]
pub struct GpgEngine {
    program: String,
}

impl Default for GpgEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl GpgEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(["--batch", "--quiet", "--no-tty"]);
        command
    }

    fn finish(&self, what: &str, output: Output) -> Result<Vec<u8>, PgpError> {
        if output.status.success() {
            return Ok(output.stdout);
        }
        Err(anyhow!(
            "{} {} failed: {}",
            self.program,
            what,
            subprocess::stderr_text(&output)
        )
        .into())
    }

    fn spawn_error(&self, e: std::io::Error) -> PgpError {
        anyhow::Error::new(e)
            .context(format!("failed to run {}", self.program))
            .into()
    }
}

impl PgpEngine for GpgEngine {
    fn encrypt(&self, plaintext: &[u8], recipient: &PublicKeyInfo) -> Result<Vec<u8>, PgpError> {
        let mut key_file = tempfile::NamedTempFile::new()?;
        key_file.write_all(&recipient.armored)?;
        key_file.flush()?;

        let mut command = self.command();
        command
            .args(["--trust-model", "always", "--recipient-file"])
            .arg(key_file.path())
            .args(["--encrypt", "--output", "-"]);
        let output = subprocess::run_with_input(&mut command, plaintext)
            .map_err(|e| self.spawn_error(e))?;
        self.finish("--encrypt", output)
    }

    fn decrypt(&self, ciphertext: &[u8], selector: &Fingerprint) -> Result<Vec<u8>, PgpError> {
        let mut command = self.command();
        command
            .arg("--try-secret-key")
            .arg(selector.to_hex())
            .args(["--decrypt", "--output", "-"]);
        let output = subprocess::run_with_input(&mut command, ciphertext)
            .map_err(|e| self.spawn_error(e))?;
        if output.status.success() {
            return Ok(output.stdout);
        }
        Err(PgpError::DecryptionFailed(subprocess::stderr_text(&output)))
    }

    fn list_public_keys(&self, source: &[u8]) -> Result<Vec<PublicKeyInfo>, PgpError> {
        let home = tempfile::TempDir::new().context("creating scratch gpg home")?;

        let mut import = self.command();
        import.arg("--homedir").arg(home.path()).arg("--import");
        let output =
            subprocess::run_with_input(&mut import, source).map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(PgpError::MalformedKey(subprocess::stderr_text(&output)));
        }

        let mut list = self.command();
        list.arg("--homedir")
            .arg(home.path())
            .args(["--with-colons", "--fixed-list-mode", "--list-keys"]);
        let listing = subprocess::run(&mut list).map_err(|e| self.spawn_error(e))?;
        let listing = self.finish("--list-keys", listing)?;

        let mut keys = Vec::new();
        for entry in parse_colons(&String::from_utf8_lossy(&listing), "pub")? {
            if !entry.can_encrypt || entry.revoked {
                tracing::debug!(fingerprint = %entry.fingerprint, "skipping key that cannot encrypt");
                continue;
            }

            let mut export = self.command();
            export
                .arg("--homedir")
                .arg(home.path())
                .args(["--armor", "--export"])
                .arg(entry.fingerprint.to_hex());
            let armored = subprocess::run(&mut export).map_err(|e| self.spawn_error(e))?;
            let armored = self.finish("--export", armored)?;

            keys.push(PublicKeyInfo {
                fingerprint: entry.fingerprint,
                identities: entry.identities,
                expiry: entry.expiry,
                armored,
            });
        }
        Ok(keys)
    }

    fn secret_key_fingerprints(&self) -> Result<Vec<Fingerprint>, PgpError> {
        let mut command = self.command();
        command.args(["--with-colons", "--fixed-list-mode", "--list-secret-keys"]);
        let output = subprocess::run(&mut command).map_err(|e| self.spawn_error(e))?;
        let listing = self.finish("--list-secret-keys", output)?;

        Ok(parse_colons(&String::from_utf8_lossy(&listing), "sec")?
            .into_iter()
            .map(|entry| entry.fingerprint)
            .collect())
    }
}

/// One primary key from a `--with-colons` listing
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColonKey {
    fingerprint: Fingerprint,
    identities: Vec<String>,
    expiry: Option<DateTime<Utc>>,
    can_encrypt: bool,
    revoked: bool,
}

/// Parse primary keys of kind `primary` ("pub" or "sec")
///
/// Field numbers follow gpg's DETAILS document: 2 validity, 7 expiry,
/// 10 user id / fingerprint, 12 key capabilities. The first `fpr` after a
/// primary record is the primary key's fingerprint; later ones belong to
/// subkeys.
fn parse_colons(listing: &str, primary: &str) -> Result<Vec<ColonKey>, PgpError> {
    let mut keys: Vec<ColonKey> = Vec::new();
    let mut pending: Option<(Option<DateTime<Utc>>, bool, bool)> = None;

    for line in listing.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        let field = |n: usize| fields.get(n - 1).copied().unwrap_or("");

        match field(1) {
            kind if kind == primary => {
                let expiry = parse_expiry(field(7))?;
                let revoked = field(2) == "r";
                let can_encrypt = field(12).contains('E');
                pending = Some((expiry, can_encrypt, revoked));
            }
            "fpr" => {
                if let Some((expiry, can_encrypt, revoked)) = pending.take() {
                    let fingerprint = field(10)
                        .parse::<Fingerprint>()
                        .map_err(|e| PgpError::MalformedKey(e.to_string()))?;
                    keys.push(ColonKey {
                        fingerprint,
                        identities: Vec::new(),
                        expiry,
                        can_encrypt,
                        revoked,
                    });
                }
            }
            "uid" => {
                if let Some(key) = keys.last_mut() {
                    key.identities.push(unescape(field(10)));
                }
            }
            "sub" | "ssb" => pending = None,
            _ => {}
        }
    }
    Ok(keys)
}

fn parse_expiry(field: &str) -> Result<Option<DateTime<Utc>>, PgpError> {
    if field.is_empty() {
        return Ok(None);
    }
    let seconds: i64 = field
        .parse()
        .map_err(|_| PgpError::MalformedKey(format!("bad expiry {:?}", field)))?;
    Ok(Utc.timestamp_opt(seconds, 0).single())
}

/// Undo gpg's `\xHH` escaping of user ids
fn unescape(s: &str) -> String {
    let mut bytes = Vec::with_capacity(s.len());
    let raw = s.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && raw.get(i + 1) == Some(&b'x') && i + 3 < raw.len() {
            let byte = std::str::from_utf8(&raw[i + 2..i + 4])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                bytes.push(byte);
                i += 4;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    const PUBLIC_LISTING: &str = "\
tru::1:1700000000:0:3:1:5
pub:-:255:22:1A2B3C4D5E6F7081:1700000000:1900000000::-:::scESC::::::ed25519:::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:
uid:-::::1700000000::HASH::Alice Example <alice@example.com>::::::::::0:
sub:-:255:18:8877665544332211:1700000000::::::e::::::cv25519::
fpr:::::::::FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF:
pub:r:255:22:AAAABBBBCCCCDDDD:1700000000:::-:::sc::::::ed25519:::0:
fpr:::::::::89ABCDEF0123456789ABCDEF0123456789ABCDEF:
uid:r::::1700000000::HASH::Bob\\x3a Revoked::::::::::0:
";

    #[test]
    fn test_parse_public_listing() {
        let keys = parse_colons(PUBLIC_LISTING, "pub").unwrap();
        assert_eq!(keys.len(), 2);

        let alice = &keys[0];
        assert_eq!(
            alice.fingerprint.to_hex(),
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(alice.identities, vec!["Alice Example <alice@example.com>"]);
        assert_eq!(alice.expiry.unwrap().timestamp(), 1_900_000_000);
        assert!(alice.can_encrypt);
        assert!(!alice.revoked);

        let bob = &keys[1];
        assert!(bob.revoked);
        assert!(!bob.can_encrypt);
        assert_eq!(bob.expiry, None);
        assert_eq!(bob.identities, vec!["Bob: Revoked"]);
    }

    #[test]
    fn test_parse_secret_listing_ignores_subkeys() {
        let listing = "\
sec:u:255:22:1A2B3C4D5E6F7081:1700000000:::u:::scESC:::+:::ed25519:::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:
ssb:u:255:18:8877665544332211:1700000000::::::e:::+:::cv25519::
fpr:::::::::FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF:
";
        let keys = parse_colons(listing, "sec").unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(
            keys[0].fingerprint.to_hex(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_parse_rejects_bad_expiry() {
        let listing = "pub:-:255:22:1A2B:1700000000:soon::-:::scESC:\n";
        assert!(parse_colons(listing, "pub").is_err());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\x3ab"), "a:b");
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape("trailing\\x3"), "trailing\\x3");
    }
}
