//! RSA signing key material for access and refresh tokens.
//!
//! On boot the key pair is loaded from a directory, or generated when the
//! files are missing or older than the configured refresh interval. Three
//! files are kept side by side:
//!
//! | File              | Contents                           |
//! |-------------------|------------------------------------|
//! | `private_key.pem` | PKCS#8 RSA-2048 private key        |
//! | `public_key.pem`  | SPKI public key                    |
//! | `key_id.txt`      | random id stamped into `kid`       |

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use uuid::Uuid;

/// Modulus size of generated keys.
pub const KEY_BITS: usize = 2048;

const PRIVATE_KEY_FILE: &str = "private_key.pem";
const PUBLIC_KEY_FILE: &str = "public_key.pem";
const KEY_ID_FILE: &str = "key_id.txt";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Key storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RSA key generation failed: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("Key encoding failed: {0}")]
    Encoding(String),

    #[error("Invalid key material: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// The active signing key pair and its id.
pub struct KeyManager {
    key_id: String,
    private_pem: String,
    public_pem: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl KeyManager {
    /// Load the key pair from `dir`, regenerating it when any file is missing
    /// or the private key is older than `refresh_days`.
    ///
    /// Any I/O or parse failure is returned; callers at boot should treat it
    /// as fatal.
    pub fn load_or_generate(dir: &Path, refresh_days: u64) -> Result<Self, KeyError> {
        fs::create_dir_all(dir)?;
        let paths = KeyPaths::new(dir);

        if paths.all_exist() && !paths.is_stale(refresh_days)? {
            let manager = Self::from_pem(
                fs::read_to_string(&paths.key_id)?.trim().to_string(),
                fs::read_to_string(&paths.private_key)?,
                fs::read_to_string(&paths.public_key)?,
            )?;
            tracing::info!(key_id = %manager.key_id, dir = %dir.display(), "Loaded signing keys");
            return Ok(manager);
        }

        let manager = Self::generate()?;
        write_owner_only(&paths.private_key, &manager.private_pem)?;
        write_owner_only(&paths.public_key, &manager.public_pem)?;
        write_owner_only(&paths.key_id, &manager.key_id)?;
        tracing::info!(key_id = %manager.key_id, dir = %dir.display(), "Generated new signing keys");
        Ok(manager)
    }

    /// Generate a fresh in-memory key pair with a new key id.
    pub fn generate() -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encoding(e.to_string()))?
            .to_string();
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encoding(e.to_string()))?;

        Self::from_pem(Uuid::new_v4().simple().to_string(), private_pem, public_pem)
    }

    fn from_pem(key_id: String, private_pem: String, public_pem: String) -> Result<Self, KeyError> {
        if key_id.is_empty() {
            return Err(KeyError::Encoding("key id file is empty".into()));
        }
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())?;
        Ok(Self {
            key_id,
            private_pem,
            public_pem,
            encoding,
            decoding,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_pem
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

struct KeyPaths {
    private_key: PathBuf,
    public_key: PathBuf,
    key_id: PathBuf,
}

impl KeyPaths {
    fn new(dir: &Path) -> Self {
        Self {
            private_key: dir.join(PRIVATE_KEY_FILE),
            public_key: dir.join(PUBLIC_KEY_FILE),
            key_id: dir.join(KEY_ID_FILE),
        }
    }

    fn all_exist(&self) -> bool {
        self.private_key.is_file() && self.public_key.is_file() && self.key_id.is_file()
    }

    /// Age is measured from the private key's modification time.
    fn is_stale(&self, refresh_days: u64) -> Result<bool, KeyError> {
        let modified = fs::metadata(&self.private_key)?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        Ok(age >= Duration::from_secs(refresh_days.saturating_mul(SECONDS_PER_DAY)))
    }
}

fn write_owner_only(path: &Path, contents: &str) -> Result<(), KeyError> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
