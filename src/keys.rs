//! Per-player RSA keys used to seal ledger payloads.
//!
//! The scheme is intentionally light: 1024-bit RSA with PKCS#1 v1.5 padding,
//! plaintext cut into fixed blocks. It keeps a casual opponent from peeking
//! at a board in the savegame and nothing more.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::common::KeyError;

pub const KEY_BITS: usize = 1024;
/// Plaintext bytes sealed per RSA block.
pub const BLOCK_SIZE: usize = 72;

/// Either the local player's key pair or the opponent's public key.
pub struct KeyManager {
    own: Option<RsaPrivateKey>,
    public: RsaPublicKey,
    public_b64: String,
}

impl KeyManager {
    /// Load the identity stored at `path`, or create one there on first use.
    pub fn load_or_generate(path: &Path) -> Result<Self, KeyError> {
        if path.exists() {
            log::debug!("loading identity from {}", path.display());
            Self::load(path)
        } else {
            log::info!("creating new identity at {}", path.display());
            let km = Self::generate()?;
            km.store(path)?;
            Ok(km)
        }
    }

    /// Fresh key pair that only lives in memory.
    pub fn generate() -> Result<Self, KeyError> {
        let own = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let public = RsaPublicKey::from(&own);
        Self::assemble(Some(own), public)
    }

    /// Opponent key as published in a `PLAYER` record.
    pub fn from_public_base64(encoded: &str) -> Result<Self, KeyError> {
        let der = STANDARD
            .decode(encoded.trim())
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let public = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Self::assemble(None, public)
    }

    fn assemble(own: Option<RsaPrivateKey>, public: RsaPublicKey) -> Result<Self, KeyError> {
        let der = public
            .to_public_key_der()
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Ok(Self {
            own,
            public,
            public_b64: STANDARD.encode(der.as_bytes()),
        })
    }

    /// Read an existing identity; never creates one.
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let data = fs::read(path)?;
        let mut pos = 0;
        let private_der = read_chunk(&data, &mut pos)?;
        let public_der = read_chunk(&data, &mut pos)?;
        let own = RsaPrivateKey::from_pkcs8_der(private_der)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let public = RsaPublicKey::from_public_key_der(public_der)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Self::assemble(Some(own), public)
    }

    /// Write the identity file through a temp file so a crash never leaves a
    /// half-written key behind.
    fn store(&self, path: &Path) -> Result<(), KeyError> {
        let own = self.own.as_ref().ok_or(KeyError::NoPrivateKey)?;
        let private_der = own
            .to_pkcs8_der()
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let public_der = self
            .public
            .to_public_key_der()
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        {
            let mut out = File::create(&tmp)?;
            write_chunk(&mut out, private_der.as_bytes())?;
            write_chunk(&mut out, public_der.as_bytes())?;
            out.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Base64 SPKI encoding, the payload of a `PLAYER` record.
    pub fn public_key_base64(&self) -> &str {
        &self.public_b64
    }

    /// `true` for the local player's key pair.
    pub fn can_open(&self) -> bool {
        self.own.is_some()
    }

    /// Encrypt `plaintext` for the holder of this public key.
    pub fn seal(&self, plaintext: &str) -> Result<String, KeyError> {
        let bytes = plaintext.as_bytes();
        let mut blocks: Vec<&[u8]> = bytes.chunks(BLOCK_SIZE).collect();
        if blocks.is_empty() {
            blocks.push(&[]);
        }
        let mut sealed = Vec::with_capacity(blocks.len() * self.public.size());
        for block in blocks {
            let part = self
                .public
                .encrypt(&mut OsRng, Pkcs1v15Encrypt, block)
                .map_err(|e| KeyError::Encryption(e.to_string()))?;
            sealed.extend_from_slice(&part);
        }
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a payload sealed for this key pair.
    ///
    /// `DecryptionFailed` means the payload belongs to the other party.
    pub fn open(&self, sealed: &str) -> Result<String, KeyError> {
        let own = self.own.as_ref().ok_or(KeyError::NoPrivateKey)?;
        let data = STANDARD
            .decode(sealed.trim())
            .map_err(|_| KeyError::DecryptionFailed)?;
        let block = own.size();
        if data.is_empty() || data.len() % block != 0 {
            return Err(KeyError::DecryptionFailed);
        }
        let mut plain = Vec::with_capacity(data.len());
        for chunk in data.chunks(block) {
            let part = own
                .decrypt(Pkcs1v15Encrypt, chunk)
                .map_err(|_| KeyError::DecryptionFailed)?;
            plain.extend_from_slice(&part);
        }
        String::from_utf8(plain).map_err(|_| KeyError::DecryptionFailed)
    }

    /// Round-trip a short word, a multi-block string and `sample` through
    /// seal/open. A failure means the identity is unusable.
    pub fn self_test(&self, sample: &str) -> Result<(), KeyError> {
        let long = "A".repeat(200);
        for expected in ["BattleShip", long.as_str(), sample] {
            let got = self.open(&self.seal(expected)?)?;
            if got != expected {
                return Err(KeyError::SelfTestFailed {
                    expected: expected.to_string(),
                    got,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.public_b64.chars().rev().take(12).collect();
        f.debug_struct("KeyManager")
            .field("private", &self.own.is_some())
            .field("public", &format!("...{}", short.chars().rev().collect::<String>()))
            .finish()
    }
}

fn write_chunk(out: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    out.write_all(&(bytes.len() as u32).to_be_bytes())?;
    out.write_all(bytes)
}

fn read_chunk<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8], KeyError> {
    let truncated = || KeyError::InvalidKey("identity file is truncated".to_string());
    let header = data.get(*pos..*pos + 4).ok_or_else(truncated)?;
    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    *pos += 4;
    let chunk = data.get(*pos..*pos + len).ok_or_else(truncated)?;
    *pos += len;
    Ok(chunk)
}
