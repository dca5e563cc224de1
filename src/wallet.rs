//! Credential loading

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::path::Path;
use std::sync::Arc;

/// Signing credential of the caller
#[derive(Clone)]
pub struct Credential {
    keypair: Arc<Keypair>,
}

impl Credential {
    /// Load from a keypair file (JSON byte array or raw 64 bytes)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let keypair_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path.display()))?;

        let bytes = if keypair_bytes.len() == 64 {
            keypair_bytes
        } else {
            serde_json::from_slice::<Vec<u8>>(&keypair_bytes)
                .context("Failed to parse keypair JSON")?
        };
        Self::from_bytes(&bytes)
    }

    /// Load from a base58-encoded 64-byte secret key
    pub fn from_base58(secret: &str) -> Result<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .context("Invalid base58 secret key")?;
        Self::from_bytes(&bytes)
    }

    /// Path if it names an existing file, otherwise a base58 secret
    pub fn from_setting(value: &str) -> Result<Self> {
        let expanded = expand_home(value);
        if Path::new(&expanded).is_file() {
            Self::from_file(&expanded)
        } else if looks_like_path(value) {
            anyhow::bail!("Keypair file not found: {}", expanded)
        } else {
            Self::from_base58(value)
        }
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes).context("Invalid keypair bytes")?;
        Ok(Self::from_keypair(keypair))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

fn looks_like_path(value: &str) -> bool {
    value.contains('/') || value.contains('\\') || value.ends_with(".json")
}

fn expand_home(value: &str) -> String {
    match (value.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}/{rest}"),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_and_raw_files() {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();

        let mut json = tempfile::NamedTempFile::new().unwrap();
        json.write_all(serde_json::to_string(&bytes.to_vec()).unwrap().as_bytes())
            .unwrap();
        assert_eq!(Credential::from_file(json.path()).unwrap().pubkey(), keypair.pubkey());

        let mut raw = tempfile::NamedTempFile::new().unwrap();
        raw.write_all(&bytes).unwrap();
        assert_eq!(Credential::from_file(raw.path()).unwrap().pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_base58_secret() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();
        assert_eq!(Credential::from_setting(&encoded).unwrap().pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_zero_key_rejected() {
        let mut raw = tempfile::NamedTempFile::new().unwrap();
        raw.write_all(&[0u8; 64]).unwrap();
        let err = Credential::from_file(raw.path()).err().unwrap();
        assert!(err.to_string().contains("all-zero"));
    }

    #[test]
    fn test_missing_path_reported() {
        let err = Credential::from_setting("/no/such/id.json").err().unwrap();
        assert!(err.to_string().contains("not found"));
    }
}
