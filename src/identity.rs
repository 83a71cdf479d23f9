//! Secret phrase to account identity

use blake2::{digest::consts::U32, Blake2b, Digest};

use crate::config::ClientConfig;
use crate::error::CampaignError;
use crate::types::Account;

/// Maps a secret phrase to a stable signing identity
///
/// Implementations must be pure: the same phrase always yields the same account.
pub trait IdentityResolver {
    fn derive_identity(&self, phrase: &str) -> Result<Account, CampaignError>;
}

const KEY_DOMAIN: &[u8] = b"task-campaign/phrase-key/v1";
const WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Deterministic resolver for development chains and tests
///
/// Accepts mnemonic-shaped phrases (12 to 24 lowercase words) and `//Name`
/// development URIs. The public key is a Blake2b-256 digest of the normalized
/// phrase, not an sr25519 derivation; production signers plug in their own
/// [`IdentityResolver`].
#[derive(Debug, Clone, Copy)]
pub struct PhraseIdentityResolver {
    ss58_prefix: u16,
}

impl PhraseIdentityResolver {
    pub fn new(ss58_prefix: u16) -> Self {
        Self { ss58_prefix }
    }

    /// Resolver encoding addresses with the configured `ss58Prefix`
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.ss58_prefix)
    }

    pub fn ss58_prefix(&self) -> u16 {
        self.ss58_prefix
    }
}

impl Default for PhraseIdentityResolver {
    fn default() -> Self {
        Self::new(42)
    }
}

impl IdentityResolver for PhraseIdentityResolver {
    fn derive_identity(&self, phrase: &str) -> Result<Account, CampaignError> {
        let normalized = normalize_phrase(phrase)?;
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(normalized.as_bytes());
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&hasher.finalize());
        Account::from_public_key(public_key, self.ss58_prefix)
    }
}

fn normalize_phrase(phrase: &str) -> Result<String, CampaignError> {
    let phrase = phrase.trim();

    if let Some(name) = phrase.strip_prefix("//") {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CampaignError::InvalidPhrase(format!(
                "invalid development URI '{}'",
                phrase
            )));
        }
        return Ok(phrase.to_string());
    }

    let words: Vec<&str> = phrase.split_whitespace().collect();
    if !WORD_COUNTS.contains(&words.len()) {
        return Err(CampaignError::InvalidPhrase(format!(
            "expected 12, 15, 18, 21 or 24 words, got {}",
            words.len()
        )));
    }
    if let Some(word) = words
        .iter()
        .find(|w| !w.chars().all(|c| c.is_ascii_lowercase()))
    {
        return Err(CampaignError::InvalidPhrase(format!(
            "word '{}' is not lowercase ascii",
            word
        )));
    }
    Ok(words.join(" "))
}
