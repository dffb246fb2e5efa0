//! Signature cipher parsing and URL resolution

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ResolveError;

/// Query parameter carrying the signature when the cipher names none
pub const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// Recovers a plaintext signature from its scrambled form
pub trait SignatureTransform {
    fn decipher(&mut self, encrypted: &str) -> Result<String, ResolveError>;
}

/// Parsed `signatureCipher` / `cipher` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCipher {
    /// Decoded base stream URL
    pub url: String,
    /// Scrambled signature
    pub signature: String,
    /// Query parameter name for the recovered signature
    pub signature_param: String,
}

impl SignatureCipher {
    /// Parse an `&`-delimited, percent-encoded cipher string.
    ///
    /// Each pair splits on its first `=` only. Later duplicates overwrite
    /// earlier ones. Only `%XX` escapes are decoded; a literal `+` stays `+`.
    pub fn parse(cipher: &str) -> Result<Self, ResolveError> {
        let escaped = cipher.replace('+', "%2B");
        let mut params: HashMap<String, String> = url::form_urlencoded::parse(escaped.as_bytes())
            .into_owned()
            .collect();

        let url = params
            .remove("url")
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ResolveError::CipherParse("missing `url` key".to_string()))?;
        let signature = params
            .remove("s")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResolveError::CipherParse("missing `s` key".to_string()))?;
        let signature_param = params
            .remove("sp")
            .filter(|sp| !sp.is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNATURE_PARAM.to_string());

        Ok(Self {
            url,
            signature,
            signature_param,
        })
    }

    /// Append the recovered signature to the base URL
    pub fn build_url(&self, signature: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.url, separator, self.signature_param, signature
        )
    }
}

/// Turns cipher strings into playable URLs using a signature transform
pub struct CipherResolver<'a> {
    transform: Option<&'a mut dyn SignatureTransform>,
    resolved: usize,
    failed: usize,
}

impl<'a> CipherResolver<'a> {
    /// Create a resolver backed by a transform
    pub fn new(transform: &'a mut dyn SignatureTransform) -> Self {
        Self {
            transform: Some(transform),
            resolved: 0,
            failed: 0,
        }
    }

    /// Create a resolver with no transform; every cipher fails to resolve
    pub fn unavailable() -> Self {
        Self {
            transform: None,
            resolved: 0,
            failed: 0,
        }
    }

    /// Resolve one cipher string into a final URL
    pub fn resolve(&mut self, cipher: &str) -> Result<String, ResolveError> {
        let result = self.resolve_inner(cipher);
        match &result {
            Ok(_) => self.resolved += 1,
            Err(e) => {
                self.failed += 1;
                warn!("Cipher resolution failed: {}", e);
            }
        }
        result
    }

    fn resolve_inner(&mut self, cipher: &str) -> Result<String, ResolveError> {
        let parsed = SignatureCipher::parse(cipher)?;
        let transform = self.transform.as_deref_mut().ok_or_else(|| {
            ResolveError::EngineUnusable("no signature decipherer available".to_string())
        })?;

        let signature = transform.decipher(&parsed.signature)?;
        debug!(
            "Deciphered signature ({} -> {} chars) into `{}`",
            parsed.signature.len(),
            signature.len(),
            parsed.signature_param
        );
        Ok(parsed.build_url(&signature))
    }

    /// Number of ciphers resolved so far
    pub fn resolved_count(&self) -> usize {
        self.resolved
    }

    /// Number of ciphers that failed so far
    pub fn failed_count(&self) -> usize {
        self.failed
    }
}
