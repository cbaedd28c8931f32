//! Ed25519 `did:key` principal, verifier and signer.

use crate::{
    did::Did,
    error::{Ed25519DidFromStrError, Ed25519SignerError},
    principal::{Principal, Signer, Verifier},
};
use base58::{FromBase58, ToBase58};
use std::{fmt, str::FromStr};

/// Multicodec header for an Ed25519 public key.
const ED25519_PUB: [u8; 2] = [0xed, 0x01];

/// An `Ed25519` `did:key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Verifier(pub ed25519_dalek::VerifyingKey);

impl From<ed25519_dalek::VerifyingKey> for Ed25519Verifier {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        Ed25519Verifier(key)
    }
}

impl fmt::Display for Ed25519Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw_bytes = Vec::with_capacity(34);
        raw_bytes.extend_from_slice(&ED25519_PUB);
        raw_bytes.extend_from_slice(self.0.as_bytes());
        write!(f, "did:key:z{}", raw_bytes.to_base58())
    }
}

impl FromStr for Ed25519Verifier {
    type Err = Ed25519DidFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "did" || parts[1] != "key" {
            return Err(Ed25519DidFromStrError::InvalidDidHeader);
        }
        let b58 = parts[2]
            .strip_prefix('z')
            .ok_or(Ed25519DidFromStrError::MissingBase58Prefix)?;
        let key_bytes = b58
            .from_base58()
            .map_err(|_| Ed25519DidFromStrError::InvalidBase58)?;
        let raw_arr = <[u8; 34]>::try_from(key_bytes.as_slice())
            .map_err(|_| Ed25519DidFromStrError::InvalidKey)?;
        if raw_arr[..2] != ED25519_PUB {
            return Err(Ed25519DidFromStrError::InvalidKey);
        }
        let key_arr: [u8; 32] = raw_arr[2..]
            .try_into()
            .map_err(|_| Ed25519DidFromStrError::InvalidKey)?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&key_arr)
            .map_err(|_| Ed25519DidFromStrError::InvalidKey)?;
        Ok(Ed25519Verifier(key))
    }
}

impl Principal for Ed25519Verifier {
    fn did(&self) -> Did {
        Did::from_encoded_key(self.to_string())
    }
}

impl Verifier for Ed25519Verifier {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), signature::Error> {
        let signature = ed25519_dalek::Signature::from_slice(signature)?;
        self.0.verify_strict(payload, &signature)
    }
}

/// An `Ed25519` `did:key` signer.
#[derive(Clone)]
pub struct Ed25519Signer {
    did: Ed25519Verifier,
    key: ed25519_dalek::SigningKey,
}

impl Ed25519Signer {
    /// Generate a new keypair from the operating system's randomness.
    pub fn generate() -> Result<Self, Ed25519SignerError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)?;
        Ok(Self::from_seed(&seed))
    }

    /// Import a keypair from a 32 byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        ed25519_dalek::SigningKey::from_bytes(seed).into()
    }

    /// Get the associated Ed25519 DID (verifier).
    pub const fn verifier(&self) -> &Ed25519Verifier {
        &self.did
    }
}

impl From<ed25519_dalek::SigningKey> for Ed25519Signer {
    fn from(key: ed25519_dalek::SigningKey) -> Self {
        Self {
            did: Ed25519Verifier(key.verifying_key()),
            key,
        }
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ed25519Signer")
            .field(&self.did.to_string())
            .finish()
    }
}

impl Principal for Ed25519Signer {
    fn did(&self) -> Did {
        self.did.did()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, signature::Error> {
        let signature: ed25519_dalek::Signature =
            ed25519_dalek::Signer::try_sign(&self.key, payload)?;
        Ok(signature.to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn it_round_trips_did_key() -> TestResult {
        let signer = Ed25519Signer::from_seed(&[7u8; 32]);
        let did = signer.did();
        assert!(did.as_str().starts_with("did:key:z6Mk"));

        let parsed: Ed25519Verifier = did.as_str().parse()?;
        assert_eq!(&parsed, signer.verifier());
        Ok(())
    }

    #[test]
    fn it_signs_and_verifies() -> TestResult {
        let signer = Ed25519Signer::from_seed(&[1u8; 32]);
        let signature = signer.sign(b"hello")?;

        signer.verifier().verify(b"hello", &signature)?;
        assert!(signer.verifier().verify(b"hellO", &signature).is_err());
        Ok(())
    }

    #[test]
    fn it_rejects_signature_from_other_key() -> TestResult {
        let alice = Ed25519Signer::from_seed(&[1u8; 32]);
        let bob = Ed25519Signer::from_seed(&[2u8; 32]);
        let signature = alice.sign(b"payload")?;

        assert!(bob.verifier().verify(b"payload", &signature).is_err());
        assert!(alice.verifier().verify(b"payload", &[0u8; 12]).is_err());
        Ok(())
    }

    #[test]
    fn it_rejects_non_ed25519_keys() {
        assert_eq!(
            "did:web:example.com".parse::<Ed25519Verifier>(),
            Err(Ed25519DidFromStrError::InvalidDidHeader)
        );
        assert_eq!(
            "did:key:6Mk".parse::<Ed25519Verifier>(),
            Err(Ed25519DidFromStrError::MissingBase58Prefix)
        );
        assert_eq!(
            "did:key:z0OIl".parse::<Ed25519Verifier>(),
            Err(Ed25519DidFromStrError::InvalidBase58)
        );
        assert_eq!(
            "did:key:zAbc".parse::<Ed25519Verifier>(),
            Err(Ed25519DidFromStrError::InvalidKey)
        );
    }

    #[test]
    fn it_generates_distinct_keys() -> TestResult {
        let a = Ed25519Signer::generate()?;
        let b = Ed25519Signer::generate()?;
        assert_ne!(a.did(), b.did());
        Ok(())
    }
}
