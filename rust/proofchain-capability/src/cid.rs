//! Content addressing for delegations.

use ipld_core::cid::{Cid, multihash::Multihash};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Multicodec code for DAG-CBOR.
pub const DAG_CBOR: u64 = 0x71;

/// Multicodec code for SHA2-256.
pub const SHA2_256: u64 = 0x12;

/// Errors computing a content address.
#[derive(Debug, Clone, Error)]
pub enum CidError {
    /// The value could not be encoded as DAG-CBOR.
    #[error("failed to encode as DAG-CBOR: {0}")]
    Encoding(String),

    /// The digest did not fit the multihash.
    #[error("failed to wrap digest: {0}")]
    Multihash(String),
}

/// Encodes `value` as DAG-CBOR.
pub fn to_dagcbor<T: Serialize>(value: &T) -> Result<Vec<u8>, CidError> {
    serde_ipld_dagcbor::to_vec(value).map_err(|error| CidError::Encoding(error.to_string()))
}

/// Computes the CIDv1 of the DAG-CBOR encoding of `value`.
pub fn to_dagcbor_cid<T: Serialize>(value: &T) -> Result<Cid, CidError> {
    let bytes = to_dagcbor(value)?;
    cid_of_block(&bytes)
}

/// Computes the CIDv1 of an already encoded DAG-CBOR block.
pub fn cid_of_block(bytes: &[u8]) -> Result<Cid, CidError> {
    let digest = Sha256::digest(bytes);
    let hash = Multihash::<64>::wrap(SHA2_256, &digest)
        .map_err(|error| CidError::Multihash(error.to_string()))?;
    Ok(Cid::new_v1(DAG_CBOR, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn it_addresses_equal_values_equally() -> TestResult {
        let a = to_dagcbor_cid(&("store/add", 1u8))?;
        let b = to_dagcbor_cid(&("store/add", 1u8))?;
        let c = to_dagcbor_cid(&("store/add", 2u8))?;

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.codec(), DAG_CBOR);
        assert_eq!(a.hash().code(), SHA2_256);
        Ok(())
    }
}
