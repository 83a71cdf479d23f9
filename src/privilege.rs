//! Extrinsics and root elevation

use blake2::{digest::consts::U32, Blake2b, Digest};
use serde::Serialize;

use crate::call::{encode_call, encode_sudo, Call, CallIndexTable};
use crate::error::CampaignError;
use crate::types::{Account, ExtrinsicHash, Nonce};

/// One operation to be signed and submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extrinsic {
    call: Call,
    signer: Account,
    privileged: bool,
}

impl Extrinsic {
    pub fn new(call: Call, signer: Account) -> Self {
        Self {
            call,
            signer,
            privileged: false,
        }
    }

    pub fn call(&self) -> &Call {
        &self.call
    }

    /// Effective signer for nonce and lifecycle purposes
    pub fn signer(&self) -> &Account {
        &self.signer
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Fix the nonce and encode; the result is immutable
    pub fn prepare(
        self,
        nonce: Nonce,
        table: &CallIndexTable,
    ) -> Result<PreparedExtrinsic, CampaignError> {
        let inner = encode_call(&self.call, table)?;
        let call_data = if self.privileged {
            encode_sudo(&inner, table)
        } else {
            inner
        };

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.signer.public_key());
        hasher.update(nonce.to_le_bytes());
        hasher.update(&call_data);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());

        Ok(PreparedExtrinsic {
            extrinsic: self,
            nonce,
            call_data,
            hash: ExtrinsicHash(hash),
        })
    }
}

/// Run `inner` under root authority via `Sudo.sudo`
///
/// Target and arguments are kept as they are. No authorization check is made
/// here: if `authority` is not the chain's sudo key the ledger rejects the
/// extrinsic and its status stream ends in `Invalid`.
pub fn elevate(inner: Extrinsic, authority: Account) -> Extrinsic {
    Extrinsic {
        call: inner.call,
        signer: authority,
        privileged: true,
    }
}

/// Extrinsic with its nonce fixed and call data encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedExtrinsic {
    extrinsic: Extrinsic,
    nonce: Nonce,
    call_data: Vec<u8>,
    hash: ExtrinsicHash,
}

impl PreparedExtrinsic {
    pub fn extrinsic(&self) -> &Extrinsic {
        &self.extrinsic
    }

    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Encoded call data (sudo-wrapped when privileged)
    pub fn call_data(&self) -> &[u8] {
        &self.call_data
    }

    pub fn hash(&self) -> ExtrinsicHash {
        self.hash
    }
}
