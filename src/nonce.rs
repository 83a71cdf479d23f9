//! Per-signer nonce serialization
//!
//! A signer may have at most one extrinsic in flight between signing and its
//! first inclusion (`InBlock`). A second reservation in that window is a
//! [`CampaignError::NonceCollision`]; it is never resolved silently.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::NoncePolicy;
use crate::error::CampaignError;
use crate::types::Nonce;

#[derive(Debug, Default, Clone, Copy)]
struct SignerNonces {
    /// Next nonce after the last confirmed inclusion
    next: Option<Nonce>,
    in_flight: Option<Nonce>,
}

/// Tracks reserved and confirmed nonces for each signer address
#[derive(Debug, Default)]
pub struct NonceTracker {
    policy: NoncePolicy,
    signers: HashMap<String, SignerNonces>,
}

impl NonceTracker {
    pub fn new(policy: NoncePolicy) -> Self {
        Self {
            policy,
            signers: HashMap::new(),
        }
    }

    pub fn policy(&self) -> NoncePolicy {
        self.policy
    }

    /// Reserve the nonce for the signer's next extrinsic
    ///
    /// `chain_nonce` is the account nonce read just before signing.
    pub fn reserve(&mut self, signer: &str, chain_nonce: Nonce) -> Result<Nonce, CampaignError> {
        let entry = self.signers.entry(signer.to_string()).or_default();
        if let Some(nonce) = entry.in_flight {
            warn!(signer, nonce, "nonce collision");
            return Err(CampaignError::NonceCollision {
                signer: signer.to_string(),
                nonce,
            });
        }

        let nonce = match (self.policy, entry.next) {
            (NoncePolicy::Requery, Some(local)) => chain_nonce.max(local),
            (NoncePolicy::LocalIncrement, Some(local)) => local,
            (_, None) => chain_nonce,
        };
        entry.in_flight = Some(nonce);
        debug!(signer, nonce, chain_nonce, "nonce reserved");
        Ok(nonce)
    }

    /// Mark the reservation as included; the local counter moves past it
    ///
    /// Returns false if `nonce` was not the signer's reservation.
    pub fn commit(&mut self, signer: &str, nonce: Nonce) -> bool {
        match self.signers.get_mut(signer) {
            Some(entry) if entry.in_flight == Some(nonce) => {
                entry.in_flight = None;
                entry.next = Some(nonce.saturating_add(1));
                debug!(signer, nonce, "nonce committed");
                true
            }
            _ => false,
        }
    }

    /// Drop the reservation after a failure
    ///
    /// The local counter is invalidated as well, so the next reservation
    /// starts again from the chain nonce.
    pub fn release(&mut self, signer: &str, nonce: Nonce) -> bool {
        match self.signers.get_mut(signer) {
            Some(entry) if entry.in_flight == Some(nonce) => {
                entry.in_flight = None;
                entry.next = None;
                debug!(signer, nonce, "nonce released");
                true
            }
            _ => false,
        }
    }

    /// Forget the local counter, e.g. after an included extrinsic was usurped
    pub fn invalidate(&mut self, signer: &str) {
        if let Some(entry) = self.signers.get_mut(signer) {
            entry.next = None;
            debug!(signer, "local nonce invalidated");
        }
    }

    /// Nonce currently reserved for `signer`, if any
    pub fn in_flight(&self, signer: &str) -> Option<Nonce> {
        self.signers.get(signer).and_then(|entry| entry.in_flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SIGNER: &str = "5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr";

    #[test]
    fn test_second_reservation_collides() {
        let mut tracker = NonceTracker::default();
        assert_eq!(tracker.reserve(SIGNER, 4).unwrap(), 4);
        assert_eq!(
            tracker.reserve(SIGNER, 4),
            Err(CampaignError::NonceCollision {
                signer: SIGNER.to_string(),
                nonce: 4,
            })
        );
    }

    #[test]
    fn test_independent_signers_do_not_collide() {
        let mut tracker = NonceTracker::default();
        assert!(tracker.reserve(SIGNER, 0).is_ok());
        assert!(tracker.reserve("other", 0).is_ok());
    }

    #[rstest]
    #[case(NoncePolicy::Requery, 2, 5)]
    #[case(NoncePolicy::Requery, 9, 9)]
    #[case(NoncePolicy::LocalIncrement, 2, 5)]
    #[case(NoncePolicy::LocalIncrement, 9, 5)]
    fn test_reserve_after_commit(
        #[case] policy: NoncePolicy,
        #[case] chain_nonce: Nonce,
        #[case] expected: Nonce,
    ) {
        let mut tracker = NonceTracker::new(policy);
        tracker.reserve(SIGNER, 4).unwrap();
        assert!(tracker.commit(SIGNER, 4));
        assert_eq!(tracker.reserve(SIGNER, chain_nonce).unwrap(), expected);
    }

    #[test]
    fn test_release_invalidates_local_counter() {
        let mut tracker = NonceTracker::new(NoncePolicy::LocalIncrement);
        tracker.reserve(SIGNER, 4).unwrap();
        tracker.commit(SIGNER, 4);
        tracker.reserve(SIGNER, 4).unwrap();
        assert!(tracker.release(SIGNER, 5));
        assert_eq!(tracker.in_flight(SIGNER), None);
        assert_eq!(tracker.reserve(SIGNER, 3).unwrap(), 3);
    }

    #[test]
    fn test_invalidate_keeps_reservation() {
        let mut tracker = NonceTracker::new(NoncePolicy::LocalIncrement);
        tracker.reserve(SIGNER, 4).unwrap();
        tracker.commit(SIGNER, 4);
        tracker.invalidate(SIGNER);
        assert_eq!(tracker.reserve(SIGNER, 2).unwrap(), 2);
    }

    #[test]
    fn test_commit_requires_reservation() {
        let mut tracker = NonceTracker::default();
        assert!(!tracker.commit(SIGNER, 0));
        tracker.reserve(SIGNER, 1).unwrap();
        assert!(!tracker.commit(SIGNER, 0));
        assert!(!tracker.release(SIGNER, 0));
        assert_eq!(tracker.in_flight(SIGNER), Some(1));
    }
}
