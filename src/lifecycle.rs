//! Extrinsic lifecycle tracking
//!
//! A submitted extrinsic moves through
//! `Ready -> Broadcast -> InBlock(h) -> Finalized(h)` on success, or ends in
//! `Dropped`, `Invalid` or `Usurped`. [`Subscription`] enforces that order on
//! whatever the node delivers: the stream is finite, stops at the first
//! terminal status, cannot be restarted, and releases its node-side handle
//! exactly once.

use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures::stream::{BoxStream, FusedStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chain::{ChainApi, ChainHandle};
use crate::error::CampaignError;
use crate::privilege::PreparedExtrinsic;
use crate::types::{BlockHash, ExtrinsicHash};

/// Status reported for one submitted extrinsic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "block", rename_all = "camelCase")]
pub enum ExtrinsicStatus {
    Ready,
    Broadcast,
    InBlock(BlockHash),
    Finalized(BlockHash),
    Dropped,
    Invalid,
    Usurped,
}

impl ExtrinsicStatus {
    /// No status may follow a terminal one
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtrinsicStatus::Finalized(_)
                | ExtrinsicStatus::Dropped
                | ExtrinsicStatus::Invalid
                | ExtrinsicStatus::Usurped
        )
    }

    /// Terminal statuses that mean the extrinsic did not take effect
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExtrinsicStatus::Dropped | ExtrinsicStatus::Invalid | ExtrinsicStatus::Usurped
        )
    }

    /// Whether the extrinsic is known to be included in a block
    pub fn is_included(&self) -> bool {
        matches!(self, ExtrinsicStatus::InBlock(_) | ExtrinsicStatus::Finalized(_))
    }

    pub fn block(&self) -> Option<BlockHash> {
        match self {
            ExtrinsicStatus::InBlock(hash) | ExtrinsicStatus::Finalized(hash) => Some(*hash),
            _ => None,
        }
    }

    /// Whether `self` may be delivered after `previous`
    ///
    /// `Ready -> InBlock` is accepted: single-node development chains include
    /// extrinsics without ever gossiping them.
    pub fn can_follow(&self, previous: Option<&ExtrinsicStatus>) -> bool {
        use ExtrinsicStatus::*;
        matches!(
            (previous, self),
            (None, Ready | Invalid)
                | (Some(Ready), Broadcast | InBlock(_) | Invalid)
                | (Some(Broadcast), InBlock(_) | Dropped | Invalid)
                | (Some(InBlock(_)), Finalized(_) | Usurped)
        )
    }
}

impl fmt::Display for ExtrinsicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtrinsicStatus::Ready => f.write_str("ready"),
            ExtrinsicStatus::Broadcast => f.write_str("broadcast"),
            ExtrinsicStatus::InBlock(hash) => write!(f, "inBlock({})", hash),
            ExtrinsicStatus::Finalized(hash) => write!(f, "finalized({})", hash),
            ExtrinsicStatus::Dropped => f.write_str("dropped"),
            ExtrinsicStatus::Invalid => f.write_str("invalid"),
            ExtrinsicStatus::Usurped => f.write_str("usurped"),
        }
    }
}

/// Node-side identifier of a status subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type ReleaseFn = Box<dyn FnOnce(SubscriptionId) + Send>;

/// Ordered, finite status stream for one extrinsic
///
/// Released on the first terminal status, on an out-of-order status, when the
/// underlying stream ends early, on an explicit [`Subscription::release`], or
/// on drop; whichever comes first, and only once.
pub struct Subscription {
    id: SubscriptionId,
    extrinsic: ExtrinsicHash,
    inner: BoxStream<'static, ExtrinsicStatus>,
    last: Option<ExtrinsicStatus>,
    finished: bool,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new<F>(
        id: SubscriptionId,
        extrinsic: ExtrinsicHash,
        statuses: BoxStream<'static, ExtrinsicStatus>,
        release: F,
    ) -> Self
    where
        F: FnOnce(SubscriptionId) + Send + 'static,
    {
        Self {
            id,
            extrinsic,
            inner: statuses,
            last: None,
            finished: false,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn extrinsic(&self) -> ExtrinsicHash {
        self.extrinsic
    }

    /// Last status delivered to the caller
    pub fn last_status(&self) -> Option<ExtrinsicStatus> {
        self.last
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Stop observing; no further statuses are delivered
    pub fn release(&mut self) {
        self.finished = true;
        if let Some(release) = self.release.take() {
            debug!(subscription = %self.id, extrinsic = %self.extrinsic, "releasing subscription");
            release(self.id);
        }
    }

    /// Drive the stream until a terminal status
    pub async fn terminal(&mut self) -> Result<ExtrinsicStatus, CampaignError> {
        while let Some(status) = self.next().await {
            let status = status?;
            if status.is_terminal() {
                return Ok(status);
            }
        }
        self.last.filter(|s| s.is_terminal()).ok_or_else(|| CampaignError::StreamClosed {
            extrinsic: self.extrinsic.to_string(),
        })
    }

    fn accept(&mut self, status: ExtrinsicStatus) -> Result<ExtrinsicStatus, CampaignError> {
        if !status.can_follow(self.last.as_ref()) {
            warn!(
                extrinsic = %self.extrinsic,
                from = ?self.last,
                to = %status,
                "out-of-order status"
            );
            let from = self.last;
            self.release();
            return Err(CampaignError::IllegalTransition { from, to: status });
        }
        debug!(extrinsic = %self.extrinsic, %status, "status");
        self.last = Some(status);
        if status.is_terminal() {
            self.release();
        }
        Ok(status)
    }
}

impl Stream for Subscription {
    type Item = Result<ExtrinsicStatus, CampaignError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(status)) => Poll::Ready(Some(this.accept(status))),
            Poll::Ready(None) => {
                this.release();
                Poll::Ready(Some(Err(CampaignError::StreamClosed {
                    extrinsic: this.extrinsic.to_string(),
                })))
            }
        }
    }
}

impl FusedStream for Subscription {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("extrinsic", &self.extrinsic)
            .field("last", &self.last)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Submit a prepared extrinsic and observe its status sequence
pub async fn observe<C>(
    chain: &C,
    handle: &ChainHandle,
    extrinsic: PreparedExtrinsic,
) -> Result<Subscription, CampaignError>
where
    C: ChainApi + ?Sized,
{
    debug!(
        extrinsic = %extrinsic.hash(),
        nonce = extrinsic.nonce(),
        "observing extrinsic"
    );
    chain.submit(handle, extrinsic).await
}
