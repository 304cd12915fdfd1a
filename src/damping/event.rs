// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Damping events and subscriptions.
use super::proto::DampReqResult;
use crate::membership::MemberAddr;
use crate::transport::TransportError;
use futures::stream::{unfold, Stream};
use log::warn;
use thiserror::Error;
use tokio::sync::broadcast::{error::RecvError, Receiver};

/// An error returned by [recv](Subscription::recv) if the event source was
/// dropped.
///
/// If this error is received, the damper can be assumed to have stopped
/// executing.
#[derive(Copy, Clone, Debug, Error)]
#[error("closed")]
pub struct Closed;

/// A registered subscriber to damping events.
///
/// Subscribers register via [subscribe](super::Damper::subscribe) and
/// unregister by dropping the subscription.
pub struct Subscription {
    rx: Receiver<DampingEvent>,
}

impl Subscription {
    pub(crate) fn new(rx: Receiver<DampingEvent>) -> Self {
        Self { rx }
    }

    /// Resolves with the next damping event, or [Closed] when the damper
    /// is gone.
    ///
    /// A subscriber that falls too far behind misses events; lagged
    /// deliveries are skipped rather than surfaced as errors.
    pub async fn recv(&mut self) -> Result<DampingEvent, Closed> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Ok(event),
                Err(RecvError::Closed) => return Err(Closed),
                Err(RecvError::Lagged(n)) => warn!("damping subscription lagged: skipped {} event(s)", n),
            }
        }
    }

    /// Consume this subscription, converting it into a [Stream] of events.
    pub fn into_stream(self) -> impl Stream<Item = DampingEvent> {
        unfold(self, |mut s| async { Some((s.recv().await.ok()?, s)) })
    }
}

/// An event published by the damp controller.
#[derive(Clone, Debug)]
pub enum DampingEvent {
    /// A round was skipped because the damped fraction reached the
    /// cluster-wide cap.
    DampedLimitExceeded {
        /// Flappers tracked when the round was skipped.
        flappers: Vec<MemberAddr>,
        /// The damped fraction reported by membership.
        damped_percentage: f64,
        /// The configured cap.
        max_percentage: f64,
    },

    /// A round was skipped because no observers could be selected.
    DampReqUnsatisfied {
        /// Flappers tracked when the round was skipped.
        flappers: Vec<MemberAddr>,
        /// The configured fan-out width.
        n_val: usize,
        /// The configured quorum.
        r_val: usize,
    },

    /// A fan-out ended without reaching its quorum.
    DampReqFailed {
        /// Flappers the round was initiated for.
        flappers: Vec<MemberAddr>,
        /// The quorum the round needed.
        r_val: usize,
        /// Errors accumulated from individual damp-requests.
        errors: Vec<TransportError>,
    },

    /// A fan-out is in flight.
    DampingInProgress {
        /// Flappers the round was initiated for.
        flappers: Vec<MemberAddr>,
        /// The observers selected for this round.
        observers: Vec<MemberAddr>,
        /// The quorum in effect after adjustment to the observer count.
        r_val: usize,
    },

    /// A quorum responded, but no flapper met the damping criteria.
    DampingUnconfirmed {
        /// Flappers the round was initiated for.
        flappers: Vec<MemberAddr>,
        /// The per-observer results the decision was made from.
        results: Vec<DampReqResult>,
    },

    /// A member was committed to the damped set.
    Damped {
        /// The damped member's address.
        addr: MemberAddr,
    },

    /// A damped member was released after its suppress duration elapsed.
    Undamped {
        /// The released member's address.
        addr: MemberAddr,
    },
}
