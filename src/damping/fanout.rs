// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The damp-req fan-out: a one-shot voting primitive.
use super::proto::{DampReq, DampReqResponse, DampReqResult};
use crate::membership::{Member, MemberAddr, Membership};
use crate::transport::{DampReqTransport, TransportError};
use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;
use std::{future::Future, sync::Arc};
use thiserror::Error;
use tokio::task;

/// The error produced when a fan-out can no longer reach its quorum.
#[derive(Clone, Debug, Error)]
#[error(
    "unattainable quorum of {}: {} success(es), {} error(s)",
    .r_val, .successes, .errors.len()
)]
pub struct UnattainableQuorum {
    /// The flappers the round was initiated for.
    pub flappers: Vec<MemberAddr>,

    /// The quorum the round needed.
    pub r_val: usize,

    /// Successful responses accumulated before the abort.
    pub successes: usize,

    /// Errors accumulated from individual damp-requests.
    pub errors: Vec<TransportError>,
}

/// Send a damp-request naming `flappers` to every observer in parallel,
/// consuming responses as they arrive.
///
/// Resolves with the first `r_val` successful responses the moment they
/// exist, or with [UnattainableQuorum] the moment the outstanding requests
/// can no longer make up the difference. Resolution happens exactly once;
/// responses arriving afterwards are discarded, though their piggybacked
/// membership changes are still applied.
///
/// # Panics
/// Panics if `r_val` is zero or exceeds the number of observers.
pub async fn damp_req_fanout<M, T>(
    membership: &Arc<M>,
    transport: &Arc<T>,
    flappers: Vec<MemberAddr>,
    observers: Vec<Member>,
    r_val: usize,
) -> Result<Vec<DampReqResult>, UnattainableQuorum>
where
    M: Membership,
    T: DampReqTransport,
{
    assert!(r_val >= 1 && r_val <= observers.len());

    let n_val = observers.len();
    let req = DampReq {
        flappers: flappers.clone(),
    };

    let mut in_flight = (observers.into_iter())
        .map(|observer| {
            let transport = Arc::clone(transport);
            let req = req.clone();

            async move {
                let resp = transport.damp_req(&observer, req).await;
                (observer, resp)
            }
        })
        .collect::<FuturesUnordered<_>>();

    let mut successes = Vec::with_capacity(r_val);
    let mut errors = Vec::new();

    loop {
        let (observer, resp) = match in_flight.next().await {
            Some(arrived) => arrived,
            None => break,
        };

        match resp {
            Ok(resp) => {
                // apply the piggyback before recording the result.
                if !resp.changes.is_empty() {
                    membership.update(resp.changes).await;
                }

                successes.push(DampReqResult {
                    observer: observer.addr().clone(),
                    scores: resp.scores,
                });
            }

            Err(e) => {
                debug!("damp-req to {} failed: {}", observer.addr(), e);
                errors.push(e);
            }
        }

        if successes.len() >= r_val {
            task::spawn(apply_late_changes(in_flight, Arc::clone(membership)));
            return Ok(successes);
        }

        let remaining = n_val - (successes.len() + errors.len());
        if remaining < r_val - successes.len() {
            task::spawn(apply_late_changes(in_flight, Arc::clone(membership)));
            return Err(UnattainableQuorum {
                flappers,
                r_val,
                successes: successes.len(),
                errors,
            });
        }
    }

    // every response has been consumed without committing, which the abort
    // check rules out for any r_val within bounds.
    Err(UnattainableQuorum {
        flappers,
        r_val,
        successes: successes.len(),
        errors,
    })
}

/// Drain responses that arrive after the fan-out has resolved, applying
/// only their membership piggybacks.
async fn apply_late_changes<M, F>(mut in_flight: FuturesUnordered<F>, membership: Arc<M>)
where
    M: Membership,
    F: Future<Output = (Member, Result<DampReqResponse, TransportError>)>,
{
    while let Some((_, resp)) = in_flight.next().await {
        if let Ok(resp) = resp {
            if !resp.changes.is_empty() {
                membership.update(resp.changes).await;
            }
        }
    }
}
