// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The damp-req wire transport, specified at its seam.
//!
//! Framing and delivery belong to the embedding node; the damper only needs
//! a way to exchange one [DampReq] for one [DampReqResponse] per observer.
use super::damping::proto::{DampReq, DampReqResponse};
use super::membership::Member;
use thiserror::Error;

/// An error produced by a single damp-request exchange.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TransportError {
    /// The observer did not respond in time.
    #[error("damp-req timed out")]
    Timeout,

    /// The exchange failed outright.
    #[error("damp-req failed: {}", .0)]
    Failed(String),
}

/// The transport used to exchange damp-requests with observers.
#[crate::async_trait]
pub trait DampReqTransport: Send + Sync + 'static {
    /// Send `req` to `target` and await its response.
    async fn damp_req(&self, target: &Member, req: DampReq)
        -> Result<DampReqResponse, TransportError>;
}
