// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Quorum-based flap damping for gossip membership rings.
//!
//! A member whose reachability oscillates rapidly produces a storm of
//! membership updates that destabilizes every peer. This crate implements
//! the damping subprotocol that lets a ring collectively decide, via a
//! quorum of independent observers, to suppress such a member for a bounded
//! interval and then automatically readmit it.
//!
//! The [Damper](damping::Damper) is the owning state machine; it consumes a
//! [Membership] table and a [DampReqTransport] supplied by the embedding
//! node, and is observable through [Subscription]s.
#![warn(rust_2018_idioms, missing_docs)]

#[macro_use]
mod macros;

mod collections;

pub mod config;
pub mod damping;
pub mod membership;
pub mod transport;

#[doc(inline)]
pub use config::DampConfig;
#[doc(inline)]
pub use damping::{
    decision::decide_damped,
    event::{Closed, DampingEvent, Subscription},
    fanout::{damp_req_fanout, UnattainableQuorum},
    proto::{DampReq, DampReqResponse, DampReqResult, MembershipChange, ProtocolError, Score},
    Damper, Flapper, RoundOutcome,
};
#[doc(inline)]
pub use membership::{Member, MemberAddr, Membership};
#[doc(inline)]
pub use transport::{DampReqTransport, TransportError};

/// A re-export of [async_trait](https://docs.rs/async-trait/latest/async_trait/) for
/// convenience.
#[doc(inline)]
pub use async_trait::async_trait;
