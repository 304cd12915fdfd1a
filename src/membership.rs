// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The membership table collaborator, as seen by the damper.
use super::damping::proto::MembershipChange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, stable member identifier (a `host:port` string).
///
/// Addresses are pure equality keys; the damper assumes no structure beyond
/// total-order hashing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberAddr(String);

impl fmt::Display for MemberAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberAddr {
    fn from(addr: &str) -> Self {
        Self(addr.to_owned())
    }
}

impl From<String> for MemberAddr {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

impl MemberAddr {
    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A live cluster member, as resolved by the membership table.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    addr: MemberAddr,
    damp_score: f64,
}

impl Member {
    /// Create a member at `addr` with the locally maintained `damp_score`.
    pub fn new(addr: MemberAddr, damp_score: f64) -> Self {
        Self { addr, damp_score }
    }

    /// Returns the member's address.
    pub fn addr(&self) -> &MemberAddr {
        &self.addr
    }

    /// Returns the local damp score for this member.
    pub fn damp_score(&self) -> f64 {
        self.damp_score
    }
}

/// The membership table the damper calls into.
///
/// The damper is a writer ([make_damped](Membership::make_damped),
/// [update](Membership::update)) but never authoritative: cluster size,
/// member resolution, and the damped fraction all belong to the table.
/// Implementations are expected to serialize their own writes.
#[crate::async_trait]
pub trait Membership: Send + Sync + 'static {
    /// Returns up to `n` live, pingable members, excluding the listed
    /// addresses.
    async fn get_random_pingable_members(&self, n: usize, excluding: &[MemberAddr])
        -> Vec<Member>;

    /// Look up a member by address.
    async fn find_member_by_address(&self, addr: &MemberAddr) -> Option<Member>;

    /// Mark the member at `addr` as damped. Must be idempotent.
    async fn make_damped(&self, addr: &MemberAddr);

    /// Apply gossiped membership changes.
    async fn update(&self, changes: Vec<MembershipChange>);

    /// Returns the fraction of members currently damped, in `[0, 1]`.
    async fn get_damped_percentage(&self) -> f64;

    /// Returns pending dissemination to piggyback on a damp-req response.
    async fn issue_changes(&self) -> Vec<MembershipChange> {
        Vec::new()
    }
}
