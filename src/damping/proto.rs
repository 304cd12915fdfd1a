// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Wire bodies used in the damp-req exchange.
use crate::membership::MemberAddr;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An error produced when decoding a damp-req body.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The body was not valid JSON, or its `flappers` field was missing or
    /// not an array.
    #[error("bad damp-req body: {}", .0)]
    BadBody(#[from] serde_json::Error),
}

/// A damp-request body: the flappers the sender wants opinions on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DampReq {
    /// Addresses of the suspected flappers.
    pub flappers: Vec<MemberAddr>,
}

impl DampReq {
    /// Decode a request body.
    ///
    /// Bodies whose `flappers` field is missing or not an array of
    /// addresses are rejected.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(ProtocolError::BadBody)
    }

    /// Encode this request as a JSON body.
    pub fn to_vec(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("damp-req bodies always serialize")
    }
}

/// A damp-request response body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DampReqResponse {
    /// Damp scores for the flappers the responder could resolve.
    ///
    /// `None` when the responder sent something other than an array. Such
    /// responses still count toward quorum, but contribute no votes.
    #[serde(default, deserialize_with = "lenient_scores", skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<Score>>,

    /// Piggybacked membership changes, applied to the local table on
    /// receipt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<MembershipChange>,
}

impl DampReqResponse {
    /// Decode a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(ProtocolError::BadBody)
    }

    /// Encode this response as a JSON body.
    pub fn to_vec(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("damp-req bodies always serialize")
    }
}

/// One observer's damp score for one member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// The scored member's address.
    pub member: MemberAddr,

    /// The observer's damp score for that member. Higher is flappier.
    #[serde(rename = "dampScore")]
    pub damp_score: f64,
}

/// An opaque membership change, carried verbatim to
/// [Membership::update](crate::membership::Membership::update).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipChange(pub Value);

/// A successful damp-req response, tagged with the observer that sent it.
#[derive(Clone, Debug, PartialEq)]
pub struct DampReqResult {
    /// The responding observer's address.
    pub observer: MemberAddr,

    /// The scores it reported, if it reported a well-formed array.
    pub scores: Option<Vec<Score>>,
}

/// Tolerate responders whose `scores` field isn't an array of score tuples.
fn lenient_scores<'de, D>(de: D) -> Result<Option<Vec<Score>>, D::Error>
where D: Deserializer<'de> {
    let v = Value::deserialize(de)?;

    match v {
        Value::Array(_) => Ok(serde_json::from_value(v).ok()),
        _ => Ok(None),
    }
}
