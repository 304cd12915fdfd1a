// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Scoring aggregation and the damp decision.
use super::proto::DampReqResult;
use crate::membership::MemberAddr;
use fnv::FnvHashMap;

/// Decide which members to damp from the aggregated responses of one
/// fan-out round.
///
/// Scores are grouped by scored member; a member is damped iff at least
/// `r_val` observers reported on it and every reported score is at or
/// above `suppress_limit`. Unanimity within the quorum is deliberate:
/// damping a correct node excludes it from dissemination, which hurts more
/// than letting a true flapper linger for another round.
///
/// The result is invariant under permutation of `results`; its order is
/// unspecified. Responders whose scores weren't a well-formed array are
/// skipped.
pub fn decide_damped(
    results: &[DampReqResult],
    r_val: usize,
    suppress_limit: f64,
) -> Vec<MemberAddr>
{
    let mut groups: FnvHashMap<&MemberAddr, Vec<f64>> = FnvHashMap::default();

    for scores in results.iter().filter_map(|r| r.scores.as_deref()) {
        for score in scores {
            groups.entry(&score.member).or_default().push(score.damp_score);
        }
    }

    (groups.into_iter())
        .filter(|(_, scores)| {
            scores.len() >= r_val && scores.iter().all(|s| *s >= suppress_limit)
        })
        .map(|(member, _)| member.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damping::proto::Score;
    use quickcheck_macros::quickcheck;
    use std::collections::HashSet;

    fn result(observer: &str, scores: &[(&str, f64)]) -> DampReqResult {
        DampReqResult {
            observer: observer.into(),
            scores: Some(
                (scores.iter())
                    .map(|(member, damp_score)| Score {
                        member: (*member).into(),
                        damp_score: *damp_score,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn unanimous_quorum_is_damped() {
        let results = [
            result("a:1", &[("x:1", 150.0)]),
            result("b:1", &[("x:1", 200.0)]),
            result("c:1", &[("x:1", 120.0)]),
        ];

        assert_eq!(vec![MemberAddr::from("x:1")], decide_damped(&results, 2, 100.0));
    }

    #[test]
    fn split_votes_are_not_damped() {
        let results = [
            result("a:1", &[("x:1", 200.0)]),
            result("b:1", &[("x:1", 50.0)]),
            result("c:1", &[("x:1", 50.0)]),
        ];

        assert!(decide_damped(&results, 2, 100.0).is_empty());
    }

    #[test]
    fn under_reported_members_are_not_damped() {
        let results = [result("a:1", &[("x:1", 150.0)])];

        assert!(decide_damped(&results, 2, 100.0).is_empty());
    }

    #[test]
    fn malformed_score_reports_are_skipped() {
        let results = [
            result("a:1", &[("x:1", 150.0)]),
            result("b:1", &[("x:1", 150.0)]),
            DampReqResult {
                observer: "c:1".into(),
                scores: None,
            },
        ];

        assert_eq!(vec![MemberAddr::from("x:1")], decide_damped(&results, 2, 100.0));
    }

    fn results_from(raw: &[Vec<(u8, u16)>]) -> Vec<DampReqResult> {
        (raw.iter().enumerate())
            .map(|(i, scores)| DampReqResult {
                observer: format!("observer-{}", i).into(),
                scores: Some(
                    (scores.iter())
                        .map(|(member, score)| Score {
                            member: format!("member-{}", member).into(),
                            damp_score: *score as f64,
                        })
                        .collect(),
                ),
            })
            .collect()
    }

    #[quickcheck]
    fn is_invariant_under_permutation(raw: Vec<Vec<(u8, u16)>>, r_val: u8, limit: u16) -> bool {
        let r_val = r_val as usize % 4 + 1;
        let limit = limit as f64;

        let forward = results_from(&raw);
        let mut backward = forward.clone();
        backward.reverse();

        let mut a = decide_damped(&forward, r_val, limit);
        let mut b = decide_damped(&backward, r_val, limit);
        a.sort();
        b.sort();

        a == b
    }

    #[quickcheck]
    fn is_a_subset_of_reported_members(raw: Vec<Vec<(u8, u16)>>, r_val: u8, limit: u16) -> bool {
        let results = results_from(&raw);

        let reported: HashSet<&MemberAddr> = (results.iter())
            .flat_map(|r| r.scores.as_deref().unwrap())
            .map(|s| &s.member)
            .collect();

        (decide_damped(&results, r_val as usize % 4 + 1, limit as f64).iter())
            .all(|member| reported.contains(member))
    }
}
