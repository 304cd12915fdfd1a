// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Fan-out quorum behavior over a scripted transport.

use quell::{damp_req_fanout, DampReqResponse, Member, MemberAddr, MembershipChange, TransportError};
use serde_json::json;
use shared::{init_logger, member, scores_reply, Reply, StubMembership, StubTransport};
use std::{collections::HashSet, time::Duration};
use tokio::time::{sleep, timeout};

fn observers(addrs: &[&str]) -> Vec<Member> {
    addrs.iter().map(|a| member(a, 0.0)).collect()
}

fn change(tag: &str) -> MembershipChange {
    MembershipChange(json!({ "address": tag, "status": "suspect" }))
}

#[tokio::test]
async fn commits_with_a_full_quorum() {
    init_logger();
    let membership = StubMembership::empty();
    let transport = StubTransport::new();
    transport.script("a:1", scores_reply(&[("x:1", 100.0)]));
    transport.script("b:1", scores_reply(&[("x:1", 200.0)]));
    transport.script(
        "c:1",
        Reply::Respond(DampReqResponse {
            scores: Some(vec![]),
            changes: vec![change("c:1")],
        }),
    );

    let results = damp_req_fanout(
        &membership,
        &transport,
        vec!["x:1".into()],
        observers(&["a:1", "b:1", "c:1"]),
        3,
    )
    .await
    .unwrap();

    // each result is tagged with the observer that produced it.
    assert_eq!(3, results.len());
    let tagged: HashSet<&str> = results.iter().map(|r| r.observer.as_str()).collect();
    assert_eq!(
        ["a:1", "b:1", "c:1"].iter().copied().collect::<HashSet<_>>(),
        tagged
    );

    // the piggyback was applied before the fan-out resolved.
    assert_eq!(vec![change("c:1")], membership.updates());

    // every observer got the full flapper list.
    for (_, req) in transport.requests() {
        assert_eq!(vec![MemberAddr::from("x:1")], req.flappers);
    }
}

#[tokio::test(start_paused = true)]
async fn commits_early_and_still_applies_late_changes() {
    init_logger();
    let membership = StubMembership::empty();
    let transport = StubTransport::new();
    transport.script("a:1", scores_reply(&[("x:1", 100.0)]));
    transport.script("b:1", scores_reply(&[("x:1", 150.0)]));
    transport.script(
        "c:1",
        Reply::Slow(
            Duration::from_millis(500),
            DampReqResponse {
                scores: Some(vec![]),
                changes: vec![change("late:1")],
            },
        ),
    );

    let results = damp_req_fanout(
        &membership,
        &transport,
        vec!["x:1".into()],
        observers(&["a:1", "b:1", "c:1"]),
        2,
    )
    .await
    .unwrap();

    // quorum reached with the two fast responses; the slow one is not part
    // of the result.
    assert_eq!(2, results.len());
    assert!(results.iter().all(|r| r.observer.as_str() != "c:1"));
    assert!(membership.updates().is_empty());

    // the late response is discarded, but its piggyback still lands.
    sleep(Duration::from_secs(1)).await;
    assert_eq!(vec![change("late:1")], membership.updates());
}

#[tokio::test]
async fn aborts_as_soon_as_the_quorum_is_unattainable() {
    init_logger();
    let membership = StubMembership::empty();
    let transport = StubTransport::new();
    transport.script("a:1", Reply::Fail(TransportError::Timeout));
    transport.script("b:1", Reply::Hang);
    transport.script("c:1", Reply::Hang);

    // with r = n = 3, a single error settles it; the hung observers never
    // get a say, and there is no second resolution to wait for.
    let fanout = damp_req_fanout(
        &membership,
        &transport,
        vec!["x:1".into()],
        observers(&["a:1", "b:1", "c:1"]),
        3,
    );

    let err = timeout(Duration::from_secs(5), fanout)
        .await
        .expect("the abort should not wait on hung observers")
        .unwrap_err();

    assert_eq!(3, err.r_val);
    assert_eq!(0, err.successes);
    assert_eq!(vec![TransportError::Timeout], err.errors);
    assert_eq!(vec![MemberAddr::from("x:1")], err.flappers);
}

#[tokio::test]
async fn aborts_when_errors_outnumber_the_slack() {
    init_logger();
    let membership = StubMembership::empty();
    let transport = StubTransport::new();
    transport.script("a:1", Reply::Fail(TransportError::Timeout));
    transport.script("b:1", Reply::Fail(TransportError::Failed("refused".to_owned())));
    transport.script("c:1", Reply::Hang);

    // r = 2 over 3 observers tolerates one error; the second is fatal.
    let err = damp_req_fanout(
        &membership,
        &transport,
        vec!["x:1".into()],
        observers(&["a:1", "b:1", "c:1"]),
        2,
    )
    .await
    .unwrap_err();

    assert_eq!(2, err.errors.len());
    assert_eq!(0, err.successes);
}

#[tokio::test]
async fn tolerated_errors_do_not_abort() {
    init_logger();
    let membership = StubMembership::empty();
    let transport = StubTransport::new();
    transport.script("a:1", Reply::Fail(TransportError::Timeout));
    transport.script("b:1", scores_reply(&[("x:1", 100.0)]));
    transport.script("c:1", scores_reply(&[("x:1", 150.0)]));

    let results = damp_req_fanout(
        &membership,
        &transport,
        vec!["x:1".into()],
        observers(&["a:1", "b:1", "c:1"]),
        2,
    )
    .await
    .unwrap();

    assert_eq!(2, results.len());
}
