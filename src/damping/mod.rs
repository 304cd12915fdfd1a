// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! A quorum-based flap damping subprotocol.
//!
//! A node that sees a member flap asks `n_val` randomly selected observers
//! for their damp scores on it; if a quorum of `r_val` responses arrives
//! and every reported score clears the suppress limit, the member is
//! damped: excluded from dissemination and pinging until its suppress
//! duration elapses.
//!
//! # References
//! * [SWIM: Scalable Weakly-consistent Infection-style Process Group Membership Protocol][swim]
//! * [BGP Route Flap Damping][rfc2439]
//!
//! [swim]: https://www.cs.cornell.edu/projects/Quicksilver/public_pdfs/SWIM.pdf
//! [rfc2439]: https://tools.ietf.org/html/rfc2439
pub mod decision;
pub mod event;
pub mod fanout;
pub mod proto;

use crate::collections::TimedSet;
use crate::config::DampConfig;
use crate::membership::{MemberAddr, Membership};
use crate::transport::DampReqTransport;
use decision::decide_damped;
use event::{DampingEvent, Subscription};
use fanout::damp_req_fanout;
use proto::{DampReq, DampReqResponse, Score};

use fnv::FnvHashMap;
use log::{info, warn};
use std::sync::Arc;
use tokio::{
    sync::{broadcast, RwLock},
    task,
    time::{sleep, Instant},
};

/// A suspected flapper, as handed over by the failure detector.
#[derive(Clone, Debug, PartialEq)]
pub struct Flapper {
    addr: MemberAddr,
    observed_at: Instant,
}

impl Flapper {
    /// Flag the member at `addr` as flapping, observed now.
    pub fn new(addr: MemberAddr) -> Self {
        Self {
            addr,
            observed_at: Instant::now(),
        }
    }

    /// Returns the flapper's address.
    pub fn addr(&self) -> &MemberAddr {
        &self.addr
    }

    /// Returns when the detector flagged the flapper.
    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }
}

/// The outcome of one subprotocol round.
#[derive(Clone, Debug, PartialEq)]
pub enum RoundOutcome {
    /// The round was skipped: the damped fraction is at or above the cap.
    LimitExceeded,

    /// The round was skipped: no observers were available.
    Unsatisfied,

    /// The fan-out could not reach its quorum.
    Failed,

    /// A quorum responded, but no flapper met the damping criteria.
    Inconclusive,

    /// The listed members were damped.
    Damped(Vec<MemberAddr>),
}

impl RoundOutcome {
    /// Whether the damp timer re-arms after this outcome.
    ///
    /// Skipped rounds never signal the round's completion continuation, so
    /// they stall the re-arm chain until the flapper set restarts the
    /// timer.
    fn rearms(&self) -> bool {
        !matches!(self, RoundOutcome::LimitExceeded | RoundOutcome::Unsatisfied)
    }
}

/// A generation-stamped timer flag.
///
/// The owning task re-checks its generation at every wake; a stale
/// generation means the timer was stopped (or restarted) while the task
/// slept, and the task exits without acting. An in-flight round is never
/// interrupted by a stop; its re-arm check simply fails afterwards.
#[derive(Default)]
struct Timer {
    armed: bool,
    generation: u64,
}

impl Timer {
    /// Arm the timer, returning the generation the owning task must check
    /// against.
    fn arm(&mut self) -> u64 {
        self.armed = true;
        self.generation += 1;
        self.generation
    }

    /// Disarm the timer, invalidating the owning task.
    fn disarm(&mut self) {
        if self.armed {
            self.armed = false;
            self.generation += 1;
        }
    }

    /// Whether the task armed at `generation` is still current.
    fn is_live(&self, generation: u64) -> bool {
        self.armed && self.generation == generation
    }
}

struct State {
    flappers: FnvHashMap<MemberAddr, Flapper>,
    damped: TimedSet<MemberAddr>,
    damp_timer: Timer,
    expire_timer: Timer,
}

struct Core<M, T> {
    cfg: DampConfig,
    membership: Arc<M>,
    transport: Arc<T>,
    state: RwLock<State>,
    events: broadcast::Sender<DampingEvent>,
}

/// The damp controller.
///
/// Tracks the flappers reported by the failure detector, periodically runs
/// damp-req voting rounds against them, commits confirmed flappers to a
/// damped set (capped at a cluster-wide fraction), and releases entries
/// once their suppress duration elapses.
///
/// The controller is a cheaply cloneable handle; timer tasks hold clones
/// of it. It is observable through [subscribe](Damper::subscribe), and all
/// errors inside the subprotocol are recovered locally; none escape.
pub struct Damper<M, T> {
    core: Arc<Core<M, T>>,
}

impl<M, T> Clone for Damper<M, T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<M: Membership, T: DampReqTransport> Damper<M, T> {
    /// Create a damper over the provided membership table and transport.
    ///
    /// # Panics
    /// Panics if `cfg` violates any invariant listed at [DampConfig].
    pub fn new(cfg: DampConfig, membership: Arc<M>, transport: Arc<T>) -> Self {
        cfg.validate();

        let (events, _) = broadcast::channel(16);

        Self {
            core: Arc::new(Core {
                cfg,
                membership,
                transport,
                state: RwLock::new(State {
                    flappers: FnvHashMap::default(),
                    damped: TimedSet::new(),
                    damp_timer: Timer::default(),
                    expire_timer: Timer::default(),
                }),
                events,
            }),
        }
    }

    /// Register a subscriber for damping events.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.core.events.subscribe())
    }

    /// Track `flapper` as a damping candidate.
    ///
    /// Idempotent: an address that is already tracked or already damped is
    /// left untouched. Starts the damp timer when the set becomes
    /// non-empty.
    pub async fn add_flapper(&self, flapper: Flapper) {
        let mut state = self.core.state.write().await;

        if state.damped.contains(flapper.addr()) {
            log_skip!("{} is already damped; not tracking as flapper", flapper.addr());
        }
        if state.flappers.contains_key(flapper.addr()) {
            log_skip!("{} is already tracked as a flapper", flapper.addr());
        }

        info!("tracking flapper {}", flapper.addr());
        let addr = flapper.addr().clone();
        state.flappers.insert(addr, flapper);

        if state.flappers.len() == 1 {
            self.start_damp_timer(&mut state);
        }
    }

    /// Stop tracking the flapper at `addr`.
    ///
    /// Idempotent: an untracked address is left untouched. Stops the damp
    /// timer when the set empties.
    pub async fn remove_flapper(&self, addr: &MemberAddr) {
        let mut state = self.core.state.write().await;

        if state.flappers.remove(addr).is_none() {
            log_skip!("{} is not tracked as a flapper", addr);
        }

        info!("no longer tracking flapper {}", addr);

        if state.flappers.is_empty() {
            state.damp_timer.disarm();
        }
    }

    /// Returns the number of tracked flappers.
    pub async fn flapper_count(&self) -> usize {
        self.core.state.read().await.flappers.len()
    }

    /// Returns the addresses of all tracked flappers, in no particular
    /// order.
    pub async fn flapper_addresses(&self) -> Vec<MemberAddr> {
        let state = self.core.state.read().await;
        state.flappers.keys().cloned().collect()
    }

    /// Returns whether the member at `addr` is currently damped.
    pub async fn damped_contains(&self, addr: &MemberAddr) -> bool {
        self.core.state.read().await.damped.contains(addr)
    }

    /// Returns the number of members committed to the damped set.
    pub async fn damped_count(&self) -> usize {
        self.core.state.read().await.damped.len()
    }

    /// Returns whether the damp timer is enabled.
    pub async fn damp_timer_enabled(&self) -> bool {
        self.core.state.read().await.damp_timer.armed
    }

    /// Returns whether the expiration timer is enabled.
    pub async fn expiration_timer_enabled(&self) -> bool {
        self.core.state.read().await.expire_timer.armed
    }

    /// Run one subprotocol round against the currently tracked flappers.
    ///
    /// Rounds are normally driven by the damp timer, which keeps at most
    /// one fan-out in flight at a time; direct initiation is primarily
    /// useful for embedding nodes that drive damping themselves.
    pub async fn initiate_subprotocol(&self) -> RoundOutcome {
        let flappers = self.flapper_addresses().await;

        let damped_percentage = self.core.membership.get_damped_percentage().await;
        if damped_percentage >= self.core.cfg.damped_max_percentage {
            warn!(
                "damped member limit exceeded: {:.3} >= {:.3}",
                damped_percentage, self.core.cfg.damped_max_percentage
            );
            self.publish(DampingEvent::DampedLimitExceeded {
                flappers,
                damped_percentage,
                max_percentage: self.core.cfg.damped_max_percentage,
            });
            return RoundOutcome::LimitExceeded;
        }

        let observers = (self.core.membership)
            .get_random_pingable_members(self.core.cfg.n_val, &flappers)
            .await;

        let r_val = self.core.cfg.r_val.min(observers.len());
        if r_val == 0 {
            warn!("no pingable observers for {} flapper(s)", flappers.len());
            self.publish(DampingEvent::DampReqUnsatisfied {
                flappers,
                n_val: self.core.cfg.n_val,
                r_val: self.core.cfg.r_val,
            });
            return RoundOutcome::Unsatisfied;
        }

        self.publish(DampingEvent::DampingInProgress {
            flappers: flappers.clone(),
            observers: observers.iter().map(|o| o.addr().clone()).collect(),
            r_val,
        });

        let fanned_out = damp_req_fanout(
            &self.core.membership,
            &self.core.transport,
            flappers.clone(),
            observers,
            r_val,
        )
        .await;

        let results = match fanned_out {
            Ok(results) => results,

            Err(e) => {
                warn!("damp-req fan-out failed: {}", e);
                self.publish(DampingEvent::DampReqFailed {
                    flappers: e.flappers,
                    r_val: e.r_val,
                    errors: e.errors,
                });
                return RoundOutcome::Failed;
            }
        };

        let decision = decide_damped(&results, r_val, self.core.cfg.suppress_limit);
        if decision.is_empty() {
            info!("damping inconclusive: no flapper met the suppress criteria");
            self.publish(DampingEvent::DampingUnconfirmed { flappers, results });
            return RoundOutcome::Inconclusive;
        }

        for addr in &decision {
            self.core.membership.make_damped(addr).await;
        }

        let mut state = self.core.state.write().await;
        let now = Instant::now();

        for addr in &decision {
            state.flappers.remove(addr);
            if state.damped.insert(addr.clone(), now) {
                info!("damped member {}", addr);
            }
            self.publish(DampingEvent::Damped { addr: addr.clone() });
        }

        if state.flappers.is_empty() {
            state.damp_timer.disarm();
        }
        self.start_expire_timer(&mut state);

        RoundOutcome::Damped(decision)
    }

    /// Handle a damp-request from a peer: report a damp score for each
    /// listed flapper present in the local membership table.
    ///
    /// Members that cannot be resolved are omitted, not scored as zero.
    /// The response carries any pending dissemination as its changes
    /// piggyback.
    pub async fn handle_damp_req(&self, req: DampReq) -> DampReqResponse {
        let mut scores = Vec::with_capacity(req.flappers.len());

        for addr in &req.flappers {
            if let Some(member) = self.core.membership.find_member_by_address(addr).await {
                scores.push(Score {
                    member: member.addr().clone(),
                    damp_score: member.damp_score(),
                });
            }
        }

        DampReqResponse {
            scores: Some(scores),
            changes: self.core.membership.issue_changes().await,
        }
    }

    /// Arm the damp timer and spawn its task.
    fn start_damp_timer(&self, state: &mut State) {
        if state.damp_timer.armed {
            log_skip!("damp timer is already enabled");
        }

        let generation = state.damp_timer.arm();
        task::spawn(self.clone().run_damp_timer(generation));
    }

    /// Drive subprotocol rounds until the timer is stopped or a round
    /// stalls the chain.
    ///
    /// The timer is a single-shot re-armed after each round's completion,
    /// not a fixed periodic interval: a slow fan-out delays the next tick
    /// rather than overlapping with it.
    async fn run_damp_timer(self, generation: u64) {
        loop {
            sleep(self.core.cfg.damp_timer_interval).await;

            if !self.damp_timer_live(generation).await {
                return;
            }

            let outcome = self.initiate_subprotocol().await;

            if !outcome.rearms() || !self.damp_timer_live(generation).await {
                return;
            }
        }
    }

    async fn damp_timer_live(&self, generation: u64) -> bool {
        self.core.state.read().await.damp_timer.is_live(generation)
    }

    /// Arm the expiration timer and spawn its task, if not already armed.
    fn start_expire_timer(&self, state: &mut State) {
        if state.expire_timer.armed || state.damped.is_empty() {
            return;
        }

        let generation = state.expire_timer.arm();
        task::spawn(self.clone().run_expire_timer(generation));
    }

    /// Scan the damped set on every tick until it drains.
    async fn run_expire_timer(self, generation: u64) {
        loop {
            sleep(self.core.cfg.expiration_interval).await;

            if !self.expire_timer_live(generation).await {
                return;
            }

            if !self.expire_damped_members().await {
                return;
            }
        }
    }

    async fn expire_timer_live(&self, generation: u64) -> bool {
        self.core.state.read().await.expire_timer.is_live(generation)
    }

    /// Release every damped member whose suppress duration has elapsed.
    ///
    /// Returns whether the expiration timer should re-arm; once the set
    /// drains, the timer is disarmed until the next commit.
    async fn expire_damped_members(&self) -> bool {
        let mut state = self.core.state.write().await;
        let now = Instant::now();

        for addr in state.damped.expire(now, self.core.cfg.suppress_duration) {
            info!("releasing damped member {}", addr);
            self.publish(DampingEvent::Undamped { addr });
        }

        if state.damped.is_empty() {
            state.expire_timer.disarm();
            return false;
        }

        true
    }

    fn publish(&self, event: DampingEvent) {
        // failing means there are no subscribers, which is fine.
        let _ = self.core.events.send(event);
    }
}
