//! Per-device session tracking and join correlation.
//!
//! A session groups consecutive uplinks believed to belong to one
//! continuous radio activation; it is an application-level notion, not
//! a MAC-layer one. The tracker keys sessions by DevAddr and decides,
//! per data uplink, whether the packet continues the current session
//! or starts a new one. Join requests are parked as pending entries
//! and consumed by the first uplink that follows closely enough,
//! resolving the session's DevEUI.
//!
//! All time comparisons use timestamps carried on packets, never the
//! wall clock at processing time. The periodic sweep is the only GC:
//! it removes pending joins past a bounded age and sessions past the
//! staleness timeout.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// Frame counter value at which a 16-bit counter wraps.
const FCNT_MAX: u16 = u16::MAX;
/// A previous counter within this margin of the wrap point makes a
/// small new counter explainable as rollover.
const ROLLOVER_MARGIN: u16 = 10;
/// A new counter below this threshold is small enough to be either a
/// rollover continuation or a reset.
const RESET_THRESHOLD: u16 = 50;

/// Tunable windows, all interpreted against packet timestamps.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity after which a session is considered ended.
    pub staleness: Duration,
    /// Maximum join-request-to-uplink delay for identity correlation.
    pub join_window: Duration,
    /// Age past which an unconsumed pending join is dropped.
    pub pending_max_age: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::hours(6),
            join_window: Duration::seconds(30),
            pending_max_age: Duration::minutes(5),
        }
    }
}

/// A join request waiting to be correlated with a following uplink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJoin {
    pub dev_eui: u64,
    pub join_eui: u64,
    pub gateway_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// A live radio session keyed by DevAddr.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session_id: u64,
    /// DevEUI resolved from a correlated join, if any.
    pub dev_eui: Option<u64>,
    pub last_f_cnt: Option<u16>,
    pub last_seen: DateTime<Utc>,
}

/// What the tracker decided for one uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStamp {
    pub session_id: u64,
    /// Resolved identity, absent when no join correlated.
    pub dev_eui: Option<u64>,
    /// True when this uplink started a new session.
    pub started: bool,
}

/// Stateful correlation of join requests and uplinks.
#[derive(Debug, Default)]
pub struct SessionTracker {
    config: SessionConfig,
    sessions: HashMap<u32, ActiveSession>,
    pending: Vec<PendingJoin>,
    next_session_id: u64,
}

impl SessionTracker {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn session(&self, dev_addr: u32) -> Option<&ActiveSession> {
        self.sessions.get(&dev_addr)
    }

    /// Park a join request for later correlation.
    pub fn record_join_request(
        &mut self,
        dev_eui: u64,
        join_eui: u64,
        gateway_id: Option<String>,
        received_at: DateTime<Utc>,
    ) {
        debug!("pending join recorded for dev_eui {dev_eui:016x}");
        self.pending.push(PendingJoin {
            dev_eui,
            join_eui,
            gateway_id,
            received_at,
        });
    }

    /// Apply one data uplink and return its session stamp.
    ///
    /// Decision order: no session → create; stale → create; counter
    /// regression that is not an explainable 16-bit rollover → create
    /// (explicit reset); otherwise update in place.
    pub fn record_uplink(
        &mut self,
        dev_addr: u32,
        f_cnt: Option<u16>,
        received_at: DateTime<Utc>,
    ) -> SessionStamp {
        let reason = match self.sessions.get_mut(&dev_addr) {
            None => "first uplink",
            Some(session) => {
                let stale = received_at - session.last_seen > self.config.staleness;
                let reset = matches!(
                    (session.last_f_cnt, f_cnt),
                    (Some(previous), Some(new))
                        if new < previous && !explainable_rollover(previous, new)
                );
                if !stale && !reset {
                    if f_cnt.is_some() {
                        session.last_f_cnt = f_cnt;
                    }
                    session.last_seen = received_at;
                    return SessionStamp {
                        session_id: session.session_id,
                        dev_eui: session.dev_eui,
                        started: false,
                    };
                }
                if stale {
                    "staleness timeout"
                } else {
                    "frame counter reset"
                }
            }
        };

        let dev_eui = self.correlate_join(received_at).map(|join| join.dev_eui);
        self.next_session_id += 1;
        let session_id = self.next_session_id;
        info!(
            session_id,
            resolved = dev_eui.is_some(),
            reason,
            "new session for dev_addr {dev_addr:08x}"
        );
        self.sessions.insert(
            dev_addr,
            ActiveSession {
                session_id,
                dev_eui,
                last_f_cnt: f_cnt,
                last_seen: received_at,
            },
        );
        SessionStamp {
            session_id,
            dev_eui,
            started: true,
        }
    }

    /// Consume the pending join with the smallest non-negative delta
    /// to the uplink timestamp within the correlation window.
    fn correlate_join(&mut self, uplink_at: DateTime<Utc>) -> Option<PendingJoin> {
        let mut best: Option<(usize, Duration)> = None;
        for (index, join) in self.pending.iter().enumerate() {
            let delta = uplink_at - join.received_at;
            if delta < Duration::zero() || delta > self.config.join_window {
                continue;
            }
            if best.map_or(true, |(_, best_delta)| delta < best_delta) {
                best = Some((index, delta));
            }
        }
        let (index, delta) = best?;
        let join = self.pending.swap_remove(index);
        debug!(
            delta_ms = delta.num_milliseconds(),
            "join correlated to dev_eui {:016x}",
            join.dev_eui
        );
        Some(join)
    }

    /// Arrival-independent GC: drop pending joins past the bounded
    /// age and sessions past the staleness timeout. Returns (pending,
    /// sessions) removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> (usize, usize) {
        let pending_before = self.pending.len();
        let max_age = self.config.pending_max_age;
        self.pending.retain(|join| now - join.received_at <= max_age);

        let sessions_before = self.sessions.len();
        let staleness = self.config.staleness;
        self.sessions.retain(|_, s| now - s.last_seen <= staleness);

        let removed = (
            pending_before - self.pending.len(),
            sessions_before - self.sessions.len(),
        );
        if removed != (0, 0) {
            debug!(
                pending = removed.0,
                sessions = removed.1,
                "sweep removed expired entries"
            );
        }
        removed
    }
}

/// True when `previous` → `new` is explainable as a 16-bit rollover:
/// the previous counter was within 10 of the wrap point and the new
/// one is below the reset threshold.
///
/// An FCnt of 0 after a long high counter is inherently ambiguous
/// between rollover and reset; this guard is a deliberate heuristic
/// kept as a behavioral contract, not a provable reconstruction. A
/// genuine reset landing below the threshold right after the counter
/// ran near the wrap point is misclassified as rollover.
fn explainable_rollover(previous: u16, new: u16) -> bool {
    previous >= FCNT_MAX - ROLLOVER_MARGIN && new < RESET_THRESHOLD
}
