//! Time-derived message identifiers.
//!
//! Durable backends cluster a channel's rows by a version 1 (time-based) UUID.
//! Ticks come from a hybrid clock: the wall clock in 100ns units since the
//! Gregorian epoch, bumped by one whenever it would not advance past the last
//! issued value. Two ids from one process never share a tick.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::{Timestamp, Uuid};

/// 100ns intervals between 1582-10-15 and 1970-01-01.
const GREGORIAN_OFFSET: u64 = 0x01B2_1DD2_1381_4000;

static LAST_TICKS: AtomicU64 = AtomicU64::new(0);
static NODE: OnceLock<Node> = OnceLock::new();

struct Node {
    id: [u8; 6],
    clock_seq: u16,
}

fn node() -> &'static Node {
    NODE.get_or_init(|| {
        let mut id: [u8; 6] = rand::random();
        // Random node ids carry the multicast bit (RFC 4122 section 4.5).
        id[0] |= 0x01;
        Node {
            id,
            clock_seq: rand::random::<u16>() & 0x3FFF,
        }
    })
}

fn wall_ticks() -> u64 {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
    nanos / 100 + GREGORIAN_OFFSET
}

fn next_ticks() -> u64 {
    let now = wall_ticks();
    let mut last = LAST_TICKS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TICKS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Make every later id strictly greater than `ticks`.
///
/// Durable stores call this with the newest tick they hold, so a wall clock
/// that went backwards across a restart cannot reorder or overwrite rows.
pub fn advance_past(ticks: u64) {
    LAST_TICKS.fetch_max(ticks, Ordering::AcqRel);
}

/// Identifier of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    ticks: u64,
    uuid: Uuid,
}

impl MessageId {
    /// Issue a fresh identifier, strictly later than any issued before it in this process.
    pub fn generate() -> Self {
        let ticks = next_ticks();
        let node = node();
        Self {
            ticks,
            uuid: time_uuid(ticks, node.clock_seq, &node.id),
        }
    }

    /// 100ns ticks since the Gregorian epoch.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

fn time_uuid(ticks: u64, clock_seq: u16, node: &[u8; 6]) -> Uuid {
    Uuid::new_v1(Timestamp::from_gregorian_time(ticks, clock_seq), node)
}
