//! Channel naming authority.
//!
//! Deterministic, prefix-tagged mapping from domain identifiers to bus
//! channel names. Every process derives the same name for the same entity;
//! nothing here touches the network or caches state.
//!
//! | Entity | Channel | Visibility |
//! |---|---|---|
//! | Classroom | `classroom-{uuid}` | public |
//! | Live session | `presence-session-{uuid}` | presence |
//! | Direct conversation | `private-dm-{low}.{high}` | private pair |

use serde::{Deserialize, Serialize};
use std::fmt;

use super::foundation::{ClassroomId, SessionId, UserId};

const CLASSROOM_PREFIX: &str = "classroom-";
const SESSION_PREFIX: &str = "presence-session-";
const DIRECT_PREFIX: &str = "private-dm-";

/// Visibility class of a channel, as enforced by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Anyone may subscribe without authentication.
    Public,
    /// Subscription requires membership proof; the bus tracks member
    /// join/leave.
    Presence,
    /// Scoped to exactly two participants.
    PrivatePair,
}

/// A fully-resolved bus channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Returns the channel name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies a channel by its prefix tag.
    pub fn visibility(&self) -> Visibility {
        if self.0.starts_with(SESSION_PREFIX) {
            Visibility::Presence
        } else if self.0.starts_with(DIRECT_PREFIX) {
            Visibility::PrivatePair
        } else {
            Visibility::Public
        }
    }

    /// Extracts the session id from a session presence channel.
    ///
    /// Returns `None` for any other channel kind.
    pub fn session_id(&self) -> Option<SessionId> {
        self.0.strip_prefix(SESSION_PREFIX)?.parse().ok()
    }

    /// Checks whether a direct channel belongs to the given user.
    ///
    /// Always false for non-pair channels. The pair separator is `.`,
    /// which user ids never contain, so the split is unambiguous.
    pub fn includes_pair_member(&self, user_id: &UserId) -> bool {
        match self.0.strip_prefix(DIRECT_PREFIX) {
            Some(pair) => pair
                .split_once('.')
                .map(|(low, high)| low == user_id.as_str() || high == user_id.as_str())
                .unwrap_or(false),
            None => false,
        }
    }

    /// Parses an externally-supplied channel name.
    ///
    /// Accepts only names this authority could have produced.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw
            .strip_prefix(SESSION_PREFIX)
            .map(|rest| rest.parse::<SessionId>().is_ok())
            .or_else(|| {
                raw.strip_prefix(CLASSROOM_PREFIX)
                    .map(|rest| rest.parse::<ClassroomId>().is_ok())
            })
            .or_else(|| {
                raw.strip_prefix(DIRECT_PREFIX)
                    .map(|rest| rest.contains('.'))
            })
            .unwrap_or(false);
        valid.then(|| Self(raw.to_string()))
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public announcement channel for a classroom.
pub fn classroom_channel(id: &ClassroomId) -> ChannelName {
    ChannelName(format!("{}{}", CLASSROOM_PREFIX, id))
}

/// Presence channel carrying all realtime traffic for a live session.
pub fn session_channel(id: &SessionId) -> ChannelName {
    ChannelName(format!("{}{}", SESSION_PREFIX, id))
}

/// Private channel for a direct conversation between two users.
///
/// The pair is order-normalized so both ends derive the same name.
pub fn direct_channel(a: &UserId, b: &UserId) -> ChannelName {
    let (low, high) = if a.as_str() <= b.as_str() {
        (a, b)
    } else {
        (b, a)
    };
    ChannelName(format!("{}{}.{}", DIRECT_PREFIX, low, high))
}
