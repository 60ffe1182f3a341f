use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one logical submission of one client.
///
/// Resubmitting an action must reuse its id so that the cluster can
/// recognise the duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId {
    pub client: String,
    pub seq: u64,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Set { key: String, value: i64 },
    Increment { key: String, value: i64 },
    Move { source: String, target: String, value: i64 },
}

/// A state machine mutation tagged with the request id it was issued under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub op: Op,
    pub rid: RequestId,
}

impl Action {
    pub fn client(&self) -> &str {
        &self.rid.client
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// current value of `key`
    Value { key: String },
    /// the [`RequestInfo`] of the latest action executed for `client`
    LatestRequest { client: String },
}

/// The cluster's record of the latest action it executed for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub rid: RequestId,
    /// `None` if the action was applied
    pub err: Option<String>,
}

/// Builds actions for one client, handing out a fresh request id per call.
#[derive(Debug)]
pub struct ActionBuilder {
    client: String,
    seq: u64, // monotonically increasing
}

impl ActionBuilder {
    pub fn new(client: impl Into<String>) -> Self {
        ActionBuilder {
            client: client.into(),
            seq: 0,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: i64) -> Action {
        self.build(Op::Set {
            key: key.into(),
            value,
        })
    }

    pub fn increment(&mut self, key: impl Into<String>, value: i64) -> Action {
        self.build(Op::Increment {
            key: key.into(),
            value,
        })
    }

    pub fn move_value(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        value: i64,
    ) -> Action {
        self.build(Op::Move {
            source: source.into(),
            target: target.into(),
            value,
        })
    }

    fn build(&mut self, op: Op) -> Action {
        self.seq += 1;
        Action {
            op,
            rid: RequestId {
                client: self.client.clone(),
                seq: self.seq,
            },
        }
    }
}
