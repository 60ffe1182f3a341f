use crate::{
    net::{NodeId, Rpc},
    tsm::msg::{Action, Query},
};
use serde::{Deserialize, Serialize};

/// Ask a member who it believes the leader is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderReply {
    pub leader: Option<NodeId>,
}

impl Rpc for LeaderRequest {
    const METHOD: &'static str = "LeaderRequest";
    type Reply = LeaderReply;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub cmd: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReply {
    /// `false` if the node declined, e.g. because it is not the leader
    pub started: bool,
}

impl Rpc for ActionRequest {
    const METHOD: &'static str = "ActionRequest";
    type Reply = ActionReply;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub cmd: Query,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReply {
    /// `false` if the node declined to answer
    pub success: bool,
    pub data: Option<Vec<u8>>,
    /// domain level failure, e.g. a missing key
    pub query_err: Option<String>,
}

impl QueryReply {
    pub fn declined() -> Self {
        QueryReply {
            success: false,
            data: None,
            query_err: None,
        }
    }

    pub fn data(data: Vec<u8>) -> Self {
        QueryReply {
            success: true,
            data: Some(data),
            query_err: None,
        }
    }

    pub fn empty() -> Self {
        QueryReply {
            success: true,
            data: None,
            query_err: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        QueryReply {
            success: true,
            data: None,
            query_err: Some(msg.into()),
        }
    }
}

impl Rpc for QueryRequest {
    const METHOD: &'static str = "QueryRequest";
    type Reply = QueryReply;
}
