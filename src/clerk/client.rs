use super::{
    backoff::Backoff,
    leader::{Leader, LeaderCache},
    msg::{ActionRequest, QueryRequest, QueryReply},
    Cancel, Error, Result,
};
use crate::{
    config::ClientConfig,
    net::{NodeId, Rpc, Transport},
    tsm::msg::{Action, ActionBuilder, Query, RequestInfo},
};
use std::{fmt, io, time::Duration};
use tokio::sync::watch;

/// Unmatched confirmation polls tolerated before an action is resubmitted.
pub const MAX_CHECK_COUNT_BEFORE_RETRY: usize = 6;

/// Definitive result of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// The state machine executed the action but refused its effect.
    Rejected(String),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }
}

/// Why a request to the leader did not go through.
enum Refusal {
    Declined(NodeId),
    Failed(NodeId, io::Error),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::Declined(node) => write!(f, "node {} declined the request", node),
            Refusal::Failed(node, err) => write!(f, "node {} failed: {}", node, err),
        }
    }
}

enum Attempt<T> {
    Done(T),
    Refused(Refusal),
}

enum Phase {
    Submit,
    Confirm { polls: usize },
}

/// A client session.
///
/// All operations take `&mut self`: the leader cache and backoff are
/// mutated in place, so one session serves one caller at a time.
pub struct Clerk<T> {
    net: T,
    client_id: String,
    leader: LeaderCache,
    backoff: Backoff,
    actions: ActionBuilder,
    cancel: Cancel,
}

impl<T: Transport> Clerk<T> {
    pub fn new(client_id: impl Into<String>, members: Vec<NodeId>, net: T) -> Result<Self> {
        let leader = LeaderCache::new(members)?;
        let client_id = client_id.into();
        Ok(Clerk {
            net,
            actions: ActionBuilder::new(client_id.clone()),
            client_id,
            leader,
            backoff: Backoff::default(),
            cancel: Cancel::never(),
        })
    }

    pub fn from_config(config: &ClientConfig, net: T) -> Result<Self> {
        Clerk::new(config.client_id.clone(), config.members(), net)
    }

    /// Give up any pending operation with [`Error::Cancelled`] once `true`
    /// is sent on the paired sender.
    pub fn with_cancel(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Cancel::new(rx);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Builder for actions carrying this client's request ids.
    pub fn actions(&mut self) -> &mut ActionBuilder {
        &mut self.actions
    }

    pub fn leader(&self) -> &Leader {
        self.leader.leader()
    }

    pub fn backoff(&self) -> Duration {
        self.backoff.current()
    }

    /// Submit `action` and wait until the cluster reports its outcome.
    ///
    /// If no confirmation shows up within [`MAX_CHECK_COUNT_BEFORE_RETRY`]
    /// polls the very same action, with the same request id, is sent again.
    /// The cluster recognises the id and does not apply it twice.
    pub async fn execute_action(&mut self, action: Action) -> Result<ActionOutcome> {
        let rid = action.rid.clone();
        let submit = ActionRequest { cmd: action };
        let check = QueryRequest {
            cmd: Query::LatestRequest {
                client: self.client_id.clone(),
            },
        };
        let mut phase = Phase::Submit;
        loop {
            self.cancel.check()?;
            phase = match phase {
                Phase::Submit => match self.attempt(&submit, |r| r.started).await? {
                    Attempt::Done(_) => {
                        debug!("[Clerk] {} action {} started", self.client_id, rid);
                        self.backoff.reset();
                        Phase::Confirm { polls: 0 }
                    }
                    Attempt::Refused(why) => {
                        self.retreat("send action request failed", why).await;
                        Phase::Submit
                    }
                },
                Phase::Confirm { polls } if polls >= MAX_CHECK_COUNT_BEFORE_RETRY => {
                    info!(
                        "[Clerk] {} action {} unconfirmed after {} checks, resubmitting",
                        self.client_id, rid, polls
                    );
                    Phase::Submit
                }
                Phase::Confirm { polls } => {
                    match self.attempt(&check, |r| r.success).await? {
                        Attempt::Done(reply) => match request_info(reply) {
                            Some(info) if info.rid == rid => {
                                self.backoff.reset();
                                let outcome = match info.err {
                                    Some(err) => ActionOutcome::Rejected(err),
                                    None => ActionOutcome::Applied,
                                };
                                info!("[Clerk] {} action {} -> {:?}", self.client_id, rid, outcome);
                                return Ok(outcome);
                            }
                            info => {
                                debug!(
                                    "[Clerk] {} action {} not confirmed yet, latest = {:?}",
                                    self.client_id, rid, info
                                );
                                self.backoff.fail().await;
                            }
                        },
                        Attempt::Refused(why) => {
                            self.retreat("check action request failed", why).await
                        }
                    }
                    Phase::Confirm { polls: polls + 1 }
                }
            };
        }
    }

    /// Run a read-only query on the leader.
    ///
    /// Failures to reach the leader are retried; a query level error in an
    /// authoritative reply is returned as [`Error::Query`].
    pub async fn execute_query(&mut self, query: Query) -> Result<Vec<u8>> {
        let req = QueryRequest { cmd: query };
        loop {
            self.cancel.check()?;
            match self.attempt(&req, |r| r.success).await? {
                Attempt::Done(reply) => {
                    self.backoff.reset();
                    return match reply.query_err {
                        Some(err) => Err(Error::Query(err)),
                        None => Ok(reply.data.unwrap_or_default()),
                    };
                }
                Attempt::Refused(why) => self.retreat("query request failed", why).await,
            }
        }
    }

    /// Fetch the value stored under `key`.
    pub async fn query_value(&mut self, key: impl Into<String>) -> Result<i64> {
        let data = self.execute_query(Query::Value { key: key.into() }).await?;
        Ok(bincode::deserialize(&data)?)
    }

    /// Send `req` to the leader once.
    async fn attempt<R>(
        &mut self,
        req: &R,
        accepted: fn(&R::Reply) -> bool,
    ) -> Result<Attempt<R::Reply>>
    where
        R: Rpc + Clone,
    {
        let leader = self
            .leader
            .get(&self.net, &mut self.backoff, &self.cancel)
            .await?;
        let attempt = match self.net.call(&leader, req.clone()).await {
            Ok(reply) if accepted(&reply) => Attempt::Done(reply),
            Ok(_) => Attempt::Refused(Refusal::Declined(leader)),
            Err(err) => Attempt::Refused(Refusal::Failed(leader, err)),
        };
        Ok(attempt)
    }

    /// The leader could not be used: forget it and back off.
    async fn retreat(&mut self, what: &str, why: Refusal) {
        debug!("[Clerk] {} {}: {}", self.client_id, what, why);
        self.leader.invalidate();
        self.backoff.fail().await;
    }
}

/// Decode the reply to a `Query::LatestRequest`. A query error or missing
/// data both mean nothing is on record.
fn request_info(reply: QueryReply) -> Option<RequestInfo> {
    if reply.query_err.is_some() {
        return None;
    }
    let data = reply.data?;
    match bincode::deserialize(&data) {
        Ok(info) => Some(info),
        Err(err) => {
            warn!("[Clerk] undecodable request info: {}", err);
            None
        }
    }
}
