use super::msg::*;
use crate::{
    clerk::msg::{ActionReply, ActionRequest, LeaderReply, LeaderRequest, QueryReply, QueryRequest},
    net::{LocalNet, NodeId},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Transaction state machine: integer balances keyed by name.
#[derive(Debug, Default, Clone)]
pub struct Tsm {
    data: HashMap<String, i64>,
    // latest request executed per client
    client: HashMap<String, RequestInfo>,
}

impl Tsm {
    /// Return the recorded outcome if `action` was already executed, `None`
    /// if it is new.
    pub fn duplicate(&self, action: &Action) -> Option<RequestInfo> {
        match self.client.get(action.client()) {
            Some(info) if info.rid == action.rid => Some(info.clone()),
            _ => None,
        }
    }

    /// Execute `action` and record its outcome as the client's latest request.
    ///
    /// Callers filter duplicates with [`duplicate`](Tsm::duplicate) first.
    pub fn apply(&mut self, action: Action) -> RequestInfo {
        let info = RequestInfo {
            err: self.execute(&action.op).err(),
            rid: action.rid,
        };
        self.client.insert(info.rid.client.clone(), info.clone());
        info
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.data.get(key).copied()
    }

    pub fn query(&self, query: &Query) -> QueryReply {
        let encoded = match query {
            Query::Value { key } => match self.data.get(key) {
                Some(value) => bincode::serialize(value),
                None => return QueryReply::error("key not found"),
            },
            Query::LatestRequest { client } => match self.client.get(client) {
                Some(info) => bincode::serialize(info),
                None => return QueryReply::empty(),
            },
        };
        match encoded {
            Ok(data) => QueryReply::data(data),
            Err(err) => QueryReply::error(err.to_string()),
        }
    }

    fn execute(&mut self, op: &Op) -> Result<(), String> {
        match op {
            Op::Set { key, value } => {
                self.data.insert(key.clone(), *value);
            }
            Op::Increment { key, value } => {
                let current = self
                    .data
                    .get_mut(key)
                    .ok_or_else(|| format!("key {} does not exist", key))?;
                *current = current
                    .checked_add(*value)
                    .ok_or_else(|| format!("value of {} would overflow", key))?;
            }
            Op::Move {
                source,
                target,
                value,
            } => {
                if *value < 0 {
                    return Err("cannot move a negative amount".to_string());
                }
                let from = *self
                    .data
                    .get(source)
                    .ok_or_else(|| format!("key {} does not exist", source))?;
                let to = *self
                    .data
                    .get(target)
                    .ok_or_else(|| format!("key {} does not exist", target))?;
                if from < *value {
                    return Err("insufficient funds".to_string());
                }
                if source != target {
                    let to = to
                        .checked_add(*value)
                        .ok_or_else(|| format!("value of {} would overflow", target))?;
                    self.data.insert(source.clone(), from - value);
                    self.data.insert(target.clone(), to);
                }
            }
        }
        Ok(())
    }
}

struct Inner {
    state: Tsm,
    leader: Option<NodeId>,
    drop_actions: usize,
    executed: usize,
}

/// A stand-in for a replicated cluster: every member serves the same
/// [`Tsm`], and only the designated leader accepts actions and queries.
///
/// Replication is not modelled; the knobs below inject the faults a clerk
/// has to survive.
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<Mutex<Inner>>,
}

impl Cluster {
    pub fn start(net: &LocalNet, members: &[NodeId], leader: Option<NodeId>) -> Self {
        let cluster = Cluster {
            inner: Arc::new(Mutex::new(Inner {
                state: Tsm::default(),
                leader,
                drop_actions: 0,
                executed: 0,
            })),
        };
        for me in members {
            cluster.start_rpc_server(net, me.clone());
        }
        cluster
    }

    pub fn set_leader(&self, leader: Option<NodeId>) {
        self.inner.lock().unwrap().leader = leader;
    }

    /// The leader accepts the next `n` actions but loses them before they
    /// are executed.
    pub fn drop_actions(&self, n: usize) {
        self.inner.lock().unwrap().drop_actions = n;
    }

    /// Number of actions executed, duplicates excluded.
    pub fn executed(&self) -> usize {
        self.inner.lock().unwrap().executed
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.inner.lock().unwrap().state.get(key)
    }

    fn start_rpc_server(&self, net: &LocalNet, me: NodeId) {
        let this = self.clone();
        net.add_rpc_handler(&me, move |_: LeaderRequest| {
            let leader = this.inner.lock().unwrap().leader.clone();
            async move { LeaderReply { leader } }
        });

        let this = self.clone();
        let id = me.clone();
        net.add_rpc_handler(&me, move |req: ActionRequest| {
            let started = this.apply(&id, req.cmd);
            async move { ActionReply { started } }
        });

        let this = self.clone();
        let id = me.clone();
        net.add_rpc_handler(&me, move |req: QueryRequest| {
            let reply = this.query(&id, &req.cmd);
            async move { reply }
        });
    }

    fn apply(&self, me: &NodeId, action: Action) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.leader.as_ref() != Some(me) {
            return false;
        }
        info!("[Tsm] {} get new action = {:?}", me, action);
        if inner.drop_actions > 0 {
            inner.drop_actions -= 1;
            warn!("[Tsm] {} loses action {}", me, action.rid);
            return true;
        }
        if inner.state.duplicate(&action).is_none() {
            inner.state.apply(action);
            inner.executed += 1;
        }
        true
    }

    fn query(&self, me: &NodeId, query: &Query) -> QueryReply {
        let inner = self.inner.lock().unwrap();
        if inner.leader.as_ref() != Some(me) {
            return QueryReply::declined();
        }
        inner.state.query(query)
    }
}
