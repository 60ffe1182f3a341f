use super::{
    backoff::Backoff,
    msg::{LeaderReply, LeaderRequest},
    Cancel, Error, Result,
};
use crate::net::{NodeId, Transport};
use rand::Rng;

/// What the clerk believes about the current leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leader {
    Unknown,
    Cached(NodeId),
}

/// Caches the leader and rediscovers it after it is invalidated.
#[derive(Debug)]
pub struct LeaderCache {
    members: Vec<NodeId>,
    leader: Leader,
}

impl LeaderCache {
    pub fn new(members: Vec<NodeId>) -> Result<Self> {
        if members.is_empty() {
            return Err(Error::NoMembers);
        }
        Ok(LeaderCache {
            members,
            leader: Leader::Unknown,
        })
    }

    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Forget the cached leader, the next [`get`] asks the cluster again.
    ///
    /// [`get`]: LeaderCache::get
    pub fn invalidate(&mut self) {
        self.leader = Leader::Unknown;
    }

    /// Return the cached leader, or ask random members until one of them
    /// names a leader.
    pub async fn get<T: Transport>(
        &mut self,
        net: &T,
        backoff: &mut Backoff,
        cancel: &Cancel,
    ) -> Result<NodeId> {
        loop {
            if let Leader::Cached(leader) = &self.leader {
                return Ok(leader.clone());
            }
            cancel.check()?;
            let probe = rand::thread_rng().gen_range(0..self.members.len());
            let probe = &self.members[probe];
            match net.call(probe, LeaderRequest).await {
                Ok(LeaderReply {
                    leader: Some(leader),
                }) => {
                    info!("[Clerk] node {} answered with leader = {}", probe, leader);
                    self.leader = Leader::Cached(leader.clone());
                    backoff.reset();
                    return Ok(leader);
                }
                Ok(LeaderReply { leader: None }) => {
                    debug!("[Clerk] unable to find leader: {} doesn't know it", probe);
                }
                Err(err) => {
                    debug!("[Clerk] unable to find leader: {} failed: {}", probe, err);
                }
            }
            backoff.fail().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clerk::backoff::BACKOFF_FLOOR;
    use crate::net::LocalNet;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn members() -> Vec<NodeId> {
        vec!["n1".into(), "n2".into(), "n3".into()]
    }

    /// Every member answers `LeaderRequest` through `answer`, which is given
    /// the number of requests seen so far.
    fn serve_leader<F>(net: &LocalNet, answer: F) -> Arc<AtomicUsize>
    where
        F: Fn(usize) -> Option<NodeId> + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicUsize::new(0));
        let answer = Arc::new(answer);
        for id in members() {
            let calls = calls.clone();
            let answer = answer.clone();
            net.add_rpc_handler(&id, move |_: LeaderRequest| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let leader = answer(n);
                async move { LeaderReply { leader } }
            });
        }
        calls
    }

    #[tokio::test(start_paused = true)]
    async fn discovers_leader_after_unknown_answer() {
        let net = LocalNet::default();
        let calls = serve_leader(&net, |n| if n == 0 { None } else { Some("n2".into()) });
        let mut cache = LeaderCache::new(members()).unwrap();
        let mut backoff = Backoff::default();

        let leader = cache.get(&net, &mut backoff, &Cancel::never()).await.unwrap();
        assert_eq!(leader, NodeId::from("n2"));
        assert_eq!(cache.leader(), &Leader::Cached("n2".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(backoff.current(), BACKOFF_FLOOR);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_leader_is_reused_until_invalidated() {
        let net = LocalNet::default();
        let calls = serve_leader(&net, |_| Some("n3".into()));
        let mut cache = LeaderCache::new(members()).unwrap();
        let mut backoff = Backoff::default();
        let cancel = Cancel::never();

        for _ in 0..5 {
            cache.get(&net, &mut backoff, &cancel).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate();
        assert_eq!(cache.leader(), &Leader::Unknown);
        for _ in 0..5 {
            cache.get(&net, &mut backoff, &cancel).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_membership_is_rejected() {
        assert!(matches!(LeaderCache::new(Vec::new()), Err(Error::NoMembers)));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_member_does_not_starve_discovery() {
        let net = LocalNet::default();
        serve_leader(&net, |_| Some("n2".into()));
        net.disconnect(&"n1".into());
        net.disconnect(&"n3".into());
        let mut cache = LeaderCache::new(members()).unwrap();
        let mut backoff = Backoff::default();

        let leader = cache.get(&net, &mut backoff, &Cancel::never()).await.unwrap();
        assert_eq!(leader, NodeId::from("n2"));
        assert_eq!(backoff.current(), BACKOFF_FLOOR);
    }
}
