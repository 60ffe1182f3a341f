use futures::{
    future::{self, BoxFuture},
    Future, FutureExt,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{self, Debug, Display},
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Per-call timeout used when none is given.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(1);

/// Opaque identity of a cluster member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

/// A request that can travel over a [`Transport`].
///
/// The method name selects the handler on the receiving node, the
/// associated type is what that handler answers with.
pub trait Rpc: Serialize + DeserializeOwned + Debug + Send + 'static {
    const METHOD: &'static str;
    type Reply: Serialize + DeserializeOwned + Debug + Send + 'static;
}

/// Blocking-until-answered RPC to a named node.
///
/// Implementations own the per-call timeout. Any error (timeout, refused
/// connection, unknown node, undecodable payload) is reported as an
/// `io::Error`; the caller decides whether to retry.
pub trait Transport {
    fn call<R: Rpc>(&self, target: &NodeId, req: R) -> BoxFuture<'_, io::Result<R::Reply>>;
}

type Handler = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, io::Result<Vec<u8>>> + Send + Sync>;

struct Host {
    handlers: HashMap<&'static str, Handler>,
    connected: bool,
}

/// An in-process network connecting a set of named nodes.
///
/// Cloning yields another handle to the same network.
#[derive(Clone)]
pub struct LocalNet {
    hosts: Arc<Mutex<HashMap<NodeId, Host>>>,
    timeout: Duration,
}

impl Default for LocalNet {
    fn default() -> Self {
        LocalNet::new(RPC_TIMEOUT)
    }
}

impl LocalNet {
    pub fn new(timeout: Duration) -> Self {
        LocalNet {
            hosts: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Register `f` as the handler of `R` on `node`, creating the node if it
    /// does not exist yet. A later registration for the same method replaces
    /// the earlier one.
    pub fn add_rpc_handler<R, F, Fut>(&self, node: &NodeId, f: F)
    where
        R: Rpc,
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R::Reply> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |data: Vec<u8>| {
            match bincode::deserialize::<R>(&data) {
                Ok(req) => {
                    let rsp = f(req);
                    async move { bincode::serialize(&rsp.await).map_err(codec_error) }.boxed()
                }
                Err(err) => future::ready(Err(codec_error(err))).boxed(),
            }
        });
        let mut hosts = self.hosts.lock().unwrap();
        hosts
            .entry(node.clone())
            .or_insert_with(|| Host {
                handlers: HashMap::new(),
                connected: true,
            })
            .handlers
            .insert(R::METHOD, handler);
    }

    /// Cut `node` off: every call addressed to it fails until [`connect`].
    ///
    /// [`connect`]: LocalNet::connect
    pub fn disconnect(&self, node: &NodeId) {
        self.set_connected(node, false);
    }

    pub fn connect(&self, node: &NodeId) {
        self.set_connected(node, true);
    }

    fn set_connected(&self, node: &NodeId, connected: bool) {
        if let Some(host) = self.hosts.lock().unwrap().get_mut(node) {
            host.connected = connected;
        }
    }

    fn handler(&self, target: &NodeId, method: &str) -> io::Result<Handler> {
        let hosts = self.hosts.lock().unwrap();
        let host = hosts.get(target).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("unknown node {}", target))
        })?;
        if !host.connected {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("node {} is unreachable", target),
            ));
        }
        host.handlers.get(method).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("node {} has no handler for {}", target, method),
            )
        })
    }
}

impl Transport for LocalNet {
    fn call<R: Rpc>(&self, target: &NodeId, req: R) -> BoxFuture<'_, io::Result<R::Reply>> {
        let target = target.clone();
        async move {
            let handler = self.handler(&target, R::METHOD)?;
            let data = bincode::serialize(&req).map_err(codec_error)?;
            let rsp = tokio::time::timeout(self.timeout, handler(data))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("{} to {} timed out", R::METHOD, target),
                    )
                })??;
            bincode::deserialize(&rsp).map_err(codec_error)
        }
        .boxed()
    }
}

fn codec_error(err: bincode::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
