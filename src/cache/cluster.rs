//! Memcached Cluster Client
//!
//! Keys are spread over the configured servers through a weighted bucket
//! table. Each server has one TCP connection, opened on first use. A server
//! that cannot be connected to is marked dead and is never retried; operations
//! routed to it fail open. A request that times out or desyncs the stream
//! fails on its own and drops the connection, so the next request reconnects.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::future::join_all;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::compression::PayloadCompressor;
use super::config::CacheSettings;
use super::entry::{fx_hash, validate_key};
use super::protocol::{self, Command, Reply, Value};
use super::remote::{RemoteStats, RemoteStore};
use crate::error::{Error, Result};

enum ConnState {
    /// Not connected yet, or the last request dropped the stream
    Idle,
    Connected(BufStream<TcpStream>),
    /// Connect failed; not retried
    Dead,
}

struct Server {
    address: String,
    conn: Mutex<ConnState>,
}

/// Client for a weighted memcached cluster
pub struct MemcacheCluster {
    servers: Vec<Server>,
    /// Server index per bucket; server `i` fills `weight(i)` buckets
    buckets: Vec<usize>,
    compressor: PayloadCompressor,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl MemcacheCluster {
    /// Build a client for the configured servers.
    ///
    /// Does no I/O: connections are opened by the first operation that needs
    /// them, so an unreachable server never fails construction.
    pub fn new(settings: &CacheSettings) -> Self {
        let servers: Vec<Server> = settings
            .servers
            .iter()
            .map(|s| Server {
                address: s.address(),
                conn: Mutex::new(ConnState::Idle),
            })
            .collect();

        let buckets = settings
            .servers
            .iter()
            .enumerate()
            .flat_map(|(index, s)| std::iter::repeat(index).take(s.weight as usize))
            .collect();

        debug!(
            "Memcache cluster with {} servers: {}",
            servers.len(),
            servers
                .iter()
                .map(|s| s.address.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            servers,
            buckets,
            compressor: PayloadCompressor::from_settings(settings),
            connect_timeout: settings.connect_timeout(),
            response_timeout: settings.response_timeout(),
        }
    }

    /// Addresses of the configured servers, in configuration order
    pub fn addresses(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.address.as_str()).collect()
    }

    /// Index of the server owning `key`
    fn server_index(&self, key: &str) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let bucket = (fx_hash(key.as_bytes()) % self.buckets.len() as u64) as usize;
        Some(self.buckets[bucket])
    }

    /// Address of the server owning `key`
    pub fn server_for(&self, key: &str) -> Option<&str> {
        self.server_index(key)
            .map(|index| self.servers[index].address.as_str())
    }

    /// Number of servers not marked dead
    pub async fn live_servers(&self) -> usize {
        let mut live = 0;
        for server in &self.servers {
            if !matches!(*server.conn.lock().await, ConnState::Dead) {
                live += 1;
            }
        }
        live
    }

    async fn connect(&self, address: &str) -> Result<BufStream<TcpStream>> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| Error::Timeout {
                operation: "connect".into(),
                server: address.to_string(),
                timeout_ms: self.connect_timeout.as_millis() as u64,
            })?
            .map_err(|e| Error::ConnectionFailed {
                server: address.to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY on {}: {}", address, e);
        }

        debug!("Connected to memcached at {}", address);
        Ok(BufStream::new(stream))
    }

    /// Send one command to one server and read its reply.
    ///
    /// Waiting for the server's lock and the round trip share one response
    /// deadline; a connect in between is bounded by the connect timeout and
    /// extends it. Errors that leave the stream in an unknown state drop the
    /// connection for this request only.
    async fn execute(&self, server: &Server, command: &Command) -> Result<Reply> {
        let mut deadline = Instant::now() + self.response_timeout;
        let timeout = || Error::Timeout {
            operation: command.name().into(),
            server: server.address.clone(),
            timeout_ms: self.response_timeout.as_millis() as u64,
        };

        let mut conn = tokio::time::timeout_at(deadline, server.conn.lock())
            .await
            .map_err(|_| timeout())?;

        if matches!(*conn, ConnState::Idle) {
            let started = Instant::now();
            match self.connect(&server.address).await {
                Ok(stream) => *conn = ConnState::Connected(stream),
                Err(e) => {
                    warn!(
                        "Marking memcached server {} dead: {}",
                        server.address, e
                    );
                    *conn = ConnState::Dead;
                    return Err(e);
                }
            }
            deadline += started.elapsed();
        }

        let stream = match &mut *conn {
            ConnState::Connected(stream) => stream,
            _ => return Err(Error::ServerUnavailable(server.address.clone())),
        };

        let result = match tokio::time::timeout_at(deadline, round_trip(stream, command)).await {
            Ok(result) => result,
            Err(_) => Err(timeout()),
        };

        if let Err(e) = &result {
            if e.poisons_connection() {
                warn!(
                    "Dropping connection to memcached server {} after failed {}: {}",
                    server.address,
                    command.name(),
                    e
                );
                *conn = ConnState::Idle;
            }
        }

        result
    }

    /// Route a single-key command to the key's owner
    async fn execute_for_key(&self, key: &str, command: &Command) -> Result<Reply> {
        validate_key(key)?;
        let index = self
            .server_index(key)
            .ok_or_else(|| Error::Config("no cache servers configured".into()))?;
        self.execute(&self.servers[index], command).await
    }

    fn unpack(&self, value: Value) -> Option<(String, Bytes)> {
        match self.compressor.unpack(value.data, value.flags) {
            Ok(data) => Some((value.key, data)),
            Err(e) => {
                warn!("Dropping unreadable value for {}: {}", value.key, e);
                None
            }
        }
    }
}

async fn round_trip(stream: &mut BufStream<TcpStream>, command: &Command) -> Result<Reply> {
    let mut buf = BytesMut::with_capacity(64);
    command.encode(&mut buf);
    stream.write_all(&buf).await?;
    stream.flush().await?;
    protocol::read_reply(stream, command).await
}

fn log_failure(operation: &str, key: &str, error: &Error) {
    match error {
        Error::ServerUnavailable(_) => debug!("memcached {} {} skipped: {}", operation, key, error),
        _ => warn!("memcached {} {} failed: {}", operation, key, error),
    }
}

#[async_trait]
impl RemoteStore for MemcacheCluster {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let command = Command::Get(vec![key.to_string()]);
        match self.execute_for_key(key, &command).await {
            Ok(Reply::Values(values)) => values
                .into_iter()
                .find(|v| v.key == key)
                .and_then(|v| self.unpack(v))
                .map(|(_, data)| data),
            Ok(other) => {
                log_failure("get", key, &Error::Protocol(format!("{other:?}")));
                None
            }
            Err(e) => {
                log_failure("get", key, &e);
                None
            }
        }
    }

    async fn get_many(&self, keys: &[String]) -> HashMap<String, Bytes> {
        let mut by_server: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for key in keys {
            if let Err(e) = validate_key(key) {
                log_failure("get", key, &e);
                continue;
            }
            if let Some(index) = self.server_index(key) {
                let group = by_server.entry(index).or_default();
                if !group.contains(key) {
                    group.push(key.clone());
                }
            }
        }

        let requests = by_server.into_iter().map(|(index, group)| async move {
            let server = &self.servers[index];
            let command = Command::Get(group);
            match self.execute(server, &command).await {
                Ok(Reply::Values(values)) => values,
                Ok(other) => {
                    warn!("Unexpected multi-get reply from {}: {:?}", server.address, other);
                    Vec::new()
                }
                Err(e) => {
                    log_failure("multi-get", &server.address, &e);
                    Vec::new()
                }
            }
        });

        join_all(requests)
            .await
            .into_iter()
            .flatten()
            .filter_map(|value| self.unpack(value))
            .collect()
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration, compress: bool) -> bool {
        let (payload, flags) = self.compressor.pack_with(value, compress);
        let command = Command::Set {
            key: key.to_string(),
            value: payload,
            flags,
            exptime: protocol::exptime(ttl),
        };

        match self.execute_for_key(key, &command).await {
            Ok(Reply::Stored(stored)) => stored,
            Ok(_) => false,
            Err(e) => {
                log_failure("set", key, &e);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let command = Command::Delete(key.to_string());
        match self.execute_for_key(key, &command).await {
            Ok(Reply::Deleted(deleted)) => deleted,
            Ok(_) => false,
            Err(e) => {
                log_failure("delete", key, &e);
                false
            }
        }
    }

    async fn stats(&self) -> RemoteStats {
        let requests = self.servers.iter().map(|server| async move {
            let stats = match self.execute(server, &Command::Stats).await {
                Ok(Reply::Stats(stats)) => stats,
                Ok(_) => BTreeMap::new(),
                Err(e) => {
                    log_failure("stats", &server.address, &e);
                    BTreeMap::new()
                }
            };
            (server.address.clone(), stats)
        });

        RemoteStats {
            servers: join_all(requests).await.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ServerConfig;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn cluster(servers: Vec<ServerConfig>) -> MemcacheCluster {
        MemcacheCluster::new(&CacheSettings::new(servers))
    }

    /// A port nothing is listening on
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_bucket_table_respects_weights() {
        let cluster = cluster(vec![
            ServerConfig::new("a", 11211).with_weight(1),
            ServerConfig::new("b", 11211).with_weight(3),
        ]);
        assert_eq!(cluster.buckets, vec![0, 1, 1, 1]);

        let mut counts = HashMap::new();
        for i in 0..4000 {
            let owner = cluster.server_for(&format!("key-{i}")).unwrap();
            *counts.entry(owner.to_string()).or_insert(0) += 1;
        }
        // Roughly a quarter of keys land on the weight-1 server
        let light = counts["a:11211"];
        assert!(light > 600 && light < 1400, "a owns {light} keys");
    }

    #[test]
    fn test_routing_is_stable() {
        let cluster = cluster(vec![
            ServerConfig::new("a", 11211),
            ServerConfig::new("b", 11211),
            ServerConfig::new("c", 11211),
        ]);
        assert_eq!(cluster.server_for("user:1"), cluster.server_for("user:1"));
        assert_eq!(cluster.addresses(), vec!["a:11211", "b:11211", "c:11211"]);
    }

    #[test]
    fn test_no_servers_routes_nowhere() {
        let cluster = cluster(vec![]);
        assert_eq!(cluster.server_for("k"), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_open() {
        let port = closed_port().await;
        let cluster = cluster(vec![ServerConfig::new("127.0.0.1", port)]);
        assert_eq!(cluster.live_servers().await, 1);

        assert_eq!(cluster.get("k").await, None);
        assert!(cluster.get_many(&["a".to_string(), "b".to_string()]).await.is_empty());
        assert!(!cluster.set("k", Bytes::from_static(b"v"), Duration::ZERO, true).await);
        assert!(!cluster.delete("k").await);

        // Marked dead after the first failed connect, never retried
        assert_eq!(cluster.live_servers().await, 0);
        let stats = cluster.stats().await;
        assert_eq!(stats.reachable(), 0);
        assert!(stats.server(&format!("127.0.0.1:{port}")).is_some());
    }

    #[tokio::test]
    async fn test_invalid_key_fails_open_without_io() {
        let port = closed_port().await;
        let cluster = cluster(vec![ServerConfig::new("127.0.0.1", port)]);

        assert_eq!(cluster.get("has space").await, None);
        assert!(!cluster.set("", Bytes::new(), Duration::ZERO, false).await);

        // The server was never contacted, so it is not dead
        assert_eq!(cluster.live_servers().await, 1);
    }

    /// Server that answers the first `get` it sees with `first_reply` and
    /// every later one with `k = v`. Returns its port and a
    /// connection counter.
    async fn scripted_server(first_reply: &'static str) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));
        let answered = Arc::new(AtomicBool::new(false));

        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let answered = answered.clone();
                tokio::spawn(async move {
                    let mut stream = BufReader::new(stream);
                    let mut line = String::new();
                    while stream.read_line(&mut line).await.unwrap_or(0) > 0 {
                        line.clear();
                        let reply = if answered.swap(true, Ordering::SeqCst) {
                            "VALUE k 0 1\r\nv\r\nEND\r\n"
                        } else {
                            first_reply
                        };
                        if stream.get_mut().write_all(reply.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        (port, connections)
    }

    #[tokio::test]
    async fn test_protocol_error_only_fails_that_request() {
        let (port, connections) = scripted_server("BOGUS\r\n").await;
        let cluster = cluster(vec![ServerConfig::new("127.0.0.1", port)]);

        assert_eq!(cluster.get("k").await, None);
        assert_eq!(cluster.live_servers().await, 1);

        // Next request reconnects and succeeds
        let found = cluster.get_many(&["k".to_string()]).await;
        assert_eq!(found.get("k"), Some(&Bytes::from_static(b"v")));
        assert_eq!(connections.load(Ordering::SeqCst), 2);
        assert_eq!(cluster.live_servers().await, 1);
    }

    #[tokio::test]
    async fn test_lock_wait_counts_toward_response_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accepts and never answers
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let mut settings = CacheSettings::new(vec![ServerConfig::new("127.0.0.1", port)]);
        settings.response_timeout_ms = 100;
        let cluster = MemcacheCluster::new(&settings);

        let started = Instant::now();
        let keys: Vec<String> = (0..8).map(|i| format!("k{i}")).collect();
        let results = join_all(keys.iter().map(|key| cluster.get(key))).await;

        assert!(results.iter().all(Option::is_none));
        // Queued callers give up at the shared deadline instead of one after another
        assert!(started.elapsed() < Duration::from_millis(400), "took {:?}", started.elapsed());
        assert_eq!(cluster.live_servers().await, 1);
    }
}
