//! Test helpers and utilities

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use job_server::config::{Config, EngineConfig, QueueCapacity, ServerConfig};
use job_server::engine::{Engine, ShutdownSignal};
use job_server::server::Server;
use reqwest::{Client, Response};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Small, fast-polling engine configuration.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        pool_capacity: 8,
        queue_capacity: QueueCapacity::Bounded(16),
        baseline_workers: 2,
        low_threshold: 4,
        high_threshold: 8,
        poll_interval: Duration::from_millis(10),
    }
}

/// In-process server bound to ephemeral ports.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub internal_url: String,
    pub engine: Arc<Engine>,
    pub client: Client,
    pub handle: JoinHandle<()>,
}

/// A client that has connected and read its welcome line.
pub struct TestClient {
    pub welcome: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[allow(dead_code)]
impl TestServer {
    /// Start an engine and a server (with internal endpoint) on 127.0.0.1.
    pub async fn start(engine: EngineConfig) -> Self {
        let config = Config {
            server: ServerConfig {
                listen_addr: "127.0.0.1:0".parse().unwrap(),
                internal_addr: Some("127.0.0.1:0".parse().unwrap()),
                command_timeout: Some(Duration::from_secs(5)),
            },
            engine,
            ..Config::default()
        };

        let engine = Arc::new(
            Engine::start(&config.engine, ShutdownSignal::new()).expect("engine should start"),
        );
        let server = Server::bind(&config, Arc::clone(&engine))
            .await
            .expect("server should bind");

        let addr = server.local_addr().unwrap();
        let internal_url = format!("http://{}", server.internal_addr().unwrap());
        let handle = tokio::spawn(server.run());

        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            addr,
            internal_url,
            engine,
            client,
            handle,
        }
    }

    /// Connect and read the welcome line.
    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect failed");
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut welcome = String::new();
        reader.read_line(&mut welcome).await.unwrap();

        TestClient {
            welcome: welcome.trim_end().to_string(),
            reader,
            writer,
        }
    }

    /// Send one command on a fresh connection and return the reply line.
    pub async fn send(&self, line: &str) -> String {
        let mut client = self.connect().await;
        client.send(line).await;
        client.reply().await
    }

    /// Make a GET request to the internal server
    pub async fn internal_get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.internal_url, path))
            .send()
            .await
            .expect("Internal GET request failed")
    }
}

impl TestClient {
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Read everything up to EOF and return it without the trailing newline.
    pub async fn reply(mut self) -> String {
        let mut out = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_to_string(&mut out))
            .await
            .expect("reply timed out")
            .unwrap();
        out.trim_end().to_string()
    }
}

/// Poll `cond` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
