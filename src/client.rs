//! Load generator for the command server.
//!
//! A run starts a random number of clients. Each waits a random delay, then
//! sends random arithmetic commands, opening a fresh connection per command
//! because the server answers one command per connection. Every reply is
//! checked against the locally computed answer.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::command;
use crate::config::ClientConfig;
use crate::server::{BUSY_MESSAGE, SHUTTING_DOWN_MESSAGE};

const VERBS: [&str; 4] = ["ADD", "MUL", "DIV", "SUB"];

/// Upper bound on one connect/welcome/command/reply exchange.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// A random `VERB,a,b` line. The divisor is never zero.
pub fn random_command<R: Rng>(rng: &mut R) -> String {
    let verb = VERBS[rng.gen_range(0..VERBS.len())];
    let a: i32 = rng.gen_range(0..=1000);
    let b: i32 = rng.gen_range(1..=1000);
    format!("{},{},{}", verb, a, b)
}

/// The reply a healthy server gives for `line`.
pub fn expected_reply(line: &str) -> String {
    command::response_for(line, &command::run(line))
}

/// How a reply compares with what was expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyKind {
    Ok,
    Busy,
    ShuttingDown,
    Mismatched,
}

impl ReplyKind {
    pub fn classify(line: &str, reply: &str) -> Self {
        if reply == BUSY_MESSAGE {
            ReplyKind::Busy
        } else if reply == SHUTTING_DOWN_MESSAGE {
            ReplyKind::ShuttingDown
        } else if reply == expected_reply(line) {
            ReplyKind::Ok
        } else {
            ReplyKind::Mismatched
        }
    }
}

/// Outcome counts of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub ok: usize,
    pub busy: usize,
    pub shutting_down: usize,
    pub mismatched: usize,
    /// Exchanges that ended in an I/O error or timeout.
    pub failed: usize,
}

impl LoadSummary {
    fn record(&mut self, kind: ReplyKind) {
        match kind {
            ReplyKind::Ok => self.ok += 1,
            ReplyKind::Busy => self.busy += 1,
            ReplyKind::ShuttingDown => self.shutting_down += 1,
            ReplyKind::Mismatched => self.mismatched += 1,
        }
    }

    fn merge(&mut self, other: LoadSummary) {
        self.ok += other.ok;
        self.busy += other.busy;
        self.shutting_down += other.shutting_down;
        self.mismatched += other.mismatched;
        self.failed += other.failed;
    }

    /// Number of replies received.
    pub fn replies(&self) -> usize {
        self.ok + self.busy + self.shutting_down + self.mismatched
    }
}

/// What one client will do.
#[derive(Clone, Debug)]
pub struct ClientPlan {
    pub index: usize,
    pub delay: Duration,
    pub commands: Vec<String>,
}

/// Draw a run from `config`: client count, per-client delay and commands.
pub fn plan_load<R: Rng>(config: &ClientConfig, rng: &mut R) -> Vec<ClientPlan> {
    let clients = rng.gen_range(config.min_clients..=config.max_clients);
    let min_ms = config.min_delay.as_millis() as u64;
    let max_ms = config.max_delay.as_millis() as u64;

    (0..clients)
        .map(|index| ClientPlan {
            index,
            delay: Duration::from_millis(rng.gen_range(min_ms..=max_ms)),
            commands: (0..config.commands_per_client)
                .map(|_| random_command(&mut *rng))
                .collect(),
        })
        .collect()
}

/// Connect, read the welcome line, send `line` and return the reply line.
pub async fn send_command(addr: SocketAddr, line: &str) -> io::Result<String> {
    let exchange = async {
        let mut stream = BufReader::new(TcpStream::connect(addr).await?);

        let mut welcome = String::new();
        if stream.read_line(&mut welcome).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "closed before welcome",
            ));
        }
        debug!(welcome = welcome.trim_end(), "connected");

        stream.write_all(format!("{}\n", line).as_bytes()).await?;
        stream.flush().await?;

        let mut reply = String::new();
        if stream.read_line(&mut reply).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "closed before reply",
            ));
        }
        Ok::<_, io::Error>(reply.trim_end().to_string())
    };

    tokio::time::timeout(EXCHANGE_TIMEOUT, exchange)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "exchange timed out"))?
}

/// Run one client's plan. An I/O error ends the client.
pub async fn run_client(addr: SocketAddr, plan: ClientPlan) -> LoadSummary {
    let client = plan.index;
    let mut summary = LoadSummary::default();

    tokio::time::sleep(plan.delay).await;

    for line in &plan.commands {
        info!(client, command = %line, "sending");

        match send_command(addr, line).await {
            Ok(reply) => {
                let kind = ReplyKind::classify(line, &reply);
                if kind == ReplyKind::Mismatched {
                    warn!(client, command = %line, reply = %reply, "unexpected reply");
                } else {
                    info!(client, reply = %reply, "received");
                }
                summary.record(kind);
            }
            Err(e) => {
                warn!(client, error = %e, "exchange failed");
                summary.failed += 1;
                break;
            }
        }
    }

    summary
}

/// Run every plan concurrently and add up the outcomes.
pub async fn run_plans(addr: SocketAddr, plans: Vec<ClientPlan>) -> LoadSummary {
    let mut tasks = JoinSet::new();
    for plan in plans {
        tasks.spawn(run_client(addr, plan));
    }

    let mut summary = LoadSummary::default();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(client) => summary.merge(client),
            Err(e) => {
                warn!(error = %e, "client task failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        ok = summary.ok,
        busy = summary.busy,
        shutting_down = summary.shutting_down,
        mismatched = summary.mismatched,
        failed = summary.failed,
        "all clients have quit"
    );
    summary
}

/// Draw a random run from `config` and execute it.
pub async fn run_load(config: &ClientConfig) -> LoadSummary {
    let plans = plan_load(config, &mut rand::thread_rng());
    info!(clients = plans.len(), server = %config.server_addr, "creating clients");
    run_plans(config.server_addr, plans).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_commands_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let line = random_command(&mut rng);
            let parts: Vec<&str> = line.split(',').collect();
            assert_eq!(parts.len(), 3, "{}", line);
            assert!(VERBS.contains(&parts[0]));

            let a: i32 = parts[1].parse().unwrap();
            let b: i32 = parts[2].parse().unwrap();
            assert!((0..=1000).contains(&a));
            assert!((1..=1000).contains(&b));

            // Always evaluates, never the error reply
            assert!(command::run(&line).is_ok());
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(ReplyKind::classify("ADD,2,3", "2 + 3 = 5"), ReplyKind::Ok);
        assert_eq!(ReplyKind::classify("ADD,2,3", BUSY_MESSAGE), ReplyKind::Busy);
        assert_eq!(
            ReplyKind::classify("ADD,2,3", SHUTTING_DOWN_MESSAGE),
            ReplyKind::ShuttingDown
        );
        assert_eq!(
            ReplyKind::classify("ADD,2,3", "2 + 3 = 6"),
            ReplyKind::Mismatched
        );
    }

    #[test]
    fn test_plan_respects_ranges() {
        let config = ClientConfig {
            min_clients: 3,
            max_clients: 6,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            commands_per_client: 2,
            ..ClientConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let plans = plan_load(&config, &mut rng);
            assert!((3..=6).contains(&plans.len()));
            for (i, plan) in plans.iter().enumerate() {
                assert_eq!(plan.index, i);
                assert!(plan.delay >= config.min_delay && plan.delay <= config.max_delay);
                assert_eq!(plan.commands.len(), 2);
            }
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_counts_failure() {
        // Bind then drop to get a port nobody listens on
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();

        let plan = ClientPlan {
            index: 0,
            delay: Duration::ZERO,
            commands: vec!["ADD,1,2".into(), "SUB,3,4".into()],
        };
        let summary = run_client(addr, plan).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.replies(), 0);
    }
}
