//! End-to-end tests: a referee, workers and clients over loopback TCP

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use flitter::config::{Config, DEFAULT_BUSY_REPLY};
use flitter::message::{Action, Message};
use flitter::node::{NodeInfo, NodePath};
use flitter::referee::{Referee, RefereeError};
use flitter::report::{OverflowPolicy, ReportDrain, Reporter};
use flitter::service::NameService;
use flitter::transport::{RefereeClient, WorkerEndpoint};

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    info: NodeInfo,
    name: Arc<NameService>,
    drain: ReportDrain,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), RefereeError>>,
}

impl Running {
    fn client(&self) -> RefereeClient {
        RefereeClient::new(self.info.clone(), &Config::default().transport)
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        let result = tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("referee should stop")
            .expect("referee task should not panic");
        assert!(result.is_ok());
    }
}

async fn start_referee() -> Running {
    let config = Config::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (reporter, drain) = Reporter::channel(32, OverflowPolicy::DropNewest, Duration::ZERO);

    let mut referee = Referee::new(NodePath::from(format!("referee/127.0.0.1:{port}")), &config, reporter.clone()).unwrap();
    let name = Arc::new(NameService::new(&config, reporter));
    referee.config_service(name.clone());

    let (stop, stopped) = oneshot::channel();
    let handle = tokio::spawn(referee.run(listener, async {
        let _ = stopped.await;
    }));

    Running {
        info: NodeInfo::new("127.0.0.1", port),
        name,
        drain,
        stop,
        handle,
    }
}

async fn worker(group: &str) -> WorkerEndpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    WorkerEndpoint::from_listener(group, listener, &Config::default().transport).unwrap()
}

#[tokio::test]
async fn test_worker_registers_and_client_resolves() {
    let referee = start_referee().await;
    let client = referee.client();

    let w = worker("groupA").await;
    let canonical = w.register_and_wait(&client, WAIT).await.unwrap();
    assert_eq!(&canonical, w.path());

    let address = client.refer_address("groupA", 0).await.unwrap();
    assert_eq!(address, w.path().node_info().unwrap().to_string());
    assert_eq!(client.refer_address("groupA", 1).await.unwrap(), "");
    assert_eq!(client.refer_address("unknown", 0).await.unwrap(), "");

    referee.shutdown().await;
}

#[tokio::test]
async fn test_repeat_registration_is_idempotent() {
    let referee = start_referee().await;
    let client = referee.client();

    let w = worker("groupA").await;
    let first = w.register_and_wait(&client, WAIT).await.unwrap();
    let second = w.register_and_wait(&client, WAIT).await.unwrap();
    assert_eq!(first, second);

    assert_eq!(referee.name.registry().group_len("groupA"), 1);
    assert_eq!(client.refer_address("groupA", 1).await.unwrap(), "");

    referee.shutdown().await;
}

#[tokio::test]
async fn test_members_resolve_in_registration_order() {
    let referee = start_referee().await;
    let client = referee.client();

    let mut workers = Vec::new();
    for _ in 0..4 {
        let w = worker("pool").await;
        w.register_and_wait(&client, WAIT).await.unwrap();
        workers.push(w);
    }

    for (i, w) in workers.iter().enumerate() {
        let address = client.refer_address("pool", i).await.unwrap();
        assert_eq!(address, w.path().node_info().unwrap().to_string());
    }
    assert_eq!(client.refer_address("pool", 4).await.unwrap(), "");

    referee.shutdown().await;
}

#[tokio::test]
async fn test_bad_path_gets_no_reply_and_is_reported() {
    let mut referee = start_referee().await;
    let client = referee.client();

    client.register(&NodePath::from("badpath")).await.unwrap();

    let report = tokio::time::timeout(WAIT, referee.drain.recv())
        .await
        .expect("failure should be reported")
        .unwrap();
    assert!(report.message.contains("badpath"));
    assert_eq!(referee.name.stats().groups, 0);

    referee.shutdown().await;
}

#[tokio::test]
async fn test_busy_referee() {
    let referee = start_referee().await;
    let client = referee.client();

    let w = worker("groupA").await;
    w.register_and_wait(&client, WAIT).await.unwrap();

    referee.name.set_busy(true);
    assert_eq!(client.refer_address("groupA", 0).await.unwrap(), DEFAULT_BUSY_REPLY);

    let late = worker("groupB").await;
    let err = late
        .register_and_wait(&client, Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(referee.name.registry().group_len("groupB"), 0);

    referee.name.set_busy(false);
    assert_eq!(
        client.refer_address("groupA", 0).await.unwrap(),
        w.path().node_info().unwrap().to_string()
    );
    assert!(referee.name.stats().busy_rejections >= 2);

    referee.shutdown().await;
}

#[tokio::test]
async fn test_busy_gate_toggled_over_the_wire() {
    let referee = start_referee().await;
    let client = referee.client();

    let w = worker("groupA").await;
    w.register_and_wait(&client, WAIT).await.unwrap();

    assert!(client.set_busy(true).await.unwrap());
    assert!(referee.name.is_busy());
    assert_eq!(client.refer_address("groupA", 0).await.unwrap(), DEFAULT_BUSY_REPLY);

    // the admin event is not behind the gate it controls
    assert!(!client.set_busy(false).await.unwrap());
    assert_eq!(
        client.refer_address("groupA", 0).await.unwrap(),
        w.path().node_info().unwrap().to_string()
    );

    referee.shutdown().await;
}

#[tokio::test]
async fn test_unknown_event_and_unroutable_action() {
    let mut referee = start_referee().await;
    let client = referee.client();

    assert_eq!(client.request("no such event", json!([])).await.unwrap(), "");

    let mut stream = tokio::net::TcpStream::connect(referee.info.address()).await.unwrap();
    let frame = flitter::transport::Frame::Peer {
        message: Message::ask(Action::Heartbeat, "ping"),
    };
    flitter::transport::write_frame(&mut stream, &frame, 64 * 1024).await.unwrap();

    let report = tokio::time::timeout(WAIT, referee.drain.recv())
        .await
        .expect("unroutable message should be reported")
        .unwrap();
    assert!(report.message.contains("Heartbeat"));

    referee.shutdown().await;
}

#[tokio::test]
async fn test_one_connection_carries_many_client_events() {
    let referee = start_referee().await;
    let client = referee.client();
    let w = worker("groupA").await;
    w.register_and_wait(&client, WAIT).await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(referee.info.address()).await.unwrap();
    for index in 0..3usize {
        let frame = flitter::transport::Frame::Client {
            event: flitter::service::REFER_ADDRESS_EVENT.to_string(),
            args: json!(["groupA", index]),
        };
        flitter::transport::write_frame(&mut stream, &frame, 64 * 1024).await.unwrap();
        let reply = flitter::transport::read_frame(&mut stream, 64 * 1024).await.unwrap();
        let Some(flitter::transport::Frame::Reply { value }) = reply else {
            panic!("expected reply frame");
        };
        assert_eq!(value.is_empty(), index > 0);
    }

    referee.shutdown().await;
}
