//! End-to-end tests: a real reactor on a background thread, driven by
//! Tokio TCP clients.

use pollkv::commands::CommandHandler;
use pollkv::connection::{ConnectionHandler, ConnectionStats};
use pollkv::server::{Reactor, ServerResult, ShutdownHandle};
use pollkv::storage::{Storage, StorageEngine};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    shutdown: ShutdownHandle,
    join: Option<JoinHandle<ServerResult<()>>>,
}

impl TestServer {
    fn start() -> Self {
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            CommandHandler::new(storage.clone()),
            Arc::clone(&stats),
        );

        let reactor = Reactor::start("127.0.0.1", 0, handler).unwrap();
        let addr = reactor.local_addr();
        let shutdown = reactor.shutdown_handle();
        let join = std::thread::spawn(move || reactor.run());

        Self {
            addr,
            storage,
            stats,
            shutdown,
            join: Some(join),
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    fn stop(&mut self) -> ServerResult<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        self.shutdown.shutdown().unwrap();
        join.join().expect("reactor thread panicked")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Reads exactly `len` bytes or fails after a timeout.
async fn read_reply(client: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(REPLY_TIMEOUT, client.read_exact(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    buf
}

async fn request(client: &mut TcpStream, line: &[u8], expected: &[u8]) {
    client.write_all(line).await.unwrap();
    let reply = read_reply(client, expected.len()).await;
    assert_eq!(
        String::from_utf8_lossy(&reply),
        String::from_utf8_lossy(expected),
        "reply to {:?}",
        String::from_utf8_lossy(line)
    );
}

/// Asserts the server closes the connection.
async fn expect_eof(client: &mut TcpStream) {
    let mut buf = [0u8; 16];
    let n = timeout(REPLY_TIMEOUT, client.read(&mut buf))
        .await
        .expect("timed out waiting for close")
        .unwrap_or(0);
    assert_eq!(n, 0, "unexpected data: {:?}", &buf[..n]);
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_ping_pong() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    request(&mut client, b"PING\r\n", b"+PONG\r\n").await;
    request(&mut client, b"ping\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_set_get_roundtrip() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    request(&mut client, b"SET name Ariz\r\n", b"+OK\r\n").await;
    request(&mut client, b"GET name\r\n", b"$4\r\nAriz\r\n").await;

    request(&mut client, b"set name Bob\r\n", b"+OK\r\n").await;
    request(&mut client, b"get name\r\n", b"$3\r\nBob\r\n").await;
}

#[tokio::test]
async fn test_missing_and_deleted_keys_are_nil() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    request(&mut client, b"GET nothing\r\n", b"$-1\r\n").await;

    request(&mut client, b"SET k v\r\n", b"+OK\r\n").await;
    request(&mut client, b"DEL k\r\n", b"+OK\r\n").await;
    request(&mut client, b"GET k\r\n", b"$-1\r\n").await;
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    request(&mut client, b"DEL ghost\r\n", b"+OK\r\n").await;
    request(&mut client, b"DEL ghost\r\n", b"+OK\r\n").await;
}

#[tokio::test]
async fn test_arity_errors_do_not_mutate() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    request(
        &mut client,
        b"SET onlykey\r\n",
        b"-ERR wrong number of arguments for 'set' command\r\n",
    )
    .await;
    request(
        &mut client,
        b"GET\r\n",
        b"-ERR wrong number of arguments for 'get' command\r\n",
    )
    .await;
    request(
        &mut client,
        b"DEL\r\n",
        b"-ERR wrong number of arguments for 'del' command\r\n",
    )
    .await;

    assert!(server.storage.is_empty());
    request(&mut client, b"GET onlykey\r\n", b"$-1\r\n").await;
}

#[tokio::test]
async fn test_unknown_command_keeps_connection_open() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    request(&mut client, b"FLUSHALL\r\n", b"-ERR unknown command\r\n").await;
    request(&mut client, b"\r\n", b"-ERR unknown command\r\n").await;
    request(&mut client, b"PING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_split_command_replies_once_delimiter_arrives() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    client.write_all(b"SET split").await.unwrap();
    client.flush().await.unwrap();

    // Nothing comes back while the line is incomplete.
    let mut buf = [0u8; 16];
    let early = timeout(Duration::from_millis(200), client.read(&mut buf)).await;
    assert!(early.is_err(), "got a reply before the delimiter");

    client.write_all(b"ted yes\r\n").await.unwrap();
    let reply = read_reply(&mut client, 5).await;
    assert_eq!(reply, b"+OK\r\n");

    request(&mut client, b"GET splitted\r\n", b"$3\r\nyes\r\n").await;
    assert_eq!(server.stats.commands_processed.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_large_reply_is_delivered_intact() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    let value = "x".repeat(512 * 1024);
    let set = format!("SET big {}\r\n", value);
    request(&mut client, set.as_bytes(), b"+OK\r\n").await;

    client.write_all(b"GET big\r\n").await.unwrap();
    // Let the server hit a full send buffer before we start draining.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let expected = format!("${}\r\n{}\r\n", value.len(), value);
    let reply = read_reply(&mut client, expected.len()).await;
    assert!(reply == expected.as_bytes(), "large reply corrupted");

    // Nothing duplicated after the reply.
    request(&mut client, b"PING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_quit_closes_after_reply() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    request(&mut client, b"QUIT\r\n", b"+BYE\r\n").await;
    expect_eof(&mut client).await;

    let stats = Arc::clone(&server.stats);
    wait_until(|| stats.active_connections.load(Ordering::Relaxed) == 0).await;
}

#[tokio::test]
async fn test_client_disconnect_is_cleaned_up() {
    let server = TestServer::start();
    let stats = Arc::clone(&server.stats);

    let mut client = server.connect().await;
    request(&mut client, b"PING\r\n", b"+PONG\r\n").await;
    assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

    drop(client);
    wait_until(|| stats.active_connections.load(Ordering::Relaxed) == 0).await;

    // The server keeps serving new clients.
    let mut other = server.connect().await;
    request(&mut other, b"PING\r\n", b"+PONG\r\n").await;
    assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 2);
}

/// Writes `line`, half-closes, and returns everything the server sends
/// before closing its side.
async fn request_then_half_close(client: &mut TcpStream, line: &[u8]) -> Vec<u8> {
    client.write_all(line).await.unwrap();
    client.shutdown().await.unwrap();

    let mut reply = Vec::new();
    timeout(REPLY_TIMEOUT, client.read_to_end(&mut reply))
        .await
        .expect("timed out waiting for close")
        .unwrap();
    reply
}

#[tokio::test]
async fn test_command_followed_by_half_close_is_answered() {
    let server = TestServer::start();

    for i in 0..50 {
        let mut client = server.connect().await;
        let key = format!("hc{}", i);
        let reply =
            request_then_half_close(&mut client, format!("SET {} 1\r\n", key).as_bytes()).await;

        assert_eq!(reply, b"+OK\r\n", "iteration {}", i);
        assert_eq!(
            server.storage.get(key.as_bytes()),
            Some(bytes::Bytes::from("1"))
        );
    }

    let stats = Arc::clone(&server.stats);
    wait_until(|| stats.active_connections.load(Ordering::Relaxed) == 0).await;
}

#[tokio::test]
async fn test_quit_followed_by_half_close_gets_bye() {
    let server = TestServer::start();
    let mut client = server.connect().await;

    let reply = request_then_half_close(&mut client, b"QUIT\r\n").await;
    assert_eq!(reply, b"+BYE\r\n");
}

#[tokio::test]
async fn test_write_is_visible_to_other_client() {
    let server = TestServer::start();
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    // Both requests are in flight before either reply is read. The loop
    // serves them in arrival order, so B sees either the old or new state.
    a.write_all(b"SET x 1\r\n").await.unwrap();
    b.write_all(b"GET x\r\n").await.unwrap();

    let head = read_reply(&mut b, 5).await;
    if head != b"$-1\r\n" {
        let tail = read_reply(&mut b, 2).await;
        assert_eq!([head, tail].concat(), b"$1\r\n1\r\n");
    }
    assert_eq!(read_reply(&mut a, 5).await, b"+OK\r\n");

    // Once the loop has run A's SET, B reads the new value even though A
    // has not consumed its reply.
    a.write_all(b"SET x 2\r\n").await.unwrap();
    let storage = Arc::clone(&server.storage);
    wait_until(|| storage.get(b"x") == Some(bytes::Bytes::from("2"))).await;

    request(&mut b, b"GET x\r\n", b"$1\r\n2\r\n").await;
    assert_eq!(read_reply(&mut a, 5).await, b"+OK\r\n");
}

#[tokio::test]
async fn test_many_concurrent_clients() {
    let server = TestServer::start();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let mut client = server.connect().await;
        tasks.push(tokio::spawn(async move {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            for _ in 0..10 {
                request(
                    &mut client,
                    format!("SET {} {}\r\n", key, value).as_bytes(),
                    b"+OK\r\n",
                )
                .await;
                let expected = format!("${}\r\n{}\r\n", value.len(), value);
                request(
                    &mut client,
                    format!("GET {}\r\n", key).as_bytes(),
                    expected.as_bytes(),
                )
                .await;
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(server.storage.len(), 32);
    assert_eq!(
        server.storage.get(b"key7"),
        Some(bytes::Bytes::from("value7"))
    );
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let mut server = TestServer::start();
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    request(&mut a, b"PING\r\n", b"+PONG\r\n").await;
    request(&mut b, b"PING\r\n", b"+PONG\r\n").await;

    let addr = server.addr;
    let stats = Arc::clone(&server.stats);
    tokio::task::spawn_blocking(move || server.stop())
        .await
        .unwrap()
        .unwrap();

    expect_eof(&mut a).await;
    expect_eof(&mut b).await;
    assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    assert!(TcpStream::connect(addr).await.is_err());
}
