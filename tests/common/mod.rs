//! In-process mock RESP server shared by the integration tests.
//!
//! Implements just enough of the command set for the client under test:
//! PING, ECHO, SET (NX, PX), GET, DEL, INCR, MGET, the compare-and-delete
//! EVAL used by Redlock, SUBSCRIBE, PSUBSCRIBE and PUBLISH.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use resply::{ParseStatus, Reply, ReplyParser};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

#[derive(Default)]
struct Store {
    values: HashMap<Vec<u8>, (Vec<u8>, Option<Instant>)>,
    subscribers: Vec<Subscriber>,
}

struct Subscriber {
    channels: Vec<Vec<u8>>,
    patterns: Vec<Vec<u8>>,
    tx: mpsc::UnboundedSender<Bytes>,
}

impl Store {
    fn get(&mut self, key: &[u8]) -> Option<&Vec<u8>> {
        let expired = matches!(
            self.values.get(key),
            Some((_, Some(deadline))) if *deadline <= Instant::now()
        );
        if expired {
            self.values.remove(key);
        }
        self.values.get(key).map(|(value, _)| value)
    }
}

/// A mock server listening on an ephemeral local port.
#[derive(Clone)]
pub struct MockServer {
    addr: SocketAddr,
    store: Arc<Mutex<Store>>,
}

impl MockServer {
    pub async fn start() -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Mutex::new(Store::default()));

        let shared = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(s) => s,
                    Err(_) => break,
                };
                tokio::spawn(serve(socket, Arc::clone(&shared)));
            }
        });

        MockServer { addr, store }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stores a value directly, bypassing the protocol.
    pub fn insert(&self, key: &str, value: &str) {
        self.store
            .lock()
            .unwrap()
            .values
            .insert(key.as_bytes().to_vec(), (value.as_bytes().to_vec(), None));
    }

    /// Reads a value directly, bypassing the protocol.
    pub fn value(&self, key: &str) -> Option<String> {
        self.store
            .lock()
            .unwrap()
            .get(key.as_bytes())
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

/// Returns a local port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn serve(mut socket: TcpStream, store: Arc<Mutex<Store>>) {
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Bytes>();
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        tokio::select! {
            read = socket.read_buf(&mut buf) => {
                match read {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                loop {
                    let mut parser = ReplyParser::new();
                    let mut pending = buf.clone();
                    if parser.feed(&mut pending) == ParseStatus::NeedMoreData {
                        break;
                    }
                    buf = pending;
                    let Some(Reply::Array(args)) = parser.into_reply() else {
                        let _ = socket.write_all(b"-ERR protocol error\r\n").await;
                        return;
                    };
                    let args: Vec<Vec<u8>> = args
                        .into_iter()
                        .map(|a| a.as_bytes().map(<[u8]>::to_vec).unwrap_or_default())
                        .collect();
                    let response = execute(&args, &store, &push_tx);
                    if socket.write_all(&response).await.is_err() {
                        return;
                    }
                }
            }
            Some(message) = push_rx.recv() => {
                if socket.write_all(&message).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn execute(args: &[Vec<u8>], store: &Mutex<Store>, push_tx: &mpsc::UnboundedSender<Bytes>) -> BytesMut {
    let mut out = BytesMut::new();
    let Some(name) = args.first() else {
        return out;
    };
    let name = String::from_utf8_lossy(name).to_ascii_uppercase();
    let mut store = store.lock().unwrap();

    match (name.as_str(), &args[1..]) {
        ("PING", []) => simple(&mut out, "PONG"),
        ("PING", [message]) | ("ECHO", [message]) => bulk(&mut out, Some(message.as_slice())),
        ("SET", [key, value, options @ ..]) => {
            let options: Vec<String> = options
                .iter()
                .map(|o| String::from_utf8_lossy(o).to_ascii_uppercase())
                .collect();
            let nx = options.iter().any(|o| o == "NX");
            let ttl = options
                .iter()
                .position(|o| o == "PX")
                .and_then(|i| options.get(i + 1))
                .and_then(|ms| ms.parse::<u64>().ok())
                .map(Duration::from_millis);

            if nx && store.get(key).is_some() {
                bulk(&mut out, None);
            } else {
                let deadline = ttl.map(|ttl| Instant::now() + ttl);
                store.values.insert(key.clone(), (value.clone(), deadline));
                simple(&mut out, "OK");
            }
        }
        ("GET", [key]) => bulk(&mut out, store.get(key).map(Vec::as_slice)),
        ("DEL", keys) if !keys.is_empty() => {
            let removed = keys
                .iter()
                .filter(|key| store.get(key).is_some() && store.values.remove(*key).is_some())
                .count();
            integer(&mut out, removed as i64);
        }
        ("INCR", [key]) => {
            let current = store.get(key).map(|v| String::from_utf8_lossy(v).into_owned());
            match current.as_deref().unwrap_or("0").parse::<i64>() {
                Ok(n) => {
                    store
                        .values
                        .insert(key.clone(), ((n + 1).to_string().into_bytes(), None));
                    integer(&mut out, n + 1);
                }
                Err(_) => error(&mut out, "ERR value is not an integer or out of range"),
            }
        }
        ("MGET", keys) if !keys.is_empty() => {
            out.extend_from_slice(format!("*{}\r\n", keys.len()).as_bytes());
            for key in keys {
                let value = store.get(key).cloned();
                bulk(&mut out, value.as_deref());
            }
        }
        ("EVAL", [_script, numkeys, key, expected]) if numkeys == b"1" => {
            let matches = store.get(key).is_some_and(|value| value == expected);
            if matches {
                store.values.remove(key);
            }
            integer(&mut out, i64::from(matches));
        }
        ("SUBSCRIBE", channels) | ("PSUBSCRIBE", channels) if !channels.is_empty() => {
            let pattern = name == "PSUBSCRIBE";
            let kind = if pattern { "psubscribe" } else { "subscribe" };
            let index = subscriber_index(&mut store, push_tx);
            for channel in channels {
                let subscriber = &mut store.subscribers[index];
                if pattern {
                    subscriber.patterns.push(channel.clone());
                } else {
                    subscriber.channels.push(channel.clone());
                }
                let count = subscriber.channels.len() + subscriber.patterns.len();
                out.extend_from_slice(b"*3\r\n");
                bulk(&mut out, Some(kind.as_bytes()));
                bulk(&mut out, Some(channel.as_slice()));
                integer(&mut out, count as i64);
            }
        }
        ("PUBLISH", [channel, message]) => {
            let mut receivers = 0;
            store.subscribers.retain(|s| !s.tx.is_closed());
            for subscriber in &store.subscribers {
                if subscriber.channels.iter().any(|c| c == channel) {
                    let mut push = BytesMut::new();
                    push.extend_from_slice(b"*3\r\n");
                    bulk(&mut push, Some(&b"message"[..]));
                    bulk(&mut push, Some(channel.as_slice()));
                    bulk(&mut push, Some(message.as_slice()));
                    if subscriber.tx.send(push.freeze()).is_ok() {
                        receivers += 1;
                    }
                }
                for pattern in subscriber.patterns.iter().filter(|p| glob_match(p, channel)) {
                    let mut push = BytesMut::new();
                    push.extend_from_slice(b"*4\r\n");
                    bulk(&mut push, Some(&b"pmessage"[..]));
                    bulk(&mut push, Some(pattern.as_slice()));
                    bulk(&mut push, Some(channel.as_slice()));
                    bulk(&mut push, Some(message.as_slice()));
                    if subscriber.tx.send(push.freeze()).is_ok() {
                        receivers += 1;
                    }
                }
            }
            integer(&mut out, receivers);
        }
        _ => error(&mut out, &format!("ERR unknown command '{}'", name)),
    }
    out
}

fn subscriber_index(store: &mut Store, tx: &mpsc::UnboundedSender<Bytes>) -> usize {
    if let Some(index) = store
        .subscribers
        .iter()
        .position(|s| s.tx.same_channel(tx))
    {
        return index;
    }
    store.subscribers.push(Subscriber {
        channels: Vec::new(),
        patterns: Vec::new(),
        tx: tx.clone(),
    });
    store.subscribers.len() - 1
}

/// Glob matching with `*` and `?`, enough for PSUBSCRIBE patterns.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

fn simple(out: &mut BytesMut, value: &str) {
    out.extend_from_slice(format!("+{}\r\n", value).as_bytes());
}

fn error(out: &mut BytesMut, message: &str) {
    out.extend_from_slice(format!("-{}\r\n", message).as_bytes());
}

fn integer(out: &mut BytesMut, value: i64) {
    out.extend_from_slice(format!(":{}\r\n", value).as_bytes());
}

fn bulk(out: &mut BytesMut, value: Option<&[u8]>) {
    match value {
        Some(value) => {
            out.extend_from_slice(format!("${}\r\n", value.len()).as_bytes());
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }
        None => out.extend_from_slice(b"$-1\r\n"),
    }
}
