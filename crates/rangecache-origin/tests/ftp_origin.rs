//! FTP origin behaviour against a minimal in-process server
#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use rangecache_origin::{FtpConfig, FtpOrigin, Origin, RetryPolicy};
use std::{
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

const FILE_PATH: &str = "/pub/data.bin";

struct FakeFtp {
    addr: SocketAddr,
    retrievals: Arc<AtomicUsize>,
}

fn reply(out: &mut TcpStream, line: &str) {
    let _ = out.write_all(format!("{line}\r\n").as_bytes());
}

fn serve_session(stream: TcpStream, content: &[u8], retrievals: &AtomicUsize) {
    let mut out = stream.try_clone().expect("clone");
    let reader = BufReader::new(stream);
    reply(&mut out, "220-Welcome to the fake server");
    reply(&mut out, "220 Ready");

    let mut rest = 0usize;
    let mut passive: Option<TcpListener> = None;

    for line in reader.lines() {
        let Ok(line) = line else { break };
        let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        match verb {
            "USER" => reply(&mut out, "331 Password required"),
            "PASS" => reply(&mut out, "230 Logged in"),
            "TYPE" => reply(&mut out, "200 Binary mode"),
            "SIZE" if arg == FILE_PATH => reply(&mut out, &format!("213 {}", content.len())),
            "MDTM" if arg == FILE_PATH => reply(&mut out, "213 20151021072800"),
            "SIZE" | "MDTM" => reply(&mut out, "550 No such file"),
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").expect("bind data");
                let port = listener.local_addr().expect("addr").port();
                passive = Some(listener);
                reply(
                    &mut out,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        port / 256,
                        port % 256
                    ),
                );
            }
            "REST" => {
                rest = arg.parse().expect("numeric REST");
                reply(&mut out, "350 Restarting");
            }
            "RETR" => {
                retrievals.fetch_add(1, Ordering::SeqCst);
                let Some(listener) = passive.take() else {
                    reply(&mut out, "425 Use PASV first");
                    continue;
                };
                reply(&mut out, "150 Opening data connection");
                if let Ok((mut data, _)) = listener.accept() {
                    // The client hangs up once it has enough bytes.
                    let _ = data.write_all(&content[rest.min(content.len())..]);
                }
                rest = 0;
                reply(&mut out, "226 Transfer complete");
            }
            "QUIT" => {
                reply(&mut out, "221 Bye");
                break;
            }
            _ => reply(&mut out, "502 Not implemented"),
        }
    }
}

fn spawn_server(content: Vec<u8>) -> FakeFtp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let retrievals = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&retrievals);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            serve_session(stream, &content, &counter);
        }
    });

    FakeFtp { addr, retrievals }
}

fn content() -> Vec<u8> {
    (0..20_000u32).map(|i| (i % 241) as u8).collect()
}

fn origin(server: &FakeFtp, path: &str) -> FtpOrigin {
    FtpOrigin::new(
        &format!("ftp://{}{path}", server.addr),
        FtpConfig::default(),
        RetryPolicy::none(),
    )
    .expect("origin")
}

#[test]
fn stat_reports_size_and_mtime() {
    let server = spawn_server(content());
    let stat = origin(&server, FILE_PATH).stat().expect("stat");
    assert_eq!(stat.size, 20_000);
    assert_eq!(stat.modified, 1_445_412_480);
}

#[test]
fn fetch_range_uses_rest_offset() {
    let data = content();
    let server = spawn_server(data.clone());
    let origin = origin(&server, FILE_PATH);

    let bytes = origin.fetch_range(8192, 16384).expect("middle range");
    assert_eq!(&bytes[..], &data[8192..16384]);

    let bytes = origin.fetch_range(0, 100).expect("leading range");
    assert_eq!(&bytes[..], &data[..100]);

    let bytes = origin.fetch_range(19_990, 20_000).expect("tail range");
    assert_eq!(&bytes[..], &data[19_990..]);

    assert_eq!(server.retrievals.load(Ordering::SeqCst), 3);
}

#[test]
fn range_past_end_is_unsatisfiable_without_retrieval() {
    let server = spawn_server(content());
    let err = origin(&server, FILE_PATH)
        .fetch_range(19_000, 21_000)
        .expect_err("past end");
    assert!(err.is_range_unsatisfiable(), "unexpected error: {err}");
    assert_eq!(server.retrievals.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_file_is_not_found() {
    let server = spawn_server(content());
    let err = origin(&server, "/pub/absent.bin")
        .stat()
        .expect_err("missing");
    assert!(err.is_not_found(), "unexpected error: {err}");
}
