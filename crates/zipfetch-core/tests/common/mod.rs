//! Shared helpers for the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};
use zipfetch_core::{CompletionSink, ProgressSink};
use zipfetch_types::{Phase, PhaseProgress, PipelineEvent, PipelineState, RunOutcome};

/// An entry to put into a test archive; `None` content makes a directory marker
pub type Entry<'a> = (&'a str, Option<Vec<u8>>);

/// Build a zip in memory. Entries are stored uncompressed so the archive size
/// tracks the content size.
pub fn build_zip(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, content) in entries {
        match content {
            Some(bytes) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(bytes).unwrap();
            }
            None => writer.add_directory(*name, options).unwrap(),
        }
    }

    writer.finish().unwrap().into_inner()
}

/// Three files and one directory marker, about a megabyte in total
pub fn sample_entries() -> Vec<Entry<'static>> {
    vec![
        ("GameTracking-master/", None),
        ("GameTracking-master/README.md", Some(b"# tracking\n".to_vec())),
        (
            "GameTracking-master/game/pak01.bin",
            Some((0..600_000u32).map(|i| (i % 251) as u8).collect()),
        ),
        (
            "GameTracking-master/game/scripts/items.txt",
            Some(vec![b'x'; 399_000]),
        ),
    ]
}

/// Relative path and size of every regular file below `root`
pub fn regular_files(root: &Path) -> BTreeMap<String, u64> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, u64>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            let file_type = entry.file_type().unwrap();
            if file_type.is_dir() {
                walk(root, &path, out);
            } else if file_type.is_file() {
                let relative = path.strip_prefix(root).unwrap();
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.insert(key, entry.metadata().unwrap().len());
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

/// What the archive's file entries should produce on disk
pub fn expected_files(entries: &[Entry<'_>]) -> BTreeMap<String, u64> {
    entries
        .iter()
        .filter_map(|(name, content)| {
            content
                .as_ref()
                .map(|bytes| (name.to_string(), bytes.len() as u64))
        })
        .collect()
}

/// A hand-written HTTP response for cases the mock server cannot express
#[derive(Clone)]
pub struct RawResponse {
    pub head: String,
    pub body: Vec<u8>,
    /// Send only this many body bytes, then hold the connection open
    pub stall_after: Option<usize>,
}

impl RawResponse {
    /// HTTP/1.0 response without a length header; the body ends when the
    /// connection closes
    pub fn close_delimited(body: Vec<u8>) -> Self {
        Self {
            head: "HTTP/1.0 200 OK\r\nContent-Type: application/zip\r\nConnection: close\r\n\r\n"
                .to_string(),
            body,
            stall_after: None,
        }
    }

    /// Announces the full length but stops sending after `sent` bytes
    pub fn stalling(body: Vec<u8>, sent: usize) -> Self {
        Self {
            head: format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\n\r\n",
                body.len()
            ),
            body,
            stall_after: Some(sent),
        }
    }
}

/// Serve `response` to every connection on a local port and return the URL
pub async fn serve_raw(response: RawResponse) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(respond(socket, response.clone()));
        }
    });

    format!("http://{}/archive.zip", addr)
}

async fn respond(mut socket: TcpStream, response: RawResponse) {
    // Drain the request head before answering
    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buffer[..n]),
        }
    }

    if socket.write_all(response.head.as_bytes()).await.is_err() {
        return;
    }

    match response.stall_after {
        Some(sent) => {
            let _ = socket.write_all(&response.body[..sent]).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        None => {
            let _ = socket.write_all(&response.body).await;
            let _ = socket.shutdown().await;
        }
    }
}

/// Sink that remembers everything it is told
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    pub fn progress(&self, phase: Phase) -> Vec<PhaseProgress> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::Progress(p) if p.phase == phase => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<PipelineState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::StateChanged(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn outcomes(&self) -> Vec<RunOutcome> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::Finished(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, progress: &PhaseProgress) {
        self.events.lock().push(PipelineEvent::Progress(progress.clone()));
    }

    fn on_state(&self, state: PipelineState) {
        self.events.lock().push(PipelineEvent::StateChanged(state));
    }
}

impl CompletionSink for RecordingSink {
    fn on_complete(&self, outcome: &RunOutcome) {
        self.events.lock().push(PipelineEvent::Finished(outcome.clone()));
    }
}

/// Units never go backwards and the total is reached exactly once
pub fn assert_monotonic_to_total(events: &[PhaseProgress]) {
    assert!(!events.is_empty(), "no progress reported");
    for pair in events.windows(2) {
        assert!(
            pair[0].completed_units <= pair[1].completed_units,
            "progress went backwards: {} -> {}",
            pair[0].completed_units,
            pair[1].completed_units
        );
    }
    let completions = events.iter().filter(|p| p.is_complete()).count();
    assert_eq!(completions, 1, "phase total reported {} times", completions);
    assert!(events.last().unwrap().is_complete());
}
