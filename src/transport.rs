//! Asset transport: URL resolution and background fetching.
//!
//! Flow:
//!   1. AssetResolver turns a processed filename into full / placeholder URLs
//!   2. Loader::schedule(generation, index, url) → spawns thread → runs the fetcher
//!   3. Loader::try_take() hands finished fetches back to the grid's thread
//!
//! Background threads only fetch. All state changes happen on the thread
//! that owns the grid.

use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::FetchError;

// ── Resolution ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetResolver {
    asset_base: String,
    placeholder_base: Option<String>,
}

impl AssetResolver {
    pub fn new(asset_base: impl Into<String>, placeholder_base: Option<String>) -> Self {
        AssetResolver {
            asset_base: asset_base.into(),
            placeholder_base,
        }
    }

    /// `{assetBaseURL}/{processed_filename}`
    pub fn full_url(&self, filename: &str) -> String {
        join(&self.asset_base, filename)
    }

    /// `{placeholderBaseURL}/{processed_filename}`, or `None` when no
    /// pre-generated placeholders exist.
    pub fn placeholder_url(&self, filename: &str) -> Option<String> {
        self.placeholder_base.as_deref().map(|b| join(b, filename))
    }
}

fn join(base: &str, filename: &str) -> String {
    let base = base.strip_suffix('/').unwrap_or(base);
    let encoded: Vec<String> = filename
        .split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect();
    if base.is_empty() {
        encoded.join("/")
    } else {
        format!("{}/{}", base, encoded.join("/"))
    }
}

// ── Fetchers ────────────────────────────────────────────────────────────

/// Fetches a full-resolution asset. Only success or failure matters.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<(), FetchError>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        HttpFetcher {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<(), FetchError> {
        match self.agent.get(url).call() {
            Ok(resp) => {
                let mut body = resp.into_reader();
                std::io::copy(&mut body, &mut std::io::sink())?;
                Ok(())
            }
            Err(ureq::Error::Status(code, _)) => Err(FetchError::Status(code)),
            Err(ureq::Error::Transport(t)) => Err(FetchError::Transport(t.to_string())),
        }
    }
}

/// Reads assets from disk. Accepts plain paths and `file://` URLs with
/// percent-encoded segments.
pub struct FileFetcher;

impl AssetFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<(), FetchError> {
        let raw = url.strip_prefix("file://").unwrap_or(url);
        let path = urlencoding::decode(raw).map_err(|e| FetchError::Transport(e.to_string()))?;
        let path = Path::new(path.as_ref());
        if !std::fs::metadata(path)?.is_file() {
            return Err(FetchError::Transport(format!("{} is not a file", path.display())));
        }
        std::fs::read(path)?;
        Ok(())
    }
}

/// HTTP for `http(s)://` URLs, the filesystem for everything else.
pub struct AutoFetcher {
    http: HttpFetcher,
}

impl AutoFetcher {
    pub fn new(timeout: Duration) -> Self {
        AutoFetcher {
            http: HttpFetcher::new(timeout),
        }
    }
}

impl AssetFetcher for AutoFetcher {
    fn fetch(&self, url: &str) -> Result<(), FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.fetch(url)
        } else {
            FileFetcher.fetch(url)
        }
    }
}

// ── Loader ──────────────────────────────────────────────────────────────

/// One-shot completion of a scheduled fetch.
#[derive(Debug)]
pub struct FetchDone {
    /// Layout generation the fetch was issued for.
    pub generation: u64,
    pub index: usize,
    pub url: String,
    pub result: Result<(), FetchError>,
}

/// Runs fetches on background threads and queues their completions.
pub struct Loader {
    fetcher: Arc<dyn AssetFetcher>,
    /// (generation, index) pairs issued but not yet taken.
    pending: HashSet<(u64, usize)>,
    tx: mpsc::Sender<FetchDone>,
    rx: mpsc::Receiver<FetchDone>,
}

impl Loader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        let (tx, rx) = mpsc::channel();
        Loader {
            fetcher,
            pending: HashSet::new(),
            tx,
            rx,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, generation: u64, index: usize) -> bool {
        self.pending.contains(&(generation, index))
    }

    /// Start a background fetch. Returns false if this one is already in flight.
    pub fn schedule(&mut self, generation: u64, index: usize, url: String) -> bool {
        if !self.pending.insert((generation, index)) {
            return false;
        }

        let fetcher = self.fetcher.clone();
        let tx = self.tx.clone();
        let thread_url = url.clone();
        let spawned = thread::Builder::new()
            .name(format!("fetch-{}", index))
            .spawn(move || {
                let result = fetcher.fetch(&thread_url);
                // Receiver may be gone if the grid was torn down mid-fetch.
                tx.send(FetchDone {
                    generation,
                    index,
                    url: thread_url,
                    result,
                })
                .ok();
            });

        if let Err(e) = spawned {
            tracing::warn!("loader: cannot spawn fetch thread for {}: {}", url, e);
            self.tx
                .send(FetchDone {
                    generation,
                    index,
                    url,
                    result: Err(FetchError::Io(e)),
                })
                .ok();
        }
        true
    }

    /// Take one finished fetch, if any.
    pub fn try_take(&mut self) -> Option<FetchDone> {
        let done = self.rx.try_recv().ok()?;
        self.pending.remove(&(done.generation, done.index));
        Some(done)
    }

    /// Block up to `timeout` for the next finished fetch.
    pub fn wait(&mut self, timeout: Duration) -> Option<FetchDone> {
        let done = self.rx.recv_timeout(timeout).ok()?;
        self.pending.remove(&(done.generation, done.index));
        Some(done)
    }

    /// Forget everything in flight. Their completions still arrive but will
    /// carry a stale generation.
    pub fn forget_pending(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Succeeds instantly except for URLs listed in `failing`; records every call.
    #[derive(Default)]
    pub(crate) struct ScriptedFetcher {
        pub(crate) failing: Mutex<HashSet<String>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub(crate) fn fail(&self, url: &str) {
            self.failing.lock().unwrap().insert(url.to_string());
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AssetFetcher for ScriptedFetcher {
        fn fetch(&self, url: &str) -> Result<(), FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.failing.lock().unwrap().contains(url) {
                Err(FetchError::Status(404))
            } else {
                Ok(())
            }
        }
    }
}
