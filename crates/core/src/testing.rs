//! Test doubles shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use crate::cache::{PartitionStore, ResponseEntry};
use crate::http::{Fetcher, Request, Response};
use crate::Error;

pub(crate) fn url(path: &str) -> Url {
    Url::parse("https://example.com").unwrap().join(path).unwrap()
}

/// Fetcher answering from per-URL scripts.
///
/// Each URL holds a queue of outcomes; the front is popped while more than one
/// remains, after which the last outcome repeats. Unscripted URLs fail.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Result<Response, String>>>>,
    calls: Mutex<Vec<Request>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &Url, response: Response) {
        self.push(url, Ok(response));
    }

    pub(crate) fn fail(&self, url: &Url, message: &str) {
        self.push(url, Err(message.to_string()));
    }

    /// Forget everything scripted for `url`.
    pub(crate) fn clear(&self, url: &Url) {
        self.scripts.lock().unwrap().remove(url.as_str());
    }

    fn push(&self, url: &Url, outcome: Result<Response, String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Park the next fetch until the returned gate is notified.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn calls_for(&self, url: &Url) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.url == *url).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn last_request(&self, url: &Url) -> Option<Request> {
        self.calls.lock().unwrap().iter().rev().find(|r| r.url == *url).cloned()
    }

    fn next_outcome(&self, url: &Url) -> Result<Response, Error> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .get_mut(url.as_str())
            .ok_or_else(|| Error::Network(format!("no response scripted for {url}")))?;
        let outcome = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        match outcome {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(Error::Network(message)),
            None => Err(Error::Network(format!("no response scripted for {url}"))),
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.clone());
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.next_outcome(&request.url)
    }
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub(crate) struct FailingStore;

fn unavailable<T>() -> Result<T, Error> {
    Err(Error::Storage("store unavailable".into()))
}

#[async_trait]
impl PartitionStore for FailingStore {
    async fn create(&self, _partition: &str) -> Result<(), Error> {
        unavailable()
    }

    async fn get(&self, _partition: &str, _key: &str) -> Result<Option<ResponseEntry>, Error> {
        unavailable()
    }

    async fn put(&self, _partition: &str, _entry: ResponseEntry) -> Result<(), Error> {
        unavailable()
    }

    async fn delete_entry(&self, _partition: &str, _key: &str) -> Result<bool, Error> {
        unavailable()
    }

    async fn keys(&self, _partition: &str) -> Result<Vec<String>, Error> {
        unavailable()
    }

    async fn partition_names(&self) -> Result<Vec<String>, Error> {
        unavailable()
    }

    async fn delete_partition(&self, _partition: &str) -> Result<bool, Error> {
        unavailable()
    }
}
