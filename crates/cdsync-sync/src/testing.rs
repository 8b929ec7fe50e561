//! In-memory remote store for tests
//!
//! Records every call, tracks how many mutating calls are in flight at once
//! and can be told to fail listings, uploads or deletes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};

use cdsync_core::domain::{Checksum, RemoteId, RemoteKind, RemoteNode};
use cdsync_core::ports::{IRemoteStore, ListQuery, NewFile, NewFolder, NodePage};

use crate::hasher::md5_file;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Open,
    Close,
    List {
        kind: RemoteKind,
        filter: Option<String>,
        start_token: Option<String>,
    },
    CreateFolder {
        name: String,
        parent: RemoteId,
    },
    Upload {
        name: String,
        parent: RemoteId,
    },
    Delete(RemoteId),
}

#[derive(Default)]
struct State {
    nodes: Vec<RemoteNode>,
    next_id: usize,
    calls: Vec<Call>,
    pages_before_failure: Option<usize>,
    upload_failures: HashMap<String, u32>,
    delete_failures: u32,
    fail_folders: bool,
    token_cycle: Vec<String>,
}

pub(crate) struct MemoryStore {
    state: Mutex<State>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    page_size: usize,
    delay: Duration,
    supports_delete: bool,
    fail_open: bool,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn rid(s: String) -> RemoteId {
    RemoteId::new(s).unwrap()
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        let root = RemoteNode::folder(rid("root".to_string()), "", vec![]).into_root();
        Self {
            state: Mutex::new(State {
                nodes: vec![root],
                ..State::default()
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            page_size: 100,
            delay: Duration::ZERO,
            supports_delete: true,
            fail_open: false,
        }
    }

    pub(crate) fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn without_delete(mut self) -> Self {
        self.supports_delete = false;
        self
    }

    pub(crate) fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub(crate) fn root_id(&self) -> RemoteId {
        rid("root".to_string())
    }

    fn next_id(state: &mut State, prefix: &str) -> RemoteId {
        state.next_id += 1;
        rid(format!("{prefix}-{}", state.next_id))
    }

    pub(crate) fn add_folder(&self, name: &str, parent: &RemoteId) -> RemoteId {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "folder");
        state
            .nodes
            .push(RemoteNode::folder(id.clone(), name, vec![parent.clone()]));
        id
    }

    pub(crate) fn add_file(
        &self,
        name: &str,
        parent: &RemoteId,
        checksum: Option<Checksum>,
    ) -> RemoteId {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "file");
        state
            .nodes
            .push(RemoteNode::file(id.clone(), name, vec![parent.clone()], checksum));
        id
    }

    pub(crate) fn fail_listing_after(&self, pages: usize) {
        self.state.lock().unwrap().pages_before_failure = Some(pages);
    }

    /// Listing pages come back empty, continuation tokens repeat `tokens` forever
    pub(crate) fn cycle_tokens(&self, tokens: &[&str]) {
        self.state.lock().unwrap().token_cycle = tokens.iter().map(|t| t.to_string()).collect();
    }

    pub(crate) fn fail_uploads(&self, name: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .upload_failures
            .insert(name.to_string(), times);
    }

    pub(crate) fn fail_folder_creations(&self) {
        self.state.lock().unwrap().fail_folders = true;
    }

    pub(crate) fn fail_deletes(&self, times: u32) {
        self.state.lock().unwrap().delete_failures = times;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn uploads(&self) -> usize {
        self.count(|c| matches!(c, Call::Upload { .. }))
    }

    pub(crate) fn folder_creations(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateFolder { .. }))
    }

    pub(crate) fn deletes(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete(_)))
    }

    pub(crate) fn mutations(&self) -> usize {
        self.uploads() + self.folder_creations() + self.deletes()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn node(&self, id: &RemoteId) -> Option<RemoteNode> {
        let state = self.state.lock().unwrap();
        state.nodes.iter().find(|n| &n.id == id).cloned()
    }

    pub(crate) fn find(&self, name: &str) -> Vec<RemoteNode> {
        let state = self.state.lock().unwrap();
        state.nodes.iter().filter(|n| n.name == name).cloned().collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for MemoryStore {
    async fn open(&self) -> Result<()> {
        self.record(Call::Open);
        if self.fail_open {
            bail!("injected open failure");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(Call::Close);
        Ok(())
    }

    async fn list_page(&self, query: &ListQuery, start_token: Option<&str>) -> Result<NodePage> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List {
            kind: query.kind,
            filter: query.filter.clone(),
            start_token: start_token.map(str::to_string),
        });

        if let Some(remaining) = state.pages_before_failure.as_mut() {
            if *remaining == 0 {
                bail!("injected listing failure (500)");
            }
            *remaining -= 1;
        }

        if !state.token_cycle.is_empty() {
            let served = state
                .calls
                .iter()
                .filter(|c| matches!(c, Call::List { .. }))
                .count()
                - 1;
            let next = state.token_cycle[served % state.token_cycle.len()].clone();
            return Ok(NodePage {
                nodes: Vec::new(),
                next_token: Some(next),
                count: None,
            });
        }

        let offset = start_token.map_or(Ok(0), |t| t.parse::<usize>())?;
        let matching: Vec<RemoteNode> = state
            .nodes
            .iter()
            .filter(|n| n.kind == query.kind)
            .cloned()
            .collect();
        let end = (offset + self.page_size).min(matching.len());
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(NodePage {
            nodes: matching[offset.min(end)..end].to_vec(),
            next_token,
            count: Some(matching.len() as u64),
        })
    }

    async fn create_folder(&self, folder: &NewFolder) -> Result<RemoteNode> {
        let _guard = self.enter();
        self.record(Call::CreateFolder {
            name: folder.name.clone(),
            parent: folder.parents[0].clone(),
        });
        self.pause().await;

        let mut state = self.state.lock().unwrap();
        if state.fail_folders {
            bail!("injected folder creation failure for {}", folder.name);
        }
        let id = Self::next_id(&mut state, "folder");
        let node = RemoteNode::folder(id, folder.name.clone(), folder.parents.clone());
        state.nodes.push(node.clone());
        Ok(node)
    }

    async fn upload_file(&self, file: &NewFile) -> Result<RemoteNode> {
        let _guard = self.enter();
        self.record(Call::Upload {
            name: file.name.clone(),
            parent: file.parents[0].clone(),
        });
        self.pause().await;

        {
            let mut state = self.state.lock().unwrap();
            if let Some(remaining) = state.upload_failures.get_mut(&file.name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    bail!("injected upload failure for {} (503)", file.name);
                }
            }
        }

        let checksum = md5_file(&file.path).await?;
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "file");
        let node = RemoteNode::file(id, file.name.clone(), file.parents.clone(), Some(checksum));
        state.nodes.push(node.clone());
        Ok(node)
    }

    async fn delete_node(&self, id: &RemoteId) -> Result<()> {
        let _guard = self.enter();
        self.record(Call::Delete(id.clone()));
        self.pause().await;

        let mut state = self.state.lock().unwrap();
        if state.delete_failures > 0 {
            state.delete_failures -= 1;
            bail!("injected delete failure for {id}");
        }
        state.nodes.retain(|n| &n.id != id);
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        self.supports_delete
    }
}
