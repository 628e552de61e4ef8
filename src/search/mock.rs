//! Scripted search connector for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{SearchConnector, SearchError, SearchQuery};
use crate::models::{Source, SourceKind};

/// Connector returning fixed sources, with switchable failure mode
pub struct MockSearchConnector {
    id: &'static str,
    kind: SourceKind,
    sources: Mutex<Vec<Source>>,
    errors: Mutex<VecDeque<SearchError>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockSearchConnector {
    pub fn new(id: &'static str, kind: SourceKind) -> Self {
        Self {
            id,
            kind,
            sources: Mutex::new(Vec::new()),
            errors: Mutex::new(VecDeque::new()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sources returned for every query
    pub fn with_sources(self, sources: Vec<Source>) -> Self {
        *self.sources.lock().unwrap() = sources;
        self
    }

    /// Queue one error; queued errors are returned before any sources
    pub fn with_error(self, error: SearchError) -> Self {
        self.errors.lock().unwrap().push_back(error);
        self
    }

    /// Start in failing mode; every search call errors until cleared
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchConnector for MockSearchConnector {
    fn id(&self) -> &'static str {
        self.id
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<Source>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SearchError::RequestFailed("mock connector failure".to_string()));
        }

        Ok(self.sources.lock().unwrap().clone())
    }
}
