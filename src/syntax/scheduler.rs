//! Change-driven highlight recomputation
//!
//! Every document or viewport change bumps a revision and starts a pass on
//! a worker thread. Results come back over a channel stamped with the
//! revision that triggered them, and only the newest one is applied: a
//! pass older than the latest change is dropped no matter when it
//! finishes, so results land in change order rather than completion
//! order.
//!
//! The active range set is an `Arc<[StyleRange]>` swapped in one
//! assignment; readers see either the old set or the new one.
//!
//! Workers also watch the newest revision while they run. A pass that a
//! later change has superseded stops before its next block, so a burst of
//! edits costs roughly one pass per edit started, not one full pass each.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::engine::{Engine, EngineLoader};
use super::fence::CodeBlock;
use super::grammar::Grammar;
use super::registry::GrammarRegistry;
use super::style::{sort_ranges, StyleRange};
use crate::error::{HighlightError, Result};

/// Engine availability
#[derive(Debug, Clone)]
pub enum SchedulerState {
    /// No change seen yet
    Idle,
    /// Engine being acquired
    Loading,
    Ready(Arc<Engine>),
    /// Engine could not be acquired; nothing is highlighted
    Failed,
}

/// Messages sent back from worker threads
pub enum SchedulerMsg {
    EngineLoaded(Result<Engine>),
    PassCompleted {
        revision: u64,
        ranges: Vec<StyleRange>,
        cache: BlockCache,
    },
}

impl std::fmt::Debug for SchedulerMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerMsg::EngineLoaded(result) => f
                .debug_tuple("EngineLoaded")
                .field(&result.as_ref().map(|_| "engine"))
                .finish(),
            SchedulerMsg::PassCompleted {
                revision, ranges, ..
            } => f
                .debug_struct("PassCompleted")
                .field("revision", revision)
                .field("ranges", &ranges.len())
                .finish(),
        }
    }
}

/// Ranges of already highlighted blocks
///
/// Keyed by registry version and block identity, so any grammar change or
/// edit inside a block misses.
#[derive(Debug, Clone, Default)]
pub struct BlockCache {
    entries: HashMap<(u64, CodeBlock), Arc<[StyleRange]>>,
}

impl BlockCache {
    pub fn get(&self, version: u64, block: &CodeBlock) -> Option<Arc<[StyleRange]>> {
        // the key owns its block, so build one for the lookup
        self.entries.get(&(version, block.clone())).cloned()
    }

    pub fn insert(&mut self, version: u64, block: CodeBlock, ranges: Arc<[StyleRange]>) {
        self.entries.insert((version, block), ranges);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Revision a pass was started for, checked against the newest change
#[derive(Debug, Clone)]
struct PassToken {
    revision: u64,
    latest: Arc<AtomicU64>,
}

impl PassToken {
    /// Whether a newer change has been made since the pass started
    fn is_superseded(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.revision
    }
}

/// Keeps one document surface's style ranges current
pub struct HighlightScheduler {
    state: SchedulerState,
    loader: Arc<dyn EngineLoader>,
    registry: Arc<GrammarRegistry>,
    /// Languages looked for in fenced blocks, in registration order
    languages: Vec<String>,
    document: Arc<str>,
    /// Newest change
    revision: u64,
    /// `revision` as seen by workers
    latest: Arc<AtomicU64>,
    /// Revision of the active set
    applied: u64,
    active: Arc<[StyleRange]>,
    cache: Arc<BlockCache>,
    load_error: Option<String>,
    tx: Sender<SchedulerMsg>,
    rx: Receiver<SchedulerMsg>,
}

impl HighlightScheduler {
    /// Create a scheduler with an empty registry
    pub fn new(loader: impl EngineLoader) -> Self {
        Self::with_registry(GrammarRegistry::new(), loader)
    }

    /// Create a scheduler over an existing registry
    pub fn with_registry(registry: GrammarRegistry, loader: impl EngineLoader) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: SchedulerState::Idle,
            loader: Arc::new(loader),
            registry: Arc::new(registry),
            languages: Vec::new(),
            document: Arc::from(""),
            revision: 0,
            latest: Arc::new(AtomicU64::new(0)),
            applied: 0,
            active: Arc::from(Vec::new()),
            cache: Arc::new(BlockCache::default()),
            load_error: None,
            tx,
            rx,
        }
    }

    /// Register a grammar and highlight its fenced blocks from the next pass on
    pub fn register_language(&mut self, language_id: &str, grammar: Grammar) {
        self.registry_mut().register(language_id, grammar);
        self.enable(language_id);
    }

    /// Highlight fenced blocks of an already registered grammar
    pub fn enable_language(&mut self, language_id: &str) -> Result<()> {
        if !self.registry.contains(language_id) {
            return Err(HighlightError::GrammarNotFound(language_id.to_string()));
        }
        self.enable(language_id);
        Ok(())
    }

    /// Stop highlighting fenced blocks of `language_id`
    ///
    /// The grammar stays registered for languages embedding it. Returns
    /// whether the language was enabled.
    pub fn unregister_language(&mut self, language_id: &str) -> bool {
        let before = self.languages.len();
        self.languages.retain(|id| id != language_id);
        before != self.languages.len()
    }

    /// Register a grammar without highlighting fenced blocks of it
    pub fn add_grammar(&mut self, name: &str, grammar: Grammar) {
        self.registry_mut().register(name, grammar);
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    /// Mutable registry; in-flight passes keep the snapshot they started with
    pub fn registry_mut(&mut self) -> &mut GrammarRegistry {
        Arc::make_mut(&mut self.registry)
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// The document text changed
    pub fn document_changed(&mut self, text: &str) {
        self.document = Arc::from(text);
        self.changed();
    }

    /// The visible region changed
    pub fn viewport_changed(&mut self) {
        self.changed();
    }

    /// The currently applied ranges
    pub fn active_style_ranges(&self) -> Arc<[StyleRange]> {
        Arc::clone(&self.active)
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Why the engine could not be acquired
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Number of cached blocks
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// Whether the newest change has been fully handled
    pub fn is_settled(&self) -> bool {
        match self.state {
            SchedulerState::Idle => self.revision == 0,
            SchedulerState::Loading => false,
            SchedulerState::Ready(_) => self.applied == self.revision,
            SchedulerState::Failed => true,
        }
    }

    /// Handle all pending messages without blocking
    ///
    /// Returns true if the active set changed.
    pub fn process_messages(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.rx.try_recv() {
            changed |= self.handle_message(msg);
        }
        changed
    }

    /// Block until settled or until `timeout` passes; returns whether settled
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.process_messages();
        while !self.is_settled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(msg) => {
                    self.handle_message(msg);
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return self.is_settled(),
            }
        }
        true
    }

    /// Apply one message; returns true if the active set changed
    pub fn handle_message(&mut self, msg: SchedulerMsg) -> bool {
        match msg {
            SchedulerMsg::EngineLoaded(Ok(engine)) => {
                if !matches!(self.state, SchedulerState::Loading) {
                    tracing::debug!("ignoring engine delivered in state {:?}", self.state);
                    return false;
                }
                tracing::info!("highlight engine ready");
                let engine = Arc::new(engine);
                self.state = SchedulerState::Ready(Arc::clone(&engine));
                if self.revision > self.applied {
                    self.spawn_pass(engine);
                }
                false
            }
            SchedulerMsg::EngineLoaded(Err(e)) => {
                tracing::error!("highlight engine failed to load: {}", e);
                self.state = SchedulerState::Failed;
                self.load_error = Some(e.to_string());
                let changed = !self.active.is_empty();
                self.active = Arc::from(Vec::new());
                changed
            }
            SchedulerMsg::PassCompleted {
                revision,
                ranges,
                cache,
            } => {
                if revision < self.revision || revision <= self.applied {
                    tracing::debug!(
                        "Discarding stale highlight pass: rev {} (latest {}, applied {})",
                        revision,
                        self.revision,
                        self.applied
                    );
                    return false;
                }
                tracing::trace!("applying pass rev={} ranges={}", revision, ranges.len());
                self.active = Arc::from(ranges);
                self.cache = Arc::new(cache);
                self.applied = revision;
                true
            }
        }
    }

    fn enable(&mut self, language_id: &str) {
        if !self.languages.iter().any(|id| id == language_id) {
            self.languages.push(language_id.to_string());
        }
    }

    fn changed(&mut self) {
        self.revision += 1;
        self.latest.store(self.revision, Ordering::Release);
        match &self.state {
            SchedulerState::Idle => {
                self.state = SchedulerState::Loading;
                self.spawn_load();
            }
            SchedulerState::Loading | SchedulerState::Failed => {}
            SchedulerState::Ready(engine) => {
                let engine = Arc::clone(engine);
                self.spawn_pass(engine);
            }
        }
    }

    fn spawn_load(&self) {
        let loader = Arc::clone(&self.loader);
        let tx = self.tx.clone();
        tracing::debug!("acquiring highlight engine");
        thread::spawn(move || {
            // receiver gone means the scheduler was dropped
            let _ = tx.send(SchedulerMsg::EngineLoaded(loader.load()));
        });
    }

    fn spawn_pass(&self, engine: Arc<Engine>) {
        let pass = PassToken {
            revision: self.revision,
            latest: Arc::clone(&self.latest),
        };
        let registry = Arc::clone(&self.registry);
        let languages = self.languages.clone();
        let document = Arc::clone(&self.document);
        let previous = Arc::clone(&self.cache);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let Some((ranges, cache)) =
                run_pass(&engine, &registry, &languages, &document, &previous, &pass)
            else {
                tracing::trace!("pass rev={} superseded, stopped early", pass.revision);
                return;
            };
            let _ = tx.send(SchedulerMsg::PassCompleted {
                revision: pass.revision,
                ranges,
                cache,
            });
        });
    }
}

impl std::fmt::Debug for HighlightScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightScheduler")
            .field("state", &self.state)
            .field("languages", &self.languages)
            .field("revision", &self.revision)
            .field("applied", &self.applied)
            .field("active", &self.active.len())
            .finish()
    }
}

/// One full recompute over a snapshot
///
/// Returns `None` once `pass` is superseded; the result would be discarded.
fn run_pass(
    engine: &Engine,
    registry: &GrammarRegistry,
    languages: &[String],
    document: &str,
    previous: &BlockCache,
    pass: &PassToken,
) -> Option<(Vec<StyleRange>, BlockCache)> {
    let mut ranges = Vec::new();
    let mut cache = BlockCache::default();
    if pass.is_superseded() {
        return None;
    }
    if !engine.is_enabled() {
        return Some((ranges, cache));
    }
    for language in languages {
        let found =
            highlight_language(engine, registry, language, document, previous, &mut cache, pass);
        match found {
            Ok(Some(found)) => ranges.extend(found),
            Ok(None) => return None,
            Err(e) => tracing::warn!("skipping {} blocks: {}", language, e),
        }
    }
    sort_ranges(&mut ranges);
    Some((ranges, cache))
}

/// Ranges of every `language_id` block, `None` if the pass was superseded
fn highlight_language(
    engine: &Engine,
    registry: &GrammarRegistry,
    language_id: &str,
    document: &str,
    previous: &BlockCache,
    cache: &mut BlockCache,
    pass: &PassToken,
) -> Result<Option<Vec<StyleRange>>> {
    let version = registry.version();
    let scanner = engine.scanner(language_id)?;
    let mut ranges = Vec::new();
    for block in scanner.blocks(document) {
        if pass.is_superseded() {
            return Ok(None);
        }
        let block_ranges = match previous.get(version, &block) {
            Some(hit) => hit,
            None => Arc::from(engine.highlight_code_block(registry, &block, document)?),
        };
        ranges.extend(block_ranges.iter().cloned());
        cache.insert(version, block, block_ranges);
    }
    Ok(Some(ranges))
}
