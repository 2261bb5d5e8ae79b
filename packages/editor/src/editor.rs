//! # Editor Container
//!
//! Owns [`EditorState`] and the collaborators, and is the only way to
//! change state.
//!
//! ```text
//! dispatch(intent)
//!     │
//!     ▼
//! ┌─────────┐   follow-ups    ┌──────────┐
//! │ reduce  │◀────────────────│ planner  │
//! └─────────┘                 └──────────┘
//!     │ notify listeners           │ effect
//!     ▼                            ▼
//! subscribers               JoinSet ── settle() ──▶ dispatch(outcome)
//! ```
//!
//! ## Design
//!
//! - Intents are processed strictly in order. Follow-ups queue behind the
//!   intent that produced them; effect outcomes re-enter through
//!   [`Editor::settle`] in completion order
//! - Local state errors are logged and swallowed unless the config is
//!   strict. Responses for transactions that are no longer pending are
//!   always ignored
//! - Persistence calls are never cancelled; [`Editor::teardown`] only drops
//!   the handles

use crate::autosave::AutosaveTimer;
use crate::clipboard::{Clipboard, ClipboardEvent, ClipboardPayload};
use crate::config::EditorConfig;
use crate::effects::{perform, Effect, Planner};
use crate::errors::{EditorError, StateError, TransactionError};
use crate::geometry::{DragSelection, DragStep, GeometryMap, GeometryProvider, PointerThrottle};
use crate::intent::Intent;
use crate::notices::NoticeSink;
use crate::persistence::PersistenceService;
use crate::reducer::{reduce, EditorState};
use crate::selectors;
use crate::transactions::TransactionIds;
use folio_blocks::{BlockId, BlockTypeRegistry, ContentCodec};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// State listener. Called once per reduced intent.
pub type Listener = Box<dyn FnMut(&EditorState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct Editor {
    config: EditorConfig,
    state: EditorState,

    registry: Arc<dyn BlockTypeRegistry>,
    codec: Arc<dyn ContentCodec>,
    persistence: Arc<dyn PersistenceService>,
    notice_sink: Option<Arc<dyn NoticeSink>>,

    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,

    ids: TransactionIds,
    in_flight: JoinSet<Vec<Intent>>,

    autosave: AutosaveTimer,
    throttle: PointerThrottle,
    drag: Option<DragSelection>,
}

impl Editor {
    pub fn new(
        config: EditorConfig,
        registry: Arc<dyn BlockTypeRegistry>,
        codec: Arc<dyn ContentCodec>,
        persistence: Arc<dyn PersistenceService>,
    ) -> Self {
        Self {
            state: EditorState::new(&config),
            autosave: AutosaveTimer::new(config.autosave_interval),
            throttle: PointerThrottle::new(config.pointer_throttle),
            config,
            registry,
            codec,
            persistence,
            notice_sink: None,
            listeners: Vec::new(),
            next_subscription: 0,
            ids: TransactionIds::default(),
            in_flight: JoinSet::new(),
            drag: None,
        }
    }

    pub fn with_notice_sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notice_sink = Some(sink);
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn ContentCodec {
        self.codec.as_ref()
    }

    pub fn registry(&self) -> &dyn BlockTypeRegistry {
        self.registry.as_ref()
    }

    /// Number of persistence calls still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Reduce `intent` and everything it triggers synchronously.
    ///
    /// Asynchronous effects are spawned and must be driven with
    /// [`Editor::settle`]. Returns the first error that should be surfaced;
    /// the rest of the queue is still processed.
    pub fn dispatch(&mut self, intent: Intent) -> Result<(), EditorError> {
        let present_before = self.state.content.present().clone();
        let mut queue = VecDeque::from([intent]);
        let mut surfaced = None;

        while let Some(intent) = queue.pop_front() {
            match self.process(&intent) {
                Ok(follow_ups) => queue.extend(follow_ups),
                Err(error) => {
                    if self.surfaces(&intent, &error) && surfaced.is_none() {
                        surfaced = Some(error);
                    }
                }
            }
        }

        let changed = *self.state.content.present() != present_before;
        self.sync_autosave(changed);
        surfaced.map_or(Ok(()), Err)
    }

    fn process(&mut self, intent: &Intent) -> Result<Vec<Intent>, EditorError> {
        reduce(&mut self.state, intent, &self.config)?;

        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.state);
        }
        self.forward_notice(intent);

        let plan = Planner {
            config: &self.config,
            registry: self.registry.as_ref(),
            codec: self.codec.as_ref(),
            ids: &mut self.ids,
        }
        .plan(&self.state, intent)?;

        if let Some(task) = plan.task {
            self.spawn(task)?;
        }
        Ok(plan.follow_ups)
    }

    fn spawn(&mut self, task: Effect) -> Result<(), EditorError> {
        Handle::try_current().map_err(|_| EditorError::NoRuntime)?;
        let persistence = Arc::clone(&self.persistence);
        let codec = Arc::clone(&self.codec);
        self.in_flight.spawn(perform(persistence, codec, task));
        Ok(())
    }

    /// Log a rejected intent and decide whether the caller sees it
    fn surfaces(&self, intent: &Intent, error: &EditorError) -> bool {
        match error {
            EditorError::State(state_error) => {
                if !self.config.strict {
                    warn!(intent = intent.name(), error = %state_error, "ignoring invalid intent");
                }
                self.config.strict
            }
            EditorError::Transaction(TransactionError::Unknown(txn)) => {
                debug!(intent = intent.name(), txn = %txn, "ignoring stale transaction outcome");
                false
            }
            other => {
                warn!(intent = intent.name(), error = %other, "intent rejected");
                true
            }
        }
    }

    fn forward_notice(&self, intent: &Intent) {
        let Some(sink) = &self.notice_sink else {
            return;
        };
        match intent {
            Intent::CreateNotice { notice } => sink.notify(notice),
            Intent::RemoveNotice { id } => sink.dismiss(id),
            _ => {}
        }
    }

    /// Wait for every in-flight effect, dispatching outcomes as they land.
    ///
    /// Effects spawned by those outcomes are awaited too.
    pub async fn settle(&mut self) -> Result<(), EditorError> {
        let mut surfaced = None;
        while let Some(result) = self.process_next_effect().await {
            if let Err(error) = result {
                surfaced.get_or_insert(error);
            }
        }
        surfaced.map_or(Ok(()), Err)
    }

    /// Wait for the next effect to finish and dispatch its outcome.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn process_next_effect(&mut self) -> Option<Result<(), EditorError>> {
        let joined = self.in_flight.join_next().await?;
        let intents = match joined {
            Ok(intents) => intents,
            Err(join_error) => {
                error!(%join_error, "persistence task did not complete");
                return Some(Ok(()));
            }
        };

        let mut surfaced = None;
        for intent in intents {
            if let Err(error) = self.dispatch(intent) {
                surfaced.get_or_insert(error);
            }
        }
        Some(surfaced.map_or(Ok(()), Err))
    }

    // ---- Autosave -----------------------------------------------------------

    fn sync_autosave(&mut self, changed: bool) {
        let should_save = selectors::is_edited_post_saveable(&self.state)
            && (selectors::is_edited_post_new(&self.state)
                || selectors::is_edited_post_dirty(&self.state))
            && !selectors::is_current_post_published(&self.state);
        self.autosave.sync(should_save, changed, Instant::now());
    }

    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    /// Dispatch an autosave if the debounce deadline has passed
    pub fn tick_autosave(&mut self) -> Result<bool, EditorError> {
        if !self.autosave.take_due(Instant::now()) {
            return Ok(false);
        }
        self.dispatch(Intent::Autosave)?;
        Ok(true)
    }

    /// Sleep until the autosave deadline, then autosave.
    ///
    /// Returns `Ok(false)` immediately when no autosave is scheduled.
    pub async fn run_autosave(&mut self) -> Result<bool, EditorError> {
        let Some(deadline) = self.autosave.deadline() else {
            return Ok(false);
        };
        tokio::time::sleep_until(deadline).await;
        self.tick_autosave()
    }

    /// Stop timers and drop in-flight work. Late responses are discarded.
    pub fn teardown(&mut self) {
        self.autosave.clear();
        self.throttle.reset();
        self.drag = None;
        self.in_flight.abort_all();
        self.in_flight.detach_all();
    }

    // ---- Pointer selection --------------------------------------------------

    /// Begin a drag selection at `anchor`, measuring its siblings once
    pub fn start_pointer_selection(
        &mut self,
        anchor: BlockId,
        provider: &dyn GeometryProvider,
    ) -> Result<(), EditorError> {
        let tree = self.state.tree();
        let parent = tree
            .parent_of(&anchor)
            .ok_or_else(|| StateError::UnknownBlock(anchor.clone()))?;
        let siblings = tree.order(&parent);
        let measured = provider
            .measure(&anchor, siblings)
            .into_iter()
            .filter(|(id, _)| siblings.contains(id));

        let geometry = GeometryMap::from_measurements(measured);
        debug!(anchor = %anchor, measured = geometry.len(), "pointer selection started");
        self.drag = Some(DragSelection::new(anchor, geometry));
        self.throttle.reset();
        Ok(())
    }

    /// Feed a pointer position, offset relative to the anchor's container.
    /// Samples inside the throttle interval are held back.
    pub fn pointer_moved(&mut self, y: f32) -> Result<(), EditorError> {
        if self.drag.is_none() {
            return Ok(());
        }
        match self.throttle.offer(y, Instant::now()) {
            Some(y) => self.resolve_pointer(y),
            None => Ok(()),
        }
    }

    /// Resolve a held-back sample once the interval has elapsed
    pub fn flush_pointer(&mut self) -> Result<(), EditorError> {
        match self.throttle.flush(Instant::now()) {
            Some(y) => self.resolve_pointer(y),
            None => Ok(()),
        }
    }

    pub fn pointer_released(&mut self) -> Result<(), EditorError> {
        let drag = self.drag.take();
        self.throttle.reset();
        if drag.is_some() && self.state.selection.is_multi_selecting {
            self.dispatch(Intent::StopMultiSelect)?;
        }
        Ok(())
    }

    fn resolve_pointer(&mut self, y: f32) -> Result<(), EditorError> {
        let Some(drag) = self.drag.as_mut() else {
            return Ok(());
        };
        let step = drag.step(y, &self.state.selection);

        if !self.state.selection.is_multi_selecting {
            self.dispatch(Intent::StartMultiSelect)?;
        }
        match step {
            Some(DragStep::Collapse(id)) => self.dispatch(Intent::SelectBlock {
                id,
                initial_caret: None,
            }),
            Some(DragStep::Extend { start, end }) => {
                self.dispatch(Intent::MultiSelect { start, end })
            }
            None => Ok(()),
        }
    }

    // ---- Clipboard ------------------------------------------------------------

    /// Copy the selected blocks. Does nothing when there is no block
    /// selection or the host has a native text selection.
    pub fn copy(&mut self, clipboard: &mut dyn Clipboard, has_native_selection: bool) -> bool {
        self.write_clipboard(ClipboardEvent::Copy, clipboard, has_native_selection)
            .is_some()
    }

    /// Copy the selected blocks, then remove them
    pub fn cut(
        &mut self,
        clipboard: &mut dyn Clipboard,
        has_native_selection: bool,
    ) -> Result<bool, EditorError> {
        let Some(ids) = self.write_clipboard(ClipboardEvent::Cut, clipboard, has_native_selection)
        else {
            return Ok(false);
        };
        self.dispatch(Intent::RemoveBlocks {
            ids,
            select_previous: false,
        })?;
        Ok(true)
    }

    fn write_clipboard(
        &self,
        event: ClipboardEvent,
        clipboard: &mut dyn Clipboard,
        has_native_selection: bool,
    ) -> Option<Vec<BlockId>> {
        if has_native_selection {
            return None;
        }
        let ids = match selectors::get_selected_block_id(&self.state) {
            Some(id) => vec![id.clone()],
            None => selectors::get_multi_selected_ids(&self.state),
        };
        if ids.is_empty() {
            return None;
        }

        let nodes: Vec<_> = ids.iter().filter_map(|id| self.state.tree().node(id)).collect();
        clipboard.write(event, ClipboardPayload::from_blocks(self.codec.as_ref(), &nodes));
        Some(ids)
    }
}
