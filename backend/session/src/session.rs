//! The page-session controller.
//!
//! Owns the uploaded document, the record editor and the insight board.
//! Observers get read-only snapshots over a `watch` channel and transient
//! notifications over a `broadcast` channel; state only changes through the
//! methods here.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use taxwise_core::{
    DeductionInput, DeductionSuggestions, ExtractedRecord, InsightKind, InsightState, Notification,
    RiskAssessment, RiskInput, SimplificationInput, SimplificationOutput, TaxwiseError,
    UploadedDocument,
};
use taxwise_logging::{redact_sensitive_data, InsightEvent, InsightEventLogger};
use taxwise_prompts::{ActionResult, InsightActions};

use crate::editor::{ExportFile, RecordEditor, SaveOutcome};
use crate::insights::{ApplyOutcome, InsightBoard, InsightOutcome};

const NOTIFICATION_BUFFER: usize = 64;

/// Everything an observer needs to draw the page.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub document: Option<UploadedDocument>,
    pub record: String,
    pub user_info: Option<String>,
    pub processing: bool,
    pub simplification: InsightState<SimplificationOutput>,
    pub deductions: InsightState<DeductionSuggestions>,
    pub risk: InsightState<RiskAssessment>,
}

struct SessionState {
    document: Option<UploadedDocument>,
    editor: RecordEditor,
    user_info: Option<String>,
    board: InsightBoard,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.board.generation(),
            document: self.document.clone(),
            record: self.editor.committed().as_str().to_string(),
            user_info: self.user_info.clone(),
            processing: self.board.is_processing(),
            simplification: self.board.simplification.clone(),
            deductions: self.board.deductions.clone(),
            risk: self.board.risk.clone(),
        }
    }
}

/// Inputs captured when a document arrives; later edits do not affect them.
struct Dispatch {
    generation: u64,
    photo_data_uri: String,
    record: String,
    user_info: Option<String>,
}

struct Inner {
    actions: Arc<dyn InsightActions>,
    state: Mutex<SessionState>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    notification_tx: broadcast::Sender<Notification>,
}

/// Controller for one single-document workflow.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(actions: Arc<dyn InsightActions>, record: ExtractedRecord) -> Self {
        let state = SessionState {
            document: None,
            editor: RecordEditor::new(record),
            user_info: None,
            board: InsightBoard::new(),
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        let (notification_tx, _) = broadcast::channel(NOTIFICATION_BUFFER);

        Self {
            inner: Arc::new(Inner {
                actions,
                state: Mutex::new(state),
                snapshot_tx,
                notification_tx,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.inner.snapshot_tx.send_replace(state.snapshot());
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine; notifications are transient.
        let _ = self.inner.notification_tx.send(notification);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    /// Watch the session; the receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.notification_tx.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.state().board.is_processing()
    }

    /// Wait until every insight of the current document has resolved.
    pub async fn wait_until_idle(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let result = rx.wait_for(|snapshot| !snapshot.processing).await;
        match result {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Replace the uploaded document and restart the insight cycle.
    ///
    /// All kinds go back to Idle first. A new document then moves every kind
    /// to Loading and fires the three gateway calls; `None` fires nothing.
    /// Returns the new generation.
    pub fn select_document(&self, document: Option<UploadedDocument>) -> u64 {
        let (generation, dispatch) = {
            let mut state = self.state();
            self.begin_selection(&mut state, document)
        };
        if let Some(dispatch) = dispatch {
            self.dispatch(dispatch);
        }
        generation
    }

    /// Like [`select_document`](Self::select_document), but refuses while
    /// insights are still being generated. The check and the selection happen
    /// under one lock, so of two racing callers at most one is accepted.
    pub fn try_select_document(&self, document: UploadedDocument) -> Option<u64> {
        let (generation, dispatch) = {
            let mut state = self.state();
            if state.board.is_processing() {
                return None;
            }
            self.begin_selection(&mut state, Some(document))
        };
        if let Some(dispatch) = dispatch {
            self.dispatch(dispatch);
        }
        Some(generation)
    }

    fn begin_selection(
        &self,
        state: &mut SessionState,
        document: Option<UploadedDocument>,
    ) -> (u64, Option<Dispatch>) {
        let generation = state.board.reset();
        state.document = document;
        self.publish(state);

        let selected = state.document.as_ref().map(|doc| {
            (
                doc.id,
                doc.data_uri.to_string(),
                doc.data_uri.mime_type().to_string(),
                doc.data_uri.decoded_len(),
            )
        });

        let Some((document_id, photo_data_uri, mime_type, bytes)) = selected else {
            info!(generation, "Document cleared");
            return (generation, None);
        };

        state.board.begin_loading();
        self.publish(state);
        info!(
            generation,
            document_id = %document_id,
            mime_type = %mime_type,
            bytes,
            "Document selected, dispatching insights"
        );
        let dispatch = Dispatch {
            generation,
            photo_data_uri,
            record: state.editor.committed().as_str().to_string(),
            user_info: state.user_info.clone(),
        };
        (generation, Some(dispatch))
    }

    fn dispatch(&self, dispatch: Dispatch) {
        let Dispatch {
            generation,
            photo_data_uri,
            record,
            user_info,
        } = dispatch;

        let actions = Arc::clone(&self.inner.actions);
        self.spawn_insight(generation, InsightKind::Simplification, InsightOutcome::Simplification, async move {
            actions
                .simplify_tax_form(SimplificationInput { photo_data_uri })
                .await
        });

        let actions = Arc::clone(&self.inner.actions);
        let extracted_data = record.clone();
        self.spawn_insight(generation, InsightKind::Deductions, InsightOutcome::Deductions, async move {
            actions
                .suggest_deductions(DeductionInput {
                    extracted_data,
                    user_info,
                })
                .await
        });

        let actions = Arc::clone(&self.inner.actions);
        self.spawn_insight(generation, InsightKind::Risk, InsightOutcome::Risk, async move {
            actions
                .assess_risk(RiskInput {
                    extracted_data: record,
                })
                .await
        });
    }

    fn spawn_insight<T, F>(
        &self,
        generation: u64,
        kind: InsightKind,
        wrap: fn(ActionResult<T>) -> InsightOutcome,
        call: F,
    ) where
        T: Send + 'static,
        F: Future<Output = ActionResult<T>> + Send + 'static,
    {
        InsightEventLogger::log_event(generation, kind, InsightEvent::Dispatched);
        let session = self.clone();
        tokio::spawn(async move {
            // A panicking call still has to settle its slot.
            let result = tokio::spawn(call).await.unwrap_or_else(|e| ActionResult::Error {
                error: format!("{kind} task failed: {e}"),
            });
            session.apply(generation, wrap(result));
        });
    }

    fn apply(&self, generation: u64, outcome: InsightOutcome) {
        let kind = outcome.kind();
        let error = outcome.error().map(str::to_string);

        let mut state = self.state();
        match state.board.apply(generation, outcome) {
            ApplyOutcome::Stale => {
                debug!(generation, kind = %kind, current = state.board.generation(), "Dropping stale insight");
                InsightEventLogger::log_event(generation, kind, InsightEvent::Discarded);
            }
            ApplyOutcome::Applied => {
                // Toasts go out before the snapshot that may clear `processing`.
                match error {
                    Some(message) => {
                        warn!(generation, kind = %kind, error = %redact_sensitive_data(&message), "Insight failed");
                        InsightEventLogger::log_event(
                            generation,
                            kind,
                            InsightEvent::Failed {
                                error_msg: message.clone(),
                            },
                        );
                        self.notify(Notification::error(kind.error_title(), message));
                    }
                    None => {
                        InsightEventLogger::log_event(generation, kind, InsightEvent::Succeeded);
                    }
                }

                self.publish(&state);
                if !state.board.is_processing() {
                    info!(generation, "All insights resolved");
                }
            }
        }
    }

    /// Commit `text` as the new record if it is valid JSON.
    ///
    /// Does not restart the insight cycle; the next document picks it up.
    pub fn save_record(&self, text: impl Into<String>) -> Result<SaveOutcome, TaxwiseError> {
        let mut state = self.state();
        state.editor.edit(text);
        let result = state.editor.save();
        match &result {
            Ok(SaveOutcome::Saved) => {
                self.publish(&state);
                drop(state);
                info!("Extracted record updated");
                self.notify(Notification::info(
                    "Data Updated",
                    "Mock extracted data has been updated.",
                ));
            }
            Ok(SaveOutcome::Unchanged) => {
                debug!("Record unchanged, nothing to save");
            }
            Err(e) => {
                drop(state);
                warn!(error = %e, "Rejected record edit");
                self.notify(Notification::error(
                    "Invalid JSON",
                    "The edited data is not valid JSON. Please correct it.",
                ));
            }
        }
        result
    }

    /// The user's uncommitted edit, if any.
    pub fn working_record(&self) -> String {
        self.state().editor.working().to_string()
    }

    /// Export the committed record.
    pub fn export_record(&self, file_name: Option<&str>) -> Result<ExportFile, TaxwiseError> {
        let result = self.state().editor.export(file_name);
        match &result {
            Ok(file) => info!(file_name = %file.file_name, bytes = file.bytes.len(), "Record exported"),
            Err(e) => {
                warn!(error = %e, "Export failed");
                self.notify(Notification::error(
                    "Export Error",
                    "Data is not valid JSON and cannot be exported.",
                ));
            }
        }
        result
    }

    /// Optional context (age, occupation, ...) for deduction suggestions.
    pub fn set_user_info(&self, user_info: Option<String>) {
        let mut state = self.state();
        state.user_info = user_info
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.publish(&state);
    }
}
