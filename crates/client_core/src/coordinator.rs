//! View state coordinator: the single writer of the roster's observable state.
//!
//! Front ends read immutable [`ViewState`] snapshots and subscribe to
//! changes through a `watch` channel. Every mutation goes through the
//! coordinator; store and image I/O are awaited between state updates.

use std::{collections::BTreeSet, path::PathBuf, str::FromStr, sync::Arc};

use shared::domain::{sort_by_name, RecordId, UserEntry, UserRecord, ValidationError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{images::ImageStore, store::RecordStore};

/// Progress reported once a staged image has been written locally.
pub const PROGRESS_IMAGE_WRITTEN: f32 = 0.5;
pub const PROGRESS_COMPLETE: f32 = 1.0;

/// How the backing list is refreshed after a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Re-read the whole collection from the store.
    #[default]
    Refetch,
    /// Insert the saved record locally and re-sort.
    Append,
}

impl FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "refetch" => Ok(Self::Refetch),
            "append" => Ok(Self::Append),
            other => Err(format!("unknown refresh policy {other:?}; expected refetch or append")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub name: String,
    pub age_text: String,
    /// Backing list, sorted by case-insensitive name.
    pub users: Vec<UserRecord>,
    pub search_text: String,
    pub staged_image: Option<Vec<u8>>,
    pub edit_target: Option<UserRecord>,
    pub is_saving: bool,
    /// Fraction of the current save's steps that have completed.
    pub progress: f32,
}

impl ViewState {
    /// Records whose name contains the search text, ignoring case. Empty
    /// search text yields the full backing list.
    pub fn filtered_users(&self) -> Vec<&UserRecord> {
        self.users
            .iter()
            .filter(|user| user.name_matches(&self.search_text))
            .collect()
    }

    /// Maps a position in [`Self::filtered_users`] to the position of the
    /// same record (by id) in the backing list.
    pub fn index_in_users(&self, filtered_index: usize) -> Option<usize> {
        let filtered = self.filtered_users();
        let id = &filtered.get(filtered_index)?.id;
        self.users.iter().position(|user| &user.id == id)
    }

    pub fn find_user(&self, id: &RecordId) -> Option<&UserRecord> {
        self.users.iter().find(|user| &user.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(UserRecord),
    /// Input did not validate; nothing was written.
    Rejected(ValidationError),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("a save is already in progress")]
    SaveInProgress,
    #[error("no record is being edited")]
    NoEditTarget,
    #[error("failed to persist record {id}: {source}")]
    Store { id: RecordId, source: anyhow::Error },
}

pub struct ViewStateCoordinator {
    store: Arc<dyn RecordStore>,
    images: ImageStore,
    refresh_policy: RefreshPolicy,
    state: watch::Sender<ViewState>,
}

impl ViewStateCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, images: ImageStore) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            store,
            images,
            refresh_policy: RefreshPolicy::default(),
            state,
        }
    }

    pub fn with_refresh_policy(mut self, refresh_policy: RefreshPolicy) -> Self {
        self.refresh_policy = refresh_policy;
        self
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.state.send_modify(|state| state.name = name);
    }

    pub fn set_age_text(&self, age_text: impl Into<String>) {
        let age_text = age_text.into();
        self.state.send_modify(|state| state.age_text = age_text);
    }

    pub fn set_search_text(&self, search_text: impl Into<String>) {
        let search_text = search_text.into();
        self.state.send_modify(|state| state.search_text = search_text);
    }

    pub fn stage_image(&self, bytes: Vec<u8>) {
        self.state.send_modify(|state| state.staged_image = Some(bytes));
    }

    pub fn clear_staged_image(&self) {
        self.state.send_modify(|state| state.staged_image = None);
    }

    /// Validates the entry fields and persists them as a new record.
    ///
    /// Entry fields are only reset once the store acknowledged the write.
    /// On a failed write the freshly written image is removed again.
    pub async fn save(&self) -> Result<SaveOutcome, CoordinatorError> {
        let current = self.snapshot();
        let entry = match UserEntry::parse(&current.name, &current.age_text) {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "save rejected");
                return Ok(SaveOutcome::Rejected(err));
            }
        };

        self.begin_saving()?;

        let mut record = entry.into_record(RecordId::generate());
        let written_image = self
            .write_staged_image(&record.id, current.staged_image.as_deref())
            .await;
        record.image_path = written_image.clone();

        if let Err(source) = self.store.create(&record).await {
            warn!(id = %record.id, error = %source, "record write failed");
            if let Some(path) = written_image {
                discard_image(&path).await;
            }
            self.finish_saving(false);
            return Err(CoordinatorError::Store {
                id: record.id,
                source,
            });
        }

        info!(id = %record.id, has_image = record.image_path.is_some(), "record saved");
        self.state.send_modify(|state| {
            state.progress = PROGRESS_COMPLETE;
            state.name.clear();
            state.age_text.clear();
            state.staged_image = None;
            state.edit_target = None;
        });
        self.refresh_after_save(&record).await;
        self.finish_saving(true);
        Ok(SaveOutcome::Saved(record))
    }

    /// Loads a record into the entry fields and marks it as the edit target.
    /// Returns `false` when the id is not in the backing list or a save is
    /// still running.
    pub fn begin_edit(&self, id: &RecordId) -> bool {
        let snapshot = self.snapshot();
        if snapshot.is_saving {
            debug!(%id, "edit refused while saving");
            return false;
        }
        let Some(target) = snapshot.find_user(id).cloned() else {
            return false;
        };
        self.state.send_modify(|state| {
            state.name = target.name.clone();
            state.age_text = target.age.to_string();
            state.staged_image = None;
            state.edit_target = Some(target);
        });
        true
    }

    pub fn cancel_edit(&self) {
        self.state.send_modify(|state| {
            state.edit_target = None;
            state.name.clear();
            state.age_text.clear();
            state.staged_image = None;
        });
    }

    /// Writes the entry fields over the edit target, keeping its id. The
    /// existing image is kept unless a new one is staged. A staged image is
    /// written to a pending file and only moved over `<id>.jpg` once the
    /// store acknowledged the update, so a failed edit leaves the photo as
    /// it was.
    pub async fn save_edit(&self) -> Result<SaveOutcome, CoordinatorError> {
        let current = self.snapshot();
        let target = current
            .edit_target
            .clone()
            .ok_or(CoordinatorError::NoEditTarget)?;
        let entry = match UserEntry::parse(&current.name, &current.age_text) {
            Ok(entry) => entry,
            Err(err) => {
                debug!(id = %target.id, error = %err, "edit rejected");
                return Ok(SaveOutcome::Rejected(err));
            }
        };

        self.begin_saving()?;

        let mut record = entry.into_record(target.id.clone());
        let pending_image = self
            .write_pending_image(&record.id, current.staged_image.as_deref())
            .await;
        record.image_path = match pending_image {
            Some(_) => Some(self.images.path_for(&record.id)),
            None => target.image_path.clone(),
        };

        if let Err(source) = self.store.create(&record).await {
            warn!(id = %record.id, error = %source, "record update failed");
            if let Some(pending) = pending_image {
                discard_image(&pending).await;
            }
            self.finish_saving(false);
            return Err(CoordinatorError::Store {
                id: record.id,
                source,
            });
        }

        if pending_image.is_some() {
            match self.images.commit_pending(&record.id).await {
                Ok(path) => {
                    let previous = target.image_path.as_deref().filter(|old| *old != path);
                    if let Some(previous) = previous {
                        discard_image(previous).await;
                    }
                }
                Err(error) => warn!(id = %record.id, %error, "replacement image not applied"),
            }
        }

        info!(id = %record.id, "record updated");
        self.state.send_modify(|state| {
            state.progress = PROGRESS_COMPLETE;
            state.name.clear();
            state.age_text.clear();
            state.staged_image = None;
            state.edit_target = None;
        });
        self.refresh_after_save(&record).await;
        self.finish_saving(true);
        Ok(SaveOutcome::Saved(record))
    }

    /// Replaces the backing list with the store's contents. A failed fetch
    /// is logged and leaves the current list in place.
    pub async fn fetch_all(&self) {
        match self.store.fetch_all().await {
            Ok(users) => {
                debug!(count = users.len(), "fetched records");
                self.state.send_modify(|state| state.users = users);
            }
            Err(error) => warn!(%error, "failed to fetch records"),
        }
    }

    /// Deletes the records at the given backing-list positions, then
    /// re-fetches. Out-of-range positions are ignored.
    pub async fn delete_users(&self, indices: &[usize]) {
        let snapshot = self.snapshot();
        let positions: BTreeSet<usize> = indices.iter().copied().collect();
        let targets: Vec<UserRecord> = positions
            .into_iter()
            .filter_map(|index| snapshot.users.get(index).cloned())
            .collect();

        for user in &targets {
            self.remove_record(user).await;
        }

        self.fetch_all().await;
    }

    /// Deletes by positions in the filtered view.
    pub async fn delete_filtered(&self, filtered_indices: &[usize]) {
        let snapshot = self.snapshot();
        let indices: Vec<usize> = filtered_indices
            .iter()
            .filter_map(|&filtered_index| snapshot.index_in_users(filtered_index))
            .collect();
        self.delete_users(&indices).await;
    }

    pub async fn delete_by_id(&self, ids: &[RecordId]) {
        let snapshot = self.snapshot();
        let mut indices = Vec::with_capacity(ids.len());
        for id in ids {
            match snapshot.users.iter().position(|user| &user.id == id) {
                Some(index) => indices.push(index),
                None => debug!(%id, "delete requested for unknown record"),
            }
        }
        self.delete_users(&indices).await;
    }

    /// Image bytes for a record in the backing list.
    pub async fn load_image(&self, id: &RecordId) -> Option<Vec<u8>> {
        let record = self.snapshot().find_user(id).cloned()?;
        self.image_for(&record).await
    }

    pub async fn image_for(&self, record: &UserRecord) -> Option<Vec<u8>> {
        let path = record.image_path.as_deref()?;
        ImageStore::load(path).await
    }

    fn begin_saving(&self) -> Result<(), CoordinatorError> {
        let mut already_saving = false;
        self.state.send_modify(|state| {
            if state.is_saving {
                already_saving = true;
            } else {
                state.is_saving = true;
                state.progress = 0.0;
            }
        });
        if already_saving {
            return Err(CoordinatorError::SaveInProgress);
        }
        Ok(())
    }

    fn finish_saving(&self, succeeded: bool) {
        self.state.send_modify(|state| {
            state.is_saving = false;
            if !succeeded {
                state.progress = 0.0;
            }
        });
    }

    async fn write_staged_image(&self, id: &RecordId, staged: Option<&[u8]>) -> Option<PathBuf> {
        let bytes = staged?;
        match self.images.save(id, bytes).await {
            Ok(path) => {
                self.state
                    .send_modify(|state| state.progress = PROGRESS_IMAGE_WRITTEN);
                Some(path)
            }
            Err(error) => {
                warn!(%id, error = %error, "saving record without its image");
                None
            }
        }
    }

    async fn write_pending_image(
        &self,
        id: &RecordId,
        staged: Option<&[u8]>,
    ) -> Option<PathBuf> {
        let bytes = staged?;
        match self.images.save_pending(id, bytes).await {
            Ok(path) => {
                self.state
                    .send_modify(|state| state.progress = PROGRESS_IMAGE_WRITTEN);
                Some(path)
            }
            Err(error) => {
                warn!(%id, error = %error, "keeping previous image");
                None
            }
        }
    }

    async fn refresh_after_save(&self, record: &UserRecord) {
        match self.refresh_policy {
            RefreshPolicy::Refetch => self.fetch_all().await,
            RefreshPolicy::Append => {
                let record = record.clone();
                self.state.send_modify(|state| {
                    state.users.retain(|user| user.id != record.id);
                    state.users.push(record);
                    sort_by_name(&mut state.users);
                });
            }
        }
    }

    async fn remove_record(&self, user: &UserRecord) {
        if let Some(path) = &user.image_path {
            discard_image(path).await;
        }
        if let Err(error) = self.store.delete(&user.id).await {
            warn!(id = %user.id, %error, "failed to delete record");
        }
    }
}

async fn discard_image(path: &std::path::Path) {
    if let Err(error) = ImageStore::remove(path).await {
        debug!(path = %path.display(), %error, "image cleanup skipped");
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
