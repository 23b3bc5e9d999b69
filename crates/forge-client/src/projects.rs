//! Shared project collection.
//!
//! [`ProjectBook`] is the one piece of mutable state shared between the
//! orchestrator and every running tracker. All writes are closures over the
//! previous list that locate projects by [`ProjectId`], never by index, so
//! interleaved updates from concurrent trackers compose in any order.
//!
//! A book opened with [`ProjectBook::persistent`] starts from the collection
//! saved in the store and writes the whole list back after every change.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use forge_core::{Project, ProjectId, TaskStatus};
use tracing::debug;

use crate::storage::{self, KeyValueStore};

/// Cheap-to-clone handle over a newest-first list of projects.
#[derive(Clone, Default)]
pub struct ProjectBook {
    inner: Arc<Mutex<Vec<Project>>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl fmt::Debug for ProjectBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectBook")
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl ProjectBook {
    /// In-memory book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Book backed by `store`, loaded from what was saved there.
    pub fn persistent(store: Arc<dyn KeyValueStore>) -> Self {
        let projects = storage::load_projects(store.as_ref());
        debug!(count = projects.len(), "Loaded saved projects");
        Self {
            inner: Arc::new(Mutex::new(projects)),
            store: Some(store),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Project>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the list with `f(previous)`.
    pub fn transform(&self, f: impl FnOnce(Vec<Project>) -> Vec<Project>) {
        let mut guard = self.lock();
        let previous = std::mem::take(&mut *guard);
        *guard = f(previous);
        // Saved under the lock so writes reach the store in list order.
        if let Some(store) = &self.store {
            storage::save_projects(store.as_ref(), &guard);
        }
    }

    /// Applies `f` to the project with `id` and returns the updated copy.
    pub fn update(&self, id: &ProjectId, f: impl FnOnce(&mut Project)) -> Option<Project> {
        let mut updated = None;
        self.transform(|projects| {
            let mut f = Some(f);
            projects
                .into_iter()
                .map(|mut project| {
                    if &project.id == id {
                        if let Some(f) = f.take() {
                            f(&mut project);
                        }
                        updated = Some(project.clone());
                    }
                    project
                })
                .collect()
        });
        updated
    }

    /// Records a status observed for project `id`.
    pub fn apply_status(&self, id: &ProjectId, status: TaskStatus) -> Option<Project> {
        self.update(id, |project| project.apply_status(status))
    }

    /// Inserts `project` at the front, replacing any project with the same id.
    pub fn upsert(&self, project: Project) {
        self.transform(|projects| {
            let mut next = Vec::with_capacity(projects.len() + 1);
            let id = project.id.clone();
            next.push(project);
            next.extend(projects.into_iter().filter(|p| p.id != id));
            next
        });
    }

    /// Merges a backend listing into the collection.
    ///
    /// A listed project replaces the local copy with the same id or the same
    /// backend task id. The local id is kept so running trackers still find
    /// the row. Local-only projects are kept. The result is ordered newest
    /// first.
    pub fn merge(&self, listed: Vec<Project>) {
        self.transform(|mut local| {
            let mut merged = Vec::with_capacity(local.len() + listed.len());
            for mut remote in listed {
                if let Some(pos) = local.iter().position(|p| same_row(p, &remote)) {
                    let previous = local.remove(pos);
                    remote.id = previous.id;
                    remote.display_name = remote.display_name.or(previous.display_name);
                    remote.source_code = remote.source_code.or(previous.source_code);
                    remote.is_archived |= previous.is_archived;
                }
                merged.push(remote);
            }
            merged.extend(local);
            merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            merged
        });
    }

    pub fn archive_project(&self, id: &ProjectId) -> Option<Project> {
        self.update(id, |project| {
            project.is_archived = true;
            project.updated_at = Utc::now();
        })
    }

    /// Removes project `id`; returns it if present.
    pub fn delete_project(&self, id: &ProjectId) -> Option<Project> {
        let mut removed = None;
        self.transform(|projects| {
            projects
                .into_iter()
                .filter_map(|project| {
                    if &project.id == id {
                        removed = Some(project);
                        None
                    } else {
                        Some(project)
                    }
                })
                .collect()
        });
        removed
    }

    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        self.lock().iter().find(|p| &p.id == id).cloned()
    }

    /// Copy of the whole list, newest first.
    pub fn snapshot(&self) -> Vec<Project> {
        self.lock().clone()
    }

    /// Projects that claim to be in flight but have not moved within `threshold`.
    pub fn stale_projects(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<Project> {
        self.lock()
            .iter()
            .filter(|p| !p.is_archived && p.is_stale(now, threshold))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// True if `local` and `listed` describe the same project.
fn same_row(local: &Project, listed: &Project) -> bool {
    local.id == listed.id
        || (local.backend_task_id.is_some() && local.backend_task_id == listed.backend_task_id)
}
