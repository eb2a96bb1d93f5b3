//! View signatures and the snapshots they address.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::task::{MemberStub, ProjectStub, Task, TaskStatus};

/// Canonical multi-value filter key: a sorted, de-duplicated set of ids.
///
/// Two keys built from the same ids in any order compare equal, which is
/// what makes them usable inside a [`ViewSignature`].
///
/// # Examples
///
/// ```
/// use taskboard_sync::FilterKey;
///
/// let a = FilterKey::from_ids(["p2", "p1", "p2"]).unwrap();
/// let b = FilterKey::parse("p1,p2").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "p1,p2");
/// assert!(FilterKey::from_ids(Vec::<String>::new()).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterKey(Vec<String>);

impl FilterKey {
    /// Builds a key from ids, ignoring blanks. Returns `None` when no id
    /// remains, since an empty filter is the same as no filter.
    pub fn from_ids<I, S>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids
            .into_iter()
            .map(Into::into)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            None
        } else {
            Some(Self(ids))
        }
    }

    /// Parses the comma-joined wire form.
    pub fn parse(joined: &str) -> Option<Self> {
        Self::from_ids(joined.split(','))
    }

    /// Builds a status key.
    pub fn from_statuses(statuses: &[TaskStatus]) -> Option<Self> {
        Self::from_ids(statuses.iter().map(TaskStatus::as_str))
    }

    /// Returns `true` if `value` is one of the key's ids.
    pub fn contains(&self, value: &str) -> bool {
        self.0.binary_search_by(|id| id.as_str().cmp(value)).is_ok()
    }

    /// The ids, sorted.
    pub fn ids(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// The filter tuple that produced a task list. Equality of signatures is
/// the addressing scheme of the view store.
///
/// # Examples
///
/// ```
/// use taskboard_sync::{TaskStatus, ViewSignature};
///
/// let board = ViewSignature::workspace("w1")
///     .with_statuses(&[TaskStatus::Done, TaskStatus::Backlog])
///     .with_limit(20);
/// let same = ViewSignature::workspace("w1")
///     .with_statuses(&[TaskStatus::Backlog, TaskStatus::Done])
///     .with_limit(20);
/// assert_eq!(board, same);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSignature {
    /// Workspace partition (mandatory).
    pub workspace_id: String,
    /// Project filter.
    pub project_key: Option<FilterKey>,
    /// Status filter.
    pub status_key: Option<FilterKey>,
    /// Assignee filter.
    pub assignee_key: Option<FilterKey>,
    /// Case-insensitive name search, already trimmed.
    pub search: Option<String>,
    /// Exact due date filter.
    pub due_date: Option<String>,
    /// Page size.
    pub limit: Option<usize>,
}

impl ViewSignature {
    /// Unfiltered view of a workspace.
    pub fn workspace(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            ..Self::default()
        }
    }

    /// Restricts to the given projects.
    pub fn with_projects<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_key = FilterKey::from_ids(ids);
        self
    }

    /// Restricts to the given lanes.
    pub fn with_statuses(mut self, statuses: &[TaskStatus]) -> Self {
        self.status_key = FilterKey::from_statuses(statuses);
        self
    }

    /// Restricts to the given assignees.
    pub fn with_assignees<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignee_key = FilterKey::from_ids(ids);
        self
    }

    /// Restricts to names containing `search`. Blank text removes the
    /// clause.
    pub fn with_search(mut self, search: impl AsRef<str>) -> Self {
        let trimmed = search.as_ref().trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Restricts to an exact due date.
    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl fmt::Display for ViewSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn part<T: fmt::Display>(value: &Option<T>) -> String {
            value.as_ref().map_or_else(|| "*".to_string(), ToString::to_string)
        }
        write!(
            f,
            "{}/{}/{}/{}/{}/{}/{}",
            self.workspace_id,
            part(&self.project_key),
            part(&self.status_key),
            part(&self.assignee_key),
            part(&self.search),
            part(&self.due_date),
            part(&self.limit),
        )
    }
}

/// An ordered page of tasks with its server-side total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    /// Tasks in display order.
    pub documents: Vec<Task>,
    /// Total matches on the server; may exceed `documents.len()`.
    pub total: u64,
    /// Page size that produced this snapshot.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ViewSnapshot {
    /// A complete (unpaged) snapshot of `documents`.
    pub fn new(documents: Vec<Task>) -> Self {
        let total = documents.len() as u64;
        Self {
            documents,
            total,
            limit: None,
        }
    }

    /// Sets the total.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Index of the task with `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.documents.iter().position(|task| task.id == id)
    }

    /// Returns `true` if a task with `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        self.position_of(id).is_some()
    }

    /// Page size to honour: the signature's, else the snapshot's own.
    pub fn effective_limit(&self, signature: &ViewSignature) -> Option<usize> {
        signature.limit.or(self.limit)
    }

    /// Puts `task` first, trims the tail back to `limit`, and counts it in
    /// `total`.
    pub fn prepend(&mut self, task: Task, limit: Option<usize>) {
        self.documents.insert(0, task);
        if let Some(limit) = limit {
            self.documents.truncate(limit);
        }
        self.total += 1;
    }

    /// Removes the document at `index` and uncounts it.
    pub fn remove_at(&mut self, index: usize) -> Task {
        self.total = self.total.saturating_sub(1);
        self.documents.remove(index)
    }

    /// Removes the task with `id`, if present.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        self.position_of(id).map(|index| self.remove_at(index))
    }
}

/// A plain list of documents, as served for projects and members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentList<T> {
    /// Documents in server order.
    pub documents: Vec<T>,
    /// Total on the server.
    #[serde(default)]
    pub total: u64,
}

impl<T> DocumentList<T> {
    /// A complete list of `documents`.
    pub fn new(documents: Vec<T>) -> Self {
        let total = documents.len() as u64;
        Self { documents, total }
    }
}

impl<T> Default for DocumentList<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Project list cached for hydration.
pub type ProjectList = DocumentList<ProjectStub>;

/// Member list cached for hydration.
pub type MemberList = DocumentList<MemberStub>;
