use std::collections::BTreeMap;

use batchkit_model::{TaskId, TaskInfo, TaskPage, TaskQuery, TaskStatus};

use crate::task::{TaskRecord, TaskSnapshot};

/// Task table of one run, ordered by id (and therefore by enqueue time).
pub(crate) struct TaskState<I, O> {
    tasks: BTreeMap<TaskId, TaskRecord<I, O>>,
}

impl<I, O> TaskState<I, O> {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, record: TaskRecord<I, O>) {
        self.tasks.insert(record.id, record);
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskRecord<I, O>> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord<I, O>> {
        self.tasks.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// List tasks in a given status, in enqueue order.
    pub fn list_by_status(&self, status: TaskStatus) -> Vec<TaskInfo> {
        self.tasks
            .values()
            .filter(|t| t.status == status)
            .map(TaskRecord::info)
            .collect()
    }

    /// Query tasks with an optional status filter and pagination.
    ///
    /// `total` reflects the count after filtering, before pagination.
    pub fn query(&self, q: &TaskQuery) -> TaskPage<TaskInfo> {
        let filtered: Vec<&TaskRecord<I, O>> = match q.status {
            Some(status) => self.tasks.values().filter(|t| t.status == status).collect(),
            None => self.tasks.values().collect(),
        };
        let total = filtered.len();

        let items = filtered
            .into_iter()
            .skip(q.offset)
            .take(q.limit)
            .map(TaskRecord::info)
            .collect();

        TaskPage { items, total }
    }

    /// Completed tasks in enqueue order.
    pub fn completed(&self) -> Vec<TaskSnapshot<I, O>> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(TaskRecord::snapshot)
            .collect()
    }

    /// Completed tasks in enqueue order; the whole table is released afterwards.
    pub fn take_completed(&mut self) -> Vec<TaskSnapshot<I, O>> {
        let out = self.completed();
        self.tasks.clear();
        out
    }
}
