use serde::{Deserialize, Serialize};

use super::TaskStatus;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for inspecting the tasks of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub limit: usize,
    pub offset: usize,
}

/// Result of a paginated task query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped() {
        let q = TaskQuery::new().with_limit(50_000);
        assert_eq!(q.limit, MAX_LIMIT);
    }

    #[test]
    fn default_matches_new() {
        let q = TaskQuery::default();
        assert_eq!(q.limit, DEFAULT_LIMIT);
        assert_eq!(q.offset, 0);
        assert!(q.status.is_none());
    }

    #[test]
    fn query_fields_are_optional_on_the_wire() {
        let q: TaskQuery = serde_json::from_str(r#"{"status":"failed","offset":20}"#).unwrap();
        assert_eq!(q.status, Some(TaskStatus::Failed));
        assert_eq!(q.offset, 20);
        assert_eq!(q.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn page_serializes_items_and_total() {
        let page = TaskPage {
            items: vec![1u64, 2],
            total: 7,
        };
        let json = serde_json::to_string(&page).unwrap();
        assert_eq!(json, r#"{"items":[1,2],"total":7}"#);
    }
}
