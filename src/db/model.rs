use crate::model::TaskStatus;

/// Partial update merged into an existing task row. Fields left `None`
/// keep their stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub retry_count: Option<i32>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }
}
