use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};

pub type TaskId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub completed: bool,
    /// Completed focus sessions attributed to this task
    #[serde(rename = "pomodoros")]
    pub pomodoro_count: u32,
}

impl Task {
    pub fn new(id: TaskId, name: String) -> Self {
        Self {
            id,
            name,
            completed: false,
            pomodoro_count: 0,
        }
    }
}

pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("failed to serialize task list")
}

/// Parses a stored task list. Later entries that reuse an earlier id are dropped.
pub fn decode_tasks(raw: &str) -> Result<Vec<Task>> {
    let tasks: Vec<Task> = serde_json::from_str(raw).context("failed to parse task list")?;

    let mut seen = HashSet::new();
    let total = tasks.len();
    let unique: Vec<Task> = tasks.into_iter().filter(|t| seen.insert(t.id)).collect();
    if unique.len() != total {
        warn!("Dropped {} tasks with duplicate ids", total - unique.len());
    }
    Ok(unique)
}

/// Creation timestamp in milliseconds, bumped past every existing id so two
/// tasks added within the same millisecond stay distinct. Once `u64::MAX` is
/// taken, the smallest unused id is handed out instead.
pub fn next_task_id(tasks: &[Task]) -> TaskId {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let Some(max) = tasks.iter().map(|t| t.id).max() else {
        return now;
    };

    match max.checked_add(1) {
        Some(after_existing) => now.max(after_existing),
        None => {
            let taken: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();
            (0..=TaskId::MAX)
                .find(|id| !taken.contains(id))
                .unwrap_or(TaskId::MAX)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Task> {
        vec![
            Task {
                id: 1_700_000_000_000,
                name: "Write report".into(),
                completed: false,
                pomodoro_count: 3,
            },
            Task {
                id: 1_700_000_000_001,
                name: "Émail \"Bob\" re: Q3 ✅".into(),
                completed: true,
                pomodoro_count: 0,
            },
        ]
    }

    #[test]
    fn test_round_trip() {
        let tasks = sample();
        let encoded = encode_tasks(&tasks).unwrap();
        assert_eq!(decode_tasks(&encoded).unwrap(), tasks);
        assert_eq!(decode_tasks(&encode_tasks(&[]).unwrap()).unwrap(), vec![]);
    }

    #[test]
    fn test_wire_format() {
        let encoded = encode_tasks(&sample()[..1]).unwrap();
        assert_eq!(
            encoded,
            r#"[{"id":1700000000000,"name":"Write report","completed":false,"pomodoros":3}]"#
        );
    }

    #[test]
    fn test_decode_rejects_garbage_and_drops_duplicates() {
        assert!(decode_tasks("not json").is_err());
        assert!(decode_tasks(r#"{"id":1}"#).is_err());

        let raw = r#"[
            {"id":5,"name":"a","completed":false,"pomodoros":0},
            {"id":5,"name":"b","completed":true,"pomodoros":1}
        ]"#;
        let tasks = decode_tasks(raw).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "a");
    }

    #[test]
    fn test_next_task_id_is_fresh() {
        let far_future = Task::new(u64::MAX - 1, "x".into());
        assert_eq!(next_task_id(&[far_future]), u64::MAX);

        let at_max = vec![Task::new(u64::MAX, "x".into()), Task::new(0, "y".into())];
        assert_eq!(next_task_id(&at_max), 1);

        let id = next_task_id(&[]);
        assert!(id > 1_600_000_000_000);
        assert!(next_task_id(&[Task::new(id, "y".into())]) > id);
    }
}
