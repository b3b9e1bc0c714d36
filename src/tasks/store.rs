use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use log::{error, info, warn};

use crate::store::{read_string, KeyValueStore, SharedStore, KEY_TASKS};

use super::model::{decode_tasks, encode_tasks, next_task_id, Task, TaskId};

/// Ordered to-do list, written back to the store as a whole after every change.
pub struct TaskStore {
    store: SharedStore,
    tasks: RwLock<Vec<Task>>,
}

impl TaskStore {
    /// A missing or unreadable list starts empty.
    pub fn load(store: SharedStore) -> Self {
        let tasks = match read_string(store.as_ref(), KEY_TASKS) {
            Some(raw) => decode_tasks(&raw).unwrap_or_else(|err| {
                warn!("Discarding unreadable task list: {err:#}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        info!("Loaded {} tasks", tasks.len());

        Self {
            store,
            tasks: RwLock::new(tasks),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Task>> {
        self.tasks.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Task>> {
        self.tasks.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read().clone()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.read().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn add_task(&self, name: &str) -> Result<Task> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Task name cannot be empty");
        }

        let mut tasks = self.write();
        let task = Task::new(next_task_id(&tasks), name.to_string());
        tasks.push(task.clone());
        self.persist(&tasks);
        Ok(task)
    }

    /// Returns the updated task, or `None` when `id` is unknown.
    pub fn toggle_completion(&self, id: TaskId) -> Option<Task> {
        self.update(id, |task| task.completed = !task.completed)
    }

    /// Blank names are ignored.
    pub fn rename(&self, id: TaskId, new_name: &str) -> Option<Task> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return None;
        }
        self.update(id, |task| task.name = new_name.to_string())
    }

    pub fn increment_pomodoro(&self, id: TaskId) -> Option<Task> {
        self.update(id, |task| task.pomodoro_count = task.pomodoro_count.saturating_add(1))
    }

    /// Returns the removed task so the caller can drop a selection pointing at it.
    pub fn delete_task(&self, id: TaskId) -> Option<Task> {
        let mut tasks = self.write();
        let index = tasks.iter().position(|t| t.id == id)?;
        let removed = tasks.remove(index);
        self.persist(&tasks);
        Some(removed)
    }

    /// Returns the ids of every removed task.
    pub fn clear_completed(&self) -> Vec<TaskId> {
        let mut tasks = self.write();
        let removed: Vec<TaskId> = tasks.iter().filter(|t| t.completed).map(|t| t.id).collect();
        if !removed.is_empty() {
            tasks.retain(|t| !t.completed);
            self.persist(&tasks);
        }
        removed
    }

    fn update<F>(&self, id: TaskId, change: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.write();
        let task = tasks.iter_mut().find(|t| t.id == id)?;
        change(task);
        let updated = task.clone();
        self.persist(&tasks);
        Some(updated)
    }

    fn persist(&self, tasks: &[Task]) {
        match encode_tasks(tasks) {
            Ok(raw) => {
                if let Err(err) = self.store.set(KEY_TASKS, &raw) {
                    error!("Failed to persist task list: {err:#}");
                }
            }
            Err(err) => error!("{err:#}"),
        }
    }
}
