use crate::{
    tasks::{Task, TaskId},
    AppState,
};

pub fn get_tasks(state: &AppState) -> Vec<Task> {
    state.tasks.tasks()
}

pub fn create_task(state: &AppState, name: &str) -> Result<Task, String> {
    state.tasks.add_task(name).map_err(|e| e.to_string())
}

pub fn toggle_task(state: &AppState, task_id: TaskId) -> Result<Task, String> {
    state
        .tasks
        .toggle_completion(task_id)
        .ok_or_else(|| format!("No task with id {task_id}"))
}

pub fn rename_task(state: &AppState, task_id: TaskId, name: &str) -> Result<Task, String> {
    if name.trim().is_empty() {
        return Err("Task name cannot be empty".to_string());
    }
    state
        .tasks
        .rename(task_id, name)
        .ok_or_else(|| format!("No task with id {task_id}"))
}

pub fn delete_task(state: &AppState, task_id: TaskId) -> Result<Task, String> {
    state
        .tasks
        .delete_task(task_id)
        .ok_or_else(|| format!("No task with id {task_id}"))
}

pub fn clear_completed_tasks(state: &AppState) -> Vec<TaskId> {
    state.tasks.clear_completed()
}

pub fn increment_task_pomodoro(state: &AppState, task_id: TaskId) -> Result<Task, String> {
    state
        .tasks
        .increment_pomodoro(task_id)
        .ok_or_else(|| format!("No task with id {task_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_app;

    #[test]
    fn test_missing_ids_are_reported() {
        let (app, _, _) = test_app();
        assert!(toggle_task(&app, 1).is_err());
        assert!(delete_task(&app, 1).is_err());
        assert!(increment_task_pomodoro(&app, 1).is_err());
        assert!(rename_task(&app, 1, "x").is_err());
    }

    #[test]
    fn test_rename_blank_is_rejected_without_change() {
        let (app, _, _) = test_app();
        let task = create_task(&app, "Plan sprint").unwrap();
        assert!(rename_task(&app, task.id, "  ").is_err());
        assert_eq!(get_tasks(&app)[0].name, "Plan sprint");
    }
}
