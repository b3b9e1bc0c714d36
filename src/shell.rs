//! Line-oriented front end. Owns the task selection and turns completed
//! focus sessions into pomodoro counts for the selected task.

use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, bail};
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};

use crate::{
    tasks::{commands as task_commands, Task, TaskId},
    timer::{commands as timer_commands, SessionSwitch, SessionType, TimerSnapshot},
    AppState,
};

const HELP: &str = "\
Timer:  start | pause | reset | focus | short | long
        duration <focus|short|long> <minutes> | sound <alarm1|alarm2|bell|digital>
        status
Tasks:  add <name> | done <id> | rename <id> <name> | delete <id> | clear
        select <id|none> | tasks
Other:  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start,
    Pause,
    Reset,
    Select(SessionType),
    Duration(SessionType, String),
    Sound(String),
    Status,
    Tasks,
    Add(String),
    Toggle(TaskId),
    Rename(TaskId, String),
    Delete(TaskId),
    ClearCompleted,
    Pick(Option<TaskId>),
    Help,
    Quit,
}

fn parse_id(raw: &str) -> anyhow::Result<TaskId> {
    raw.trim()
        .parse::<TaskId>()
        .map_err(|_| anyhow!("'{}' is not a task id", raw.trim()))
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    }
}

impl FromStr for Intent {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (verb, rest) = split_word(line.trim());

        let intent = match verb.to_ascii_lowercase().as_str() {
            "start" => Intent::Start,
            "pause" => Intent::Pause,
            "reset" => Intent::Reset,
            "focus" => Intent::Select(SessionType::Focus),
            "short" => Intent::Select(SessionType::ShortBreak),
            "long" => Intent::Select(SessionType::LongBreak),
            "session" => Intent::Select(rest.parse()?),
            "duration" => {
                let (kind, minutes) = split_word(rest);
                if minutes.is_empty() {
                    bail!("usage: duration <focus|short|long> <minutes>");
                }
                Intent::Duration(kind.parse()?, minutes.to_string())
            }
            "sound" => {
                if rest.is_empty() {
                    bail!("usage: sound <alarm1|alarm2|bell|digital>");
                }
                Intent::Sound(rest.to_string())
            }
            "" | "status" => Intent::Status,
            "tasks" | "list" | "ls" => Intent::Tasks,
            "add" => Intent::Add(rest.to_string()),
            "done" | "toggle" => Intent::Toggle(parse_id(rest)?),
            "rename" => {
                let (id, name) = split_word(rest);
                Intent::Rename(parse_id(id)?, name.to_string())
            }
            "delete" | "rm" => Intent::Delete(parse_id(rest)?),
            "clear" => Intent::ClearCompleted,
            "select" | "pick" => match rest {
                "" | "none" => Intent::Pick(None),
                id => Intent::Pick(Some(parse_id(id)?)),
            },
            "help" | "?" => Intent::Help,
            "quit" | "exit" | "q" => Intent::Quit,
            other => bail!("unknown command '{other}' (try `help`)"),
        };

        Ok(intent)
    }
}

pub fn render_snapshot(snapshot: &TimerSnapshot) -> String {
    let state = &snapshot.state;
    format!(
        "{} {} [{}] | cycle {} | sound {}",
        state.session_type,
        snapshot.clock,
        if state.is_running { "running" } else { "paused" },
        state.cycle_count,
        state.sound
    )
}

pub fn render_tasks(tasks: &[Task], selected: Option<TaskId>) -> String {
    if tasks.is_empty() {
        return "No tasks added yet.".to_string();
    }

    tasks
        .iter()
        .map(|task| {
            format!(
                "{} [{}] {}  {}  ({} Pomodoros)",
                if selected == Some(task.id) { ">" } else { " " },
                if task.completed { "x" } else { " " },
                task.id,
                task.name,
                task.pomodoro_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Shell {
    app: Arc<AppState>,
    selected: Option<TaskId>,
}

impl Shell {
    pub fn new(app: Arc<AppState>) -> Self {
        Self {
            app,
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<TaskId> {
        self.selected
    }

    pub async fn handle(&mut self, intent: Intent) -> Result<String, String> {
        let app = self.app.as_ref();

        match intent {
            Intent::Start => timer_commands::start_timer(app).await.map(|s| render_snapshot(&s)),
            Intent::Pause => timer_commands::pause_timer(app).await.map(|s| render_snapshot(&s)),
            Intent::Reset => timer_commands::reset_timer(app).await.map(|s| render_snapshot(&s)),
            Intent::Select(session_type) => timer_commands::select_session(app, session_type)
                .await
                .map(|s| render_snapshot(&s)),
            Intent::Duration(session_type, minutes) => {
                timer_commands::set_duration(app, session_type, &minutes)
                    .await
                    .map(|s| render_snapshot(&s))
            }
            Intent::Sound(sound) => timer_commands::set_sound(app, &sound)
                .await
                .map(|s| render_snapshot(&s)),
            Intent::Status => timer_commands::get_timer_state(app)
                .await
                .map(|s| render_snapshot(&s)),
            Intent::Tasks => Ok(render_tasks(&task_commands::get_tasks(app), self.selected)),
            Intent::Add(name) => task_commands::create_task(app, &name)
                .map(|task| format!("Added \"{}\" ({})", task.name, task.id)),
            Intent::Toggle(id) => task_commands::toggle_task(app, id).map(|task| {
                let status = if task.completed { "done" } else { "open" };
                format!("\"{}\" is {}", task.name, status)
            }),
            Intent::Rename(id, name) => task_commands::rename_task(app, id, &name)
                .map(|task| format!("Renamed to \"{}\"", task.name)),
            Intent::Delete(id) => {
                let task = task_commands::delete_task(app, id)?;
                if self.selected == Some(task.id) {
                    self.selected = None;
                }
                Ok(format!("Deleted \"{}\"", task.name))
            }
            Intent::ClearCompleted => {
                let removed = task_commands::clear_completed_tasks(app);
                if self.selected.is_some_and(|id| removed.contains(&id)) {
                    self.selected = None;
                }
                Ok(format!("Cleared {} completed tasks", removed.len()))
            }
            Intent::Pick(None) => {
                self.selected = None;
                Ok("No task selected".to_string())
            }
            Intent::Pick(Some(id)) => {
                let task = app
                    .tasks
                    .get(id)
                    .ok_or_else(|| format!("No task with id {id}"))?;
                self.selected = Some(task.id);
                Ok(format!("Working on \"{}\"", task.name))
            }
            Intent::Help => Ok(HELP.to_string()),
            Intent::Quit => Ok("Bye".to_string()),
        }
    }

    /// Credits a finished focus session to the selected task.
    pub fn on_session_completed(&mut self, switch: &SessionSwitch) -> String {
        let mut message = format!(
            "{} finished. Up next: {} (type `start` when ready)",
            switch.completed, switch.next
        );

        if switch.completed == SessionType::Focus {
            if let Some(id) = self.selected {
                match task_commands::increment_task_pomodoro(&self.app, id) {
                    Ok(task) => message.push_str(&format!(
                        "\n\"{}\" now has {} Pomodoros",
                        task.name, task.pomodoro_count
                    )),
                    Err(e) => {
                        warn!("Dropping stale selection: {e}");
                        self.selected = None;
                    }
                }
            }
        }

        message
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut completions = self.app.timer.completions();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("{}", render_snapshot(&self.app.timer.get_snapshot().await));
        println!("Type `help` for commands.");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let intent = match line.parse::<Intent>() {
                        Ok(intent) => intent,
                        Err(e) => {
                            println!("{e}");
                            continue;
                        }
                    };
                    if intent == Intent::Quit {
                        break;
                    }
                    match self.handle(intent).await {
                        Ok(output) => println!("{output}"),
                        Err(e) => println!("error: {e}"),
                    }
                }
                switch = completions.recv() => match switch {
                    Ok(switch) => println!("{}", self.on_session_completed(&switch)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Shell missed {skipped} session completions");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        self.app.timer.pause().await;
        info!("pomotask shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timer_intents() {
        assert_eq!("start".parse::<Intent>().unwrap(), Intent::Start);
        assert_eq!("  PAUSE ".parse::<Intent>().unwrap(), Intent::Pause);
        assert_eq!(
            "long".parse::<Intent>().unwrap(),
            Intent::Select(SessionType::LongBreak)
        );
        assert_eq!(
            "session shortBreak".parse::<Intent>().unwrap(),
            Intent::Select(SessionType::ShortBreak)
        );
        assert_eq!(
            "duration focus 10".parse::<Intent>().unwrap(),
            Intent::Duration(SessionType::Focus, "10".into())
        );
        assert_eq!("".parse::<Intent>().unwrap(), Intent::Status);
        assert!("duration focus".parse::<Intent>().is_err());
        assert!("duration nap 5".parse::<Intent>().is_err());
        assert!("sound".parse::<Intent>().is_err());
        assert!("launch".parse::<Intent>().is_err());
    }

    #[test]
    fn test_parse_task_intents() {
        assert_eq!(
            "add   Write the report ".parse::<Intent>().unwrap(),
            Intent::Add("Write the report".into())
        );
        assert_eq!("done 17".parse::<Intent>().unwrap(), Intent::Toggle(17));
        assert_eq!(
            "rename 17 Ship it".parse::<Intent>().unwrap(),
            Intent::Rename(17, "Ship it".into())
        );
        assert_eq!("rm 3".parse::<Intent>().unwrap(), Intent::Delete(3));
        assert_eq!("select none".parse::<Intent>().unwrap(), Intent::Pick(None));
        assert_eq!("select 9".parse::<Intent>().unwrap(), Intent::Pick(Some(9)));
        assert!("done abc".parse::<Intent>().is_err());
        assert!("delete".parse::<Intent>().is_err());
    }

    #[test]
    fn test_render_tasks() {
        assert_eq!(render_tasks(&[], None), "No tasks added yet.");

        let mut done = Task::new(2, "Done thing".into());
        done.completed = true;
        done.pomodoro_count = 3;
        let tasks = vec![Task::new(1, "Open thing".into()), done];

        assert_eq!(
            render_tasks(&tasks, Some(2)),
            "  [ ] 1  Open thing  (0 Pomodoros)\n> [x] 2  Done thing  (3 Pomodoros)"
        );
    }
}
