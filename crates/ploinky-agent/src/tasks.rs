//! The persistent async Task Queue (component K): FIFO dispatch under a
//! `maxConcurrent` cap, per-task timeout-with-kill, and a disk snapshot that
//! survives an agent restart. Task shape and state machine follow the
//! in-memory task tracker pattern; persistence and crash recovery are new
//! here since nothing comparable existed in-memory-only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::executor::{self, CommandSpec};

/// Fixed reason recorded for any task still `pending`/`running` when the
/// snapshot is loaded back after a restart.
pub const INTERRUPTED_REASON: &str = "Task interrupted before completion (agent restart)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Generate a task id: 16 random hex characters, drawn from a UUID v4's
/// hex digits so no extra randomness source is needed.
fn generate_task_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// Inject `taskId` into the payload the executor hands to the tool's
/// subprocess, so the tool can report back against its own task. Promotes
/// a non-object payload to `{"taskId": ..., "value": <original>}` rather
/// than discarding it.
fn inject_task_id(payload: Value, task_id: &str) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert("taskId".to_string(), Value::String(task_id.to_string()));
            Value::Object(map)
        }
        Value::Null => serde_json::json!({ "taskId": task_id }),
        other => serde_json::json!({ "taskId": task_id, "value": other }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub tool: String,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// The MCP-shaped `{content, metadata}` result of a completed task,
    /// delivered to callers via `/getTaskStatus`. Cleared before every
    /// disk write in [`TaskQueue::persist`] — results can be large and are
    /// meaningless once a task is re-run after a crash, so only the live,
    /// in-memory copy ever carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl Task {
    #[must_use]
    fn new(tool: impl Into<String>) -> Self {
        Self {
            id: generate_task_id(),
            tool: tool.into(),
            state: TaskState::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }
}

/// The subset of [`Task`] persisted to disk. `result` never round-trips:
/// [`TaskQueue::persist`] clears it on every entry before writing, even
/// though the live in-memory copy keeps it for `/getTaskStatus`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Snapshot {
    tasks: Vec<Task>,
}

/// FIFO dispatch order is preserved by tokio's fair semaphore: each
/// `enqueue` spawns its runner and requests a permit immediately, so
/// permits are granted in request order regardless of how long earlier
/// tasks take to finish.
pub struct TaskQueue {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    permits: Arc<Semaphore>,
    snapshot_path: PathBuf,
}

impl TaskQueue {
    /// Load any existing snapshot, mark interrupted tasks as failed, persist
    /// that correction immediately, then return a queue ready to accept new
    /// work.
    pub async fn load(snapshot_path: PathBuf, max_concurrent: usize) -> std::io::Result<Self> {
        let mut tasks = HashMap::new();
        if snapshot_path.is_file() {
            let text = tokio::fs::read_to_string(&snapshot_path).await?;
            match serde_json::from_str::<Snapshot>(&text) {
                Ok(mut snapshot) => {
                    for task in &mut snapshot.tasks {
                        if !task.state.is_terminal() {
                            warn!(task_id = %task.id, "recovering interrupted task as failed");
                            task.state = TaskState::Failed;
                            task.error = Some(INTERRUPTED_REASON.to_string());
                            task.finished_at = Some(Utc::now());
                        }
                    }
                    for task in snapshot.tasks {
                        tasks.insert(task.id.clone(), task);
                    }
                }
                Err(e) => warn!(error = %e, "ignoring unreadable task snapshot"),
            }
        }

        let queue = Self {
            tasks: Arc::new(RwLock::new(tasks)),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            snapshot_path,
        };
        queue.persist().await?;
        Ok(queue)
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Enqueue a tool invocation and dispatch it in the background. Returns
    /// the new task's id immediately; the caller does not wait for
    /// completion.
    pub async fn enqueue(
        self: &Arc<Self>,
        tool: String,
        spec: CommandSpec,
        input: Value,
        metadata: Value,
    ) -> String {
        let task = Task::new(tool.clone());
        let id = task.id.clone();
        self.tasks.write().await.insert(id.clone(), task);
        self.persist().await.ok();

        let metadata = inject_task_id(metadata, &id);

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.run_one(id, tool, spec, input, metadata).await;
        });

        id
    }

    async fn run_one(self: Arc<Self>, id: String, tool: String, spec: CommandSpec, input: Value, metadata: Value) {
        let permit = self.permits.clone().acquire_owned().await;
        let Ok(permit) = permit else { return };

        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(&id) {
                task.state = TaskState::Running;
                task.started_at = Some(Utc::now());
            }
        }
        self.persist().await.ok();

        let outcome = executor::run(&tool, &spec, &input, &metadata).await;
        let timed_out = outcome.signal_killed;
        let result = executor::shape_result(&outcome);

        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(&id) {
                task.finished_at = Some(Utc::now());
                if timed_out {
                    task.state = TaskState::Failed;
                    task.error = Some(format!("Task timed out after {}ms", spec.timeout_ms));
                } else if result.is_error {
                    task.state = TaskState::Failed;
                    task.error = result.content.first().map(|c| match c {
                        ploinky_mcp_proto::Content::Text { text } => text.clone(),
                    });
                } else {
                    task.state = TaskState::Completed;
                    task.result = Some(serde_json::to_value(&result).unwrap_or(Value::Null));
                }
            }
        }
        self.persist().await.ok();

        drop(permit);
        info!(task_id = %id, "task finished");
    }

    /// Write the current task set to disk via the workspace's atomic
    /// write-then-rename pattern, clearing `result` on every entry first.
    async fn persist(&self) -> std::io::Result<()> {
        let tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .cloned()
            .map(|mut task| {
                task.result = None;
                task
            })
            .collect();
        let snapshot = Snapshot { tasks };
        let json = serde_json::to_string_pretty(&snapshot).unwrap_or_default();
        if let Some(parent) = self.snapshot_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = tmp_path(&self.snapshot_path);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.snapshot_path).await?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::time::Duration;

    fn spec(command: &str) -> CommandSpec {
        CommandSpec { command: command.to_string(), cwd: PathBuf::from("."), env: StdHashMap::new(), timeout_ms: 5000 }
    }

    #[tokio::test]
    async fn enqueue_runs_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(TaskQueue::load(dir.path().join("tasks.json"), 2).await.unwrap());

        let id = queue.enqueue("echo".into(), spec("echo hi"), Value::Null, Value::Null).await;
        for _ in 0..50 {
            if queue.get(&id).await.unwrap().state.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let task = queue.get(&id).await.unwrap();
        assert_eq!(task.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn restart_marks_pending_tasks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");

        let stale = Snapshot {
            tasks: vec![Task::new("stuck")],
        };
        tokio::fs::write(&path, serde_json::to_string(&stale).unwrap()).await.unwrap();

        let queue = TaskQueue::load(path, 1).await.unwrap();
        let tasks = queue.tasks.read().await;
        let task = tasks.values().next().unwrap();
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.error.as_deref(), Some(INTERRUPTED_REASON));
    }

    #[tokio::test]
    async fn concurrency_cap_limits_simultaneous_runs() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(TaskQueue::load(dir.path().join("tasks.json"), 1).await.unwrap());

        let a = queue.enqueue("a".into(), spec("sleep 0.2"), Value::Null, Value::Null).await;
        let b = queue.enqueue("b".into(), spec("echo b"), Value::Null, Value::Null).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.get(&a).await.unwrap().state, TaskState::Running);
        assert_eq!(queue.get(&b).await.unwrap().state, TaskState::Pending);
    }
}
