use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::domain::interaction::{
    hover_indicator, layout_blocks, now_indicator, BlockLayout, Gesture, GestureController,
    Modifiers, TimelineGeometry,
};
use crate::domain::models::{
    parse_wall_clock, AppSettings, BlockTodo, BlockType, DaySchedule, Task, TaskStatus, TimeBlock,
};
use crate::domain::resolution::{propose, resolve, OverlapAction, OverlapProposal, Placement};
use crate::domain::sync::{self, Schedules, SyncOutcome};
use crate::domain::time_math::{minutes_to_pixels, parse_hhmm, time_slots};
use crate::infrastructure::config::read_default_settings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::records::{schedule_key, BoardRepository};
use crate::infrastructure::storage::{KeyValueStore, SqliteKeyValueStore};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

const DEFAULT_DROP_MINUTES: u32 = 30;
const DATE_FORMAT: &str = "%Y-%m-%d";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    repository: BoardRepository,
    clock: Clock,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store = Arc::new(SqliteKeyValueStore::new(&bootstrap.database_path));
        Self::open(bootstrap, store)
    }

    /// Opens the workspace at `workspace_root` but keeps the board records in
    /// `store`.
    pub fn with_store(
        workspace_root: PathBuf,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, InfraError> {
        Self::open(bootstrap_workspace(&workspace_root)?, store)
    }

    fn open(bootstrap: BootstrapResult, store: Arc<dyn KeyValueStore>) -> Result<Self, InfraError> {
        let repository = BoardRepository::new(store);
        let clock: Clock = Arc::new(|| Local::now().naive_local());

        let settings = match repository.load_settings()? {
            Some(settings) => match settings.validate() {
                Ok(()) => settings,
                Err(reason) => {
                    tracing::warn!(%reason, "stored settings rejected; using configured defaults");
                    read_default_settings(&bootstrap.config_dir)?
                }
            },
            None => read_default_settings(&bootstrap.config_dir)?,
        };
        let runtime = RuntimeState {
            tasks: repository.load_tasks()?,
            schedules: repository.load_all_schedules()?,
            settings,
            selected_date: clock().date(),
            gestures: GestureController::default(),
            pending: None,
        };

        Ok(Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            repository,
            clock,
            runtime: Mutex::new(runtime),
            log_guard: Mutex::new(()),
        })
    }

    /// Replaces the wall clock. The selected day follows the new clock.
    pub fn with_now_provider(
        mut self,
        clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        if let Ok(runtime) = self.runtime.get_mut() {
            runtime.selected_date = (self.clock)().date();
        }
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_warn(&self, command: &str, message: &str) {
        self.append_log("warn", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    /// Writes the collected records. Failures are reported and swallowed; the
    /// in-memory state stays authoritative.
    fn flush(&self, command: &str, writes: PendingWrites) {
        if let Some(tasks) = writes.tasks {
            self.report_storage(command, "tasks", self.repository.save_tasks(&tasks));
        }
        for schedule in writes.schedules {
            if schedule.blocks.is_empty()
                && !self.repository.has_schedule(&schedule.date).unwrap_or(true)
            {
                continue;
            }
            let result = self.repository.save_schedule(&schedule);
            self.report_storage(command, &schedule_key(&schedule.date), result);
        }
        if let Some(settings) = writes.settings {
            self.report_storage(command, "settings", self.repository.save_settings(&settings));
        }
    }

    fn report_storage(&self, command: &str, record: &str, result: Result<(), InfraError>) {
        if let Err(error) = result {
            tracing::warn!(command, record, %error, "failed to persist record");
            self.log_warn(command, &format!("failed to persist {record}: {error}"));
        }
    }
}

struct RuntimeState {
    tasks: Vec<Task>,
    schedules: Schedules,
    settings: AppSettings,
    selected_date: NaiveDate,
    gestures: GestureController,
    pending: Option<OverlapProposal>,
}

impl RuntimeState {
    fn date_key(&self) -> String {
        self.selected_date.format(DATE_FORMAT).to_string()
    }

    fn geometry(&self) -> TimelineGeometry {
        TimelineGeometry::from_settings(self.selected_date, &self.settings)
    }

    fn day_blocks(&self) -> &[TimeBlock] {
        self.schedules
            .get(&self.date_key())
            .map(|schedule| schedule.blocks.as_slice())
            .unwrap_or(&[])
    }

    fn schedule_mut(&mut self, date: &str) -> &mut DaySchedule {
        self.schedules
            .entry(date.to_string())
            .or_insert_with(|| DaySchedule {
                date: date.to_string(),
                blocks: Vec::new(),
            })
    }

    fn day_mut(&mut self) -> &mut DaySchedule {
        let key = self.date_key();
        self.schedule_mut(&key)
    }

    fn find_block(&self, block_id: &str) -> Result<&TimeBlock, InfraError> {
        self.day_blocks()
            .iter()
            .find(|block| block.id == block_id)
            .ok_or_else(|| InfraError::not_found("block", block_id))
    }

    fn find_task(&self, task_id: &str) -> Result<&Task, InfraError> {
        self.tasks
            .iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| InfraError::not_found("task", task_id))
    }
}

/// Snapshot of the records a command changed, written after the runtime lock is
/// released.
#[derive(Default)]
struct PendingWrites {
    tasks: Option<Vec<Task>>,
    schedules: Vec<DaySchedule>,
    settings: Option<AppSettings>,
}

impl PendingWrites {
    fn tasks(mut self, runtime: &RuntimeState) -> Self {
        self.tasks = Some(runtime.tasks.clone());
        self
    }

    fn day(mut self, runtime: &RuntimeState, date: &str) -> Self {
        if let Some(schedule) = runtime.schedules.get(date) {
            self.schedules.push(schedule.clone());
        }
        self
    }

    fn outcome(mut self, runtime: &RuntimeState, outcome: &SyncOutcome) -> Self {
        if outcome.tasks_changed {
            self = self.tasks(runtime);
        }
        for date in &outcome.touched_dates {
            self = self.day(runtime, date);
        }
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub duration: Option<u32>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDraft {
    pub title: String,
    /// ISO-8601 instant or `HH:MM` on the selected day.
    pub start_time: String,
    pub end_time: String,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatch {
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BlockPlacement {
    Inserted { block: TimeBlock },
    PendingOverlap { proposal: OverlapProposal },
}

#[derive(Debug, Clone, Serialize)]
pub struct KanbanColumn {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineView {
    pub date: String,
    pub day_start: u32,
    pub day_end: u32,
    pub snap_interval: u32,
    pub height: f64,
    pub hour_labels: Vec<String>,
    pub blocks: Vec<BlockLayout>,
    pub now_indicator: Option<f64>,
}

pub fn create_task_impl(
    state: &AppState,
    title: String,
    duration: Option<u32>,
    color: Option<String>,
    notes: Option<String>,
    due_date: Option<String>,
) -> Result<Task, InfraError> {
    logged(state, "create_task", || {
        let task = Task {
            id: next_id("tsk"),
            title: required_text(&title, "title")?,
            duration,
            status: TaskStatus::Todo,
            color: optional_text(color),
            notes: optional_text(notes),
            created_at: state.now(),
            completed_at: None,
            due_date: optional_date(due_date, "dueDate")?,
        };
        task.validate().map_err(InfraError::Validation)?;

        let writes = {
            let mut runtime = lock_runtime(state)?;
            runtime.tasks.push(task.clone());
            PendingWrites::default().tasks(&runtime)
        };
        state.flush("create_task", writes);
        state.log_info("create_task", &format!("created task_id={}", task.id));
        Ok(task)
    })
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    Ok(lock_runtime(state)?.tasks.clone())
}

pub fn kanban_columns_impl(state: &AppState) -> Result<Vec<KanbanColumn>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(TaskStatus::ALL
        .iter()
        .map(|status| KanbanColumn {
            status: *status,
            tasks: runtime
                .tasks
                .iter()
                .filter(|task| task.status == *status)
                .cloned()
                .collect(),
        })
        .collect())
}

/// Edits task details. Empty strings clear optional fields; status changes go
/// through [`move_task_impl`].
pub fn update_task_impl(
    state: &AppState,
    task_id: String,
    patch: TaskPatch,
) -> Result<Task, InfraError> {
    logged(state, "update_task", || {
        let task_id = required_text(&task_id, "task_id")?;
        let due_date = patch
            .due_date
            .as_deref()
            .map(|raw| optional_date(Some(raw.to_string()), "dueDate"))
            .transpose()?;

        let mut runtime = lock_runtime(state)?;
        let Some(task) = runtime.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Err(InfraError::not_found("task", &task_id));
        };

        let mut updated = task.clone();
        if let Some(title) = patch.title {
            updated.title = required_text(&title, "title")?;
        }
        if let Some(duration) = patch.duration {
            updated.duration = Some(duration);
        }
        if let Some(color) = patch.color {
            updated.color = optional_text(Some(color));
        }
        if let Some(notes) = patch.notes {
            updated.notes = optional_text(Some(notes));
        }
        if let Some(due_date) = due_date {
            updated.due_date = due_date;
        }
        updated.validate().map_err(InfraError::Validation)?;
        *task = updated.clone();

        let writes = PendingWrites::default().tasks(&runtime);
        drop(runtime);
        state.flush("update_task", writes);
        state.log_info("update_task", &format!("updated task_id={task_id}"));
        Ok(updated)
    })
}

/// Kanban drop: moves the task and mirrors the new status into every linked todo.
pub fn move_task_impl(state: &AppState, task_id: String, status: String) -> Result<Task, InfraError> {
    logged(state, "move_task", || {
        let task_id = required_text(&task_id, "task_id")?;
        let status = parse_task_status(&status)?;
        let now = state.now();

        let mut guard = lock_runtime(state)?;
        let runtime = &mut *guard;
        let outcome = sync::move_task(&mut runtime.tasks, &mut runtime.schedules, &task_id, status, now)?;
        let task = runtime.find_task(&task_id)?.clone();
        let writes = PendingWrites::default().outcome(runtime, &outcome);
        drop(guard);

        state.flush("move_task", writes);
        state.log_info(
            "move_task",
            &format!("moved task_id={task_id} status={}", status.as_str()),
        );
        Ok(task)
    })
}

/// Removes the task together with every block scheduled for it on any day.
pub fn delete_task_impl(state: &AppState, task_id: String) -> Result<(), InfraError> {
    logged(state, "delete_task", || {
        let task_id = required_text(&task_id, "task_id")?;

        let mut guard = lock_runtime(state)?;
        let runtime = &mut *guard;
        let outcome = sync::delete_task(&mut runtime.tasks, &mut runtime.schedules, &task_id)?;
        if runtime
            .pending
            .as_ref()
            .is_some_and(|proposal| proposal.block.task_id.as_deref() == Some(task_id.as_str()))
        {
            runtime.pending = None;
        }
        let writes = PendingWrites::default().outcome(runtime, &outcome);
        drop(guard);

        state.flush("delete_task", writes);
        state.log_info("delete_task", &format!("deleted task_id={task_id}"));
        Ok(())
    })
}

pub fn select_date_impl(state: &AppState, date: String) -> Result<Vec<TimeBlock>, InfraError> {
    logged(state, "select_date", || {
        let date = parse_date(&date, "date")?;
        let mut runtime = lock_runtime(state)?;

        // A gesture cannot outlive its day; commit it before switching.
        let finished = runtime.gestures.pointer_up(Instant::now());
        let leaving = runtime.date_key();
        let writes = match finished.block_id() {
            Some(_) => PendingWrites::default().day(&runtime, &leaving),
            None => PendingWrites::default(),
        };

        runtime.selected_date = date;
        let blocks = runtime.day_blocks().to_vec();
        drop(runtime);

        state.flush("select_date", writes);
        Ok(blocks)
    })
}

/// Blocks of the selected day in stored order.
pub fn list_blocks_impl(state: &AppState) -> Result<Vec<TimeBlock>, InfraError> {
    Ok(lock_runtime(state)?.day_blocks().to_vec())
}

pub fn timeline_view_impl(state: &AppState) -> Result<TimelineView, InfraError> {
    logged(state, "timeline_view", || {
        let now = state.now();
        let runtime = lock_runtime(state)?;
        let geometry = runtime.geometry();
        let settings = &runtime.settings;
        let span = i64::from(settings.day_end.saturating_sub(settings.day_start)) * 60;

        Ok(TimelineView {
            date: runtime.date_key(),
            day_start: settings.day_start,
            day_end: settings.day_end,
            snap_interval: settings.snap_interval,
            height: minutes_to_pixels(span, geometry.pixels_per_minute),
            hour_labels: time_slots(runtime.selected_date, settings.day_start, settings.day_end, 60)
                .iter()
                .map(|slot| slot.format("%H:%M").to_string())
                .collect(),
            blocks: layout_blocks(runtime.day_blocks(), &geometry),
            now_indicator: now_indicator(now, &geometry),
        })
    })
}

pub fn hover_indicator_impl(state: &AppState, y: f64) -> Result<f64, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(hover_indicator(y, &runtime.geometry()))
}

/// Creates a block on the selected day. A block that collides with existing
/// ones is held as the pending overlap proposal instead of being inserted.
pub fn create_block_impl(state: &AppState, draft: BlockDraft) -> Result<BlockPlacement, InfraError> {
    logged(state, "create_block", || {
        let title = required_text(&draft.title, "title")?;
        let mut runtime = lock_runtime(state)?;
        let date = runtime.selected_date;
        let start_time = parse_block_time(&draft.start_time, date, "startTime")?;
        let end_time = parse_block_time(&draft.end_time, date, "endTime")?;
        let task_id = optional_text(draft.task_id);
        if let Some(task_id) = task_id.as_deref() {
            runtime.find_task(task_id)?;
        }

        let block = TimeBlock {
            id: next_id("blk"),
            title,
            start_time,
            end_time,
            color: optional_text(draft.color)
                .or_else(|| Some(runtime.settings.default_block_color.clone())),
            notes: optional_text(draft.notes),
            block_type: if task_id.is_some() {
                BlockType::Task
            } else {
                BlockType::Event
            },
            task_id,
            todos: Vec::new(),
        };
        block.validate().map_err(InfraError::Validation)?;

        let (placement, writes) = place_block(&mut runtime, block);
        drop(runtime);
        state.flush("create_block", writes);
        log_placement(state, "create_block", &placement);
        Ok(placement)
    })
}

/// Manual edit of an existing block. Overlaps are not checked here.
pub fn update_block_impl(
    state: &AppState,
    block_id: String,
    patch: BlockPatch,
) -> Result<TimeBlock, InfraError> {
    logged(state, "update_block", || {
        let block_id = required_text(&block_id, "block_id")?;
        let mut runtime = lock_runtime(state)?;
        let date = runtime.selected_date;
        let mut updated = runtime.find_block(&block_id)?.clone();

        if let Some(title) = patch.title {
            updated.title = required_text(&title, "title")?;
        }
        if let Some(start_time) = patch.start_time {
            updated.start_time = parse_block_time(&start_time, date, "startTime")?;
        }
        if let Some(end_time) = patch.end_time {
            updated.end_time = parse_block_time(&end_time, date, "endTime")?;
        }
        if let Some(color) = patch.color {
            updated.color = optional_text(Some(color));
        }
        if let Some(notes) = patch.notes {
            updated.notes = optional_text(Some(notes));
        }
        updated.validate().map_err(InfraError::Validation)?;

        if let Some(slot) = runtime
            .day_mut()
            .blocks
            .iter_mut()
            .find(|block| block.id == block_id)
        {
            *slot = updated.clone();
        }
        let key = runtime.date_key();
        let writes = PendingWrites::default().day(&runtime, &key);
        drop(runtime);

        state.flush("update_block", writes);
        state.log_info("update_block", &format!("updated block_id={block_id}"));
        Ok(updated)
    })
}

/// Deletes a block of the selected day. Removing a task block sends its task
/// back to todo.
pub fn delete_block_impl(state: &AppState, block_id: String) -> Result<(), InfraError> {
    logged(state, "delete_block", || {
        let block_id = required_text(&block_id, "block_id")?;
        let now = state.now();

        let mut guard = lock_runtime(state)?;
        let runtime = &mut *guard;
        runtime.find_block(&block_id)?;
        let day = runtime.day_mut();
        let Some(index) = day.blocks.iter().position(|block| block.id == block_id) else {
            return Err(InfraError::not_found("block", &block_id));
        };
        let removed = day.blocks.remove(index);

        let key = runtime.date_key();
        let mut writes = PendingWrites::default().day(runtime, &key);
        if sync::release_block_task(&mut runtime.tasks, &removed, now) {
            writes = writes.tasks(runtime);
        }
        drop(guard);

        state.flush("delete_block", writes);
        state.log_info("delete_block", &format!("deleted block_id={block_id}"));
        Ok(())
    })
}

/// Drops a kanban task onto the timeline at `y`, creating a task block with the
/// task's duration (30 minutes when it has none).
pub fn drop_task_impl(
    state: &AppState,
    task_id: String,
    y: f64,
    modifiers: Modifiers,
) -> Result<BlockPlacement, InfraError> {
    logged(state, "drop_task", || {
        let task_id = required_text(&task_id, "task_id")?;
        let mut runtime = lock_runtime(state)?;
        let task = runtime.find_task(&task_id)?.clone();

        let start_time = runtime.geometry().snapped_at(y, modifiers.fine);
        let minutes = task.duration.unwrap_or(DEFAULT_DROP_MINUTES);
        let block = TimeBlock {
            id: next_id("blk"),
            title: task.title.clone(),
            start_time,
            end_time: start_time + Duration::minutes(i64::from(minutes)),
            color: task
                .color
                .clone()
                .or_else(|| Some(runtime.settings.default_block_color.clone())),
            notes: task.notes.clone(),
            task_id: Some(task.id.clone()),
            block_type: BlockType::Task,
            todos: Vec::new(),
        };

        let (placement, writes) = place_block(&mut runtime, block);
        drop(runtime);
        state.flush("drop_task", writes);
        log_placement(state, "drop_task", &placement);
        Ok(placement)
    })
}

/// Drops a kanban task onto a block of the selected day as a linked todo.
pub fn drop_task_onto_block_impl(
    state: &AppState,
    task_id: String,
    block_id: String,
) -> Result<BlockTodo, InfraError> {
    logged(state, "drop_task_onto_block", || {
        let task_id = required_text(&task_id, "task_id")?;
        let block_id = required_text(&block_id, "block_id")?;

        let mut guard = lock_runtime(state)?;
        let runtime = &mut *guard;
        let key = runtime.date_key();
        let todo = sync::attach_task_todo(
            &runtime.tasks,
            &mut runtime.schedules,
            &key,
            &block_id,
            &task_id,
            next_id("todo"),
        )?;
        let writes = PendingWrites::default().day(runtime, &key);
        drop(guard);

        state.flush("drop_task_onto_block", writes);
        state.log_info(
            "drop_task_onto_block",
            &format!("linked task_id={task_id} block_id={block_id} todo_id={}", todo.id),
        );
        Ok(todo)
    })
}

pub fn pending_overlap_impl(state: &AppState) -> Result<Option<OverlapProposal>, InfraError> {
    Ok(lock_runtime(state)?.pending.clone())
}

/// Settles the pending proposal and returns the blocks of its day.
pub fn resolve_overlap_impl(state: &AppState, action: String) -> Result<Vec<TimeBlock>, InfraError> {
    logged(state, "resolve_overlap", || {
        let action = OverlapAction::parse(&action)
            .ok_or_else(|| InfraError::validation(format!("unsupported overlap action: {action}")))?;

        let mut runtime = lock_runtime(state)?;
        let Some(proposal) = runtime.pending.take() else {
            return Err(InfraError::NotFound("no pending overlap proposal".to_string()));
        };
        let date = proposal.date.clone();
        let block_id = proposal.block.id.clone();

        let schedule = runtime.schedule_mut(&date);
        let writes = match resolve(&schedule.blocks, proposal, action) {
            Some(next) => {
                schedule.blocks = next;
                PendingWrites::default().day(&runtime, &date)
            }
            None => PendingWrites::default(),
        };
        let blocks = runtime
            .schedules
            .get(&date)
            .map(|schedule| schedule.blocks.clone())
            .unwrap_or_default();
        drop(runtime);

        state.flush("resolve_overlap", writes);
        state.log_info(
            "resolve_overlap",
            &format!("resolved block_id={block_id} action={action:?}"),
        );
        Ok(blocks)
    })
}

/// Starts a move or resize on `block_id`. Without a block the pointer-down is
/// ignored.
pub fn pointer_down_impl(
    state: &AppState,
    y: f64,
    block_id: Option<String>,
) -> Result<Gesture, InfraError> {
    logged(state, "pointer_down", || {
        let mut guard = lock_runtime(state)?;
        let runtime = &mut *guard;
        let geometry = runtime.geometry();
        let target = match optional_text(block_id) {
            Some(block_id) => Some(runtime.find_block(&block_id)?.clone()),
            None => None,
        };
        Ok(runtime
            .gestures
            .pointer_down(y, target.as_ref(), &geometry)
            .clone())
    })
}

/// Applies the active gesture for a pointer at `y`. Returns the new blocks of
/// the selected day when anything moved; persistence waits for pointer-up.
pub fn pointer_move_impl(
    state: &AppState,
    y: f64,
    modifiers: Modifiers,
) -> Result<Option<Vec<TimeBlock>>, InfraError> {
    logged(state, "pointer_move", || {
        let mut runtime = lock_runtime(state)?;
        let geometry = runtime.geometry();
        let Some(next) = runtime
            .gestures
            .pointer_move(y, modifiers, runtime.day_blocks(), &geometry)
        else {
            return Ok(None);
        };
        runtime.day_mut().blocks = next.clone();
        Ok(Some(next))
    })
}

pub fn pointer_up_impl(state: &AppState) -> Result<Gesture, InfraError> {
    logged(state, "pointer_up", || {
        let mut runtime = lock_runtime(state)?;
        let finished = runtime.gestures.pointer_up(Instant::now());
        let Some(block_id) = finished.block_id().map(ToOwned::to_owned) else {
            return Ok(finished);
        };
        let key = runtime.date_key();
        let writes = PendingWrites::default().day(&runtime, &key);
        drop(runtime);

        state.flush("pointer_up", writes);
        state.log_info("pointer_up", &format!("committed gesture on block_id={block_id}"));
        Ok(finished)
    })
}

/// Snapped start time for a quick-create at `y`, or `None` while a gesture or
/// its trailing click guard is active.
pub fn click_timeline_impl(state: &AppState, y: f64) -> Result<Option<NaiveDateTime>, InfraError> {
    let runtime = lock_runtime(state)?;
    if runtime.gestures.suppresses_click(Instant::now()) {
        return Ok(None);
    }
    Ok(Some(runtime.geometry().snapped_at(y, false)))
}

pub fn add_block_todo_impl(
    state: &AppState,
    block_id: String,
    text: String,
) -> Result<BlockTodo, InfraError> {
    logged(state, "add_block_todo", || {
        let block_id = required_text(&block_id, "block_id")?;
        let todo = BlockTodo {
            id: next_id("todo"),
            text: required_text(&text, "text")?,
            done: false,
            doing: false,
            task_id: None,
        };

        let mut runtime = lock_runtime(state)?;
        let key = runtime.date_key();
        sync::add_todo(&mut runtime.schedules, &key, &block_id, todo.clone())?;
        let writes = PendingWrites::default().day(&runtime, &key);
        drop(runtime);

        state.flush("add_block_todo", writes);
        Ok(todo)
    })
}

pub fn remove_block_todo_impl(
    state: &AppState,
    block_id: String,
    todo_id: String,
) -> Result<(), InfraError> {
    logged(state, "remove_block_todo", || {
        let block_id = required_text(&block_id, "block_id")?;
        let todo_id = required_text(&todo_id, "todo_id")?;

        let mut runtime = lock_runtime(state)?;
        let key = runtime.date_key();
        sync::remove_todo(&mut runtime.schedules, &key, &block_id, &todo_id)?;
        let writes = PendingWrites::default().day(&runtime, &key);
        drop(runtime);

        state.flush("remove_block_todo", writes);
        Ok(())
    })
}

/// Checkbox toggle on a todo of the selected day. Returns the block holding it.
pub fn toggle_block_todo_impl(
    state: &AppState,
    block_id: String,
    todo_id: String,
) -> Result<TimeBlock, InfraError> {
    run_todo_sync(state, "toggle_block_todo", block_id, todo_id, sync::toggle_todo)
}

pub fn set_block_todo_doing_impl(
    state: &AppState,
    block_id: String,
    todo_id: String,
) -> Result<TimeBlock, InfraError> {
    run_todo_sync(state, "set_block_todo_doing", block_id, todo_id, sync::set_todo_doing)
}

type TodoSyncStep = fn(
    &mut [Task],
    &mut Schedules,
    &str,
    &str,
    &str,
    NaiveDateTime,
) -> Result<SyncOutcome, sync::SyncError>;

fn run_todo_sync(
    state: &AppState,
    command: &str,
    block_id: String,
    todo_id: String,
    step: TodoSyncStep,
) -> Result<TimeBlock, InfraError> {
    logged(state, command, || {
        let block_id = required_text(&block_id, "block_id")?;
        let todo_id = required_text(&todo_id, "todo_id")?;
        let now = state.now();

        let mut guard = lock_runtime(state)?;
        let runtime = &mut *guard;
        let key = runtime.date_key();
        let outcome = step(
            &mut runtime.tasks,
            &mut runtime.schedules,
            &key,
            &block_id,
            &todo_id,
            now,
        )?;
        let block = runtime.find_block(&block_id)?.clone();
        let writes = PendingWrites::default().outcome(runtime, &outcome);
        drop(guard);

        state.flush(command, writes);
        state.log_info(
            command,
            &format!("block_id={block_id} todo_id={todo_id} tasks_changed={}", outcome.tasks_changed),
        );
        Ok(block)
    })
}

pub fn get_settings_impl(state: &AppState) -> Result<AppSettings, InfraError> {
    Ok(lock_runtime(state)?.settings.clone())
}

pub fn save_settings_impl(state: &AppState, settings: AppSettings) -> Result<AppSettings, InfraError> {
    logged(state, "save_settings", || {
        settings.validate().map_err(InfraError::Validation)?;
        let writes = {
            let mut runtime = lock_runtime(state)?;
            runtime.settings = settings.clone();
            PendingWrites {
                settings: Some(settings.clone()),
                ..PendingWrites::default()
            }
        };
        state.flush("save_settings", writes);
        state.log_info("save_settings", "settings updated");
        Ok(settings)
    })
}

fn place_block(runtime: &mut RuntimeState, block: TimeBlock) -> (BlockPlacement, PendingWrites) {
    let key = runtime.date_key();
    match propose(&key, block, runtime.day_blocks()) {
        Placement::Clear(block) => {
            runtime.day_mut().blocks.push(block.clone());
            let writes = PendingWrites::default().day(runtime, &key);
            (BlockPlacement::Inserted { block }, writes)
        }
        Placement::Conflict(proposal) => {
            runtime.pending = Some(proposal.clone());
            (BlockPlacement::PendingOverlap { proposal }, PendingWrites::default())
        }
    }
}

fn log_placement(state: &AppState, command: &str, placement: &BlockPlacement) {
    let message = match placement {
        BlockPlacement::Inserted { block } => format!("inserted block_id={}", block.id),
        BlockPlacement::PendingOverlap { proposal } => format!(
            "block_id={} overlaps {} block(s); awaiting resolution",
            proposal.block.id,
            proposal.overlapping.len()
        ),
    };
    state.log_info(command, &message);
}

/// Runs a command body and records any failure in the command log.
fn logged<T>(
    state: &AppState,
    command: &str,
    run: impl FnOnce() -> Result<T, InfraError>,
) -> Result<T, InfraError> {
    run().inspect_err(|error| {
        state.command_error(command, error);
    })
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn required_text(value: &str, field_name: &str) -> Result<String, InfraError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InfraError::validation(format!("{field_name} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_date(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| InfraError::validation(format!("{field_name} must be YYYY-MM-DD")))
}

fn optional_date(value: Option<String>, field_name: &str) -> Result<Option<NaiveDate>, InfraError> {
    optional_text(value)
        .map(|raw| parse_date(&raw, field_name))
        .transpose()
}

fn parse_block_time(value: &str, date: NaiveDate, field_name: &str) -> Result<NaiveDateTime, InfraError> {
    parse_wall_clock(value)
        .or_else(|| parse_hhmm(value).map(|time| date.and_time(time)))
        .ok_or_else(|| {
            InfraError::validation(format!("{field_name} must be an ISO-8601 instant or HH:MM"))
        })
}

fn parse_task_status(value: &str) -> Result<TaskStatus, InfraError> {
    TaskStatus::parse(value)
        .ok_or_else(|| InfraError::validation(format!("unsupported task status: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interaction::ResizeEdge;
    use crate::infrastructure::storage::InMemoryKeyValueStore;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    fn fixed_now() -> NaiveDateTime {
        parse_wall_clock("2026-02-16T08:30:00").expect("valid datetime")
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        fixed_now()
            .date()
            .and_hms_opt(hour, minute, 0)
            .expect("valid time")
    }

    /// Pointer offset of `hour:minute` with the default 06:00 day start.
    fn y_of(hour: u32, minute: u32) -> f64 {
        f64::from(hour * 60 + minute) - 360.0
    }

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "blockboard-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone())
                .expect("initialize app state")
                .with_now_provider(fixed_now)
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn create_task(state: &AppState, title: &str, duration: Option<u32>) -> Task {
        create_task_impl(state, title.to_string(), duration, None, None, None).expect("create task")
    }

    fn create_event(state: &AppState, title: &str, start: &str, end: &str) -> BlockPlacement {
        create_block_impl(
            state,
            BlockDraft {
                title: title.to_string(),
                start_time: start.to_string(),
                end_time: end.to_string(),
                ..BlockDraft::default()
            },
        )
        .expect("create block")
    }

    fn inserted(placement: BlockPlacement) -> TimeBlock {
        match placement {
            BlockPlacement::Inserted { block } => block,
            BlockPlacement::PendingOverlap { proposal } => {
                panic!("unexpected overlap for {}", proposal.block.id)
            }
        }
    }

    #[test]
    fn create_task_rejects_empty_title() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = create_task_impl(&state, "   ".to_string(), None, None, None, None);
        assert!(matches!(result, Err(InfraError::Validation(_))));
    }

    #[test]
    fn create_and_list_tasks_roundtrip() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let created = create_task_impl(
            &state,
            "Write report".to_string(),
            Some(45),
            Some("#22c55e".to_string()),
            Some("  ".to_string()),
            Some("2026-02-20".to_string()),
        )
        .expect("create task");
        let listed = list_tasks_impl(&state).expect("list tasks");

        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(created.status, TaskStatus::Todo);
        assert_eq!(created.created_at, fixed_now());
        assert_eq!(created.notes, None);
        assert_eq!(created.due_date, NaiveDate::from_ymd_opt(2026, 2, 20));
    }

    #[test]
    fn update_task_edits_details() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task(&state, "Draft", Some(30));

        let updated = update_task_impl(
            &state,
            task.id.clone(),
            TaskPatch {
                title: Some("Final".to_string()),
                notes: Some("ship it".to_string()),
                due_date: Some(String::new()),
                ..TaskPatch::default()
            },
        )
        .expect("update task");
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.notes.as_deref(), Some("ship it"));
        assert_eq!(updated.duration, Some(30));

        let missing = update_task_impl(&state, "tsk-missing".to_string(), TaskPatch::default());
        assert!(matches!(missing, Err(InfraError::NotFound(_))));
    }

    #[test]
    fn kanban_columns_follow_status_order() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let first = create_task(&state, "First", None);
        create_task(&state, "Second", None);
        move_task_impl(&state, first.id.clone(), "hold".to_string()).expect("move");

        let columns = kanban_columns_impl(&state).expect("columns");
        let statuses = columns.iter().map(|column| column.status).collect::<Vec<_>>();
        assert_eq!(statuses, TaskStatus::ALL.to_vec());
        assert_eq!(columns[0].tasks.len(), 1);
        assert_eq!(columns[3].tasks[0].id, first.id);

        let invalid = move_task_impl(&state, first.id, "archived".to_string());
        assert!(matches!(invalid, Err(InfraError::Validation(_))));
    }

    #[test]
    fn dropped_task_snaps_to_grid() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task_impl(
            &state,
            "Focus".to_string(),
            Some(30),
            None,
            Some("chapter 3".to_string()),
            None,
        )
        .expect("create task");

        let block = inserted(
            drop_task_impl(&state, task.id.clone(), y_of(9, 7), Modifiers::default())
                .expect("drop task"),
        );
        assert_eq!(block.start_time, at(9, 0));
        assert_eq!(block.end_time, at(9, 30));
        assert_eq!(block.block_type, BlockType::Task);
        assert_eq!(block.task_id.as_deref(), Some(task.id.as_str()));
        assert_eq!(block.title, "Focus");
        assert_eq!(block.notes.as_deref(), Some("chapter 3"));
    }

    #[test]
    fn dropped_task_without_duration_gets_default_length() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task(&state, "Open ended", None);

        let block = inserted(
            drop_task_impl(&state, task.id, y_of(14, 2), Modifiers { fine: true })
                .expect("drop task"),
        );
        assert_eq!(block.start_time, at(14, 2));
        assert_eq!(block.end_time, at(14, 32));
    }

    #[test]
    fn overlapping_block_waits_for_push() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let existing = inserted(create_event(&state, "Review", "09:30", "10:00"));

        let placement = create_event(&state, "Planning", "09:00", "10:00");
        let BlockPlacement::PendingOverlap { proposal } = placement else {
            panic!("expected an overlap proposal");
        };
        assert_eq!(proposal.overlapping, vec![existing.clone()]);
        assert_eq!(list_blocks_impl(&state).expect("list").len(), 1);
        assert!(pending_overlap_impl(&state).expect("pending").is_some());

        let blocks = resolve_overlap_impl(&state, "push".to_string()).expect("resolve");
        let moved = blocks.iter().find(|block| block.id == existing.id).expect("moved");
        assert_eq!((moved.start_time, moved.end_time), (at(10, 0), at(10, 30)));
        assert_eq!(blocks.len(), 2);
        assert!(pending_overlap_impl(&state).expect("pending").is_none());

        let again = resolve_overlap_impl(&state, "push".to_string());
        assert!(matches!(again, Err(InfraError::NotFound(_))));
    }

    #[test]
    fn cancelled_overlap_leaves_day_untouched() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        inserted(create_event(&state, "Review", "09:30", "10:00"));
        create_event(&state, "Planning", "09:00", "10:00");

        let blocks = resolve_overlap_impl(&state, "cancel".to_string()).expect("resolve");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start_time, at(9, 30));
    }

    #[test]
    fn create_block_validates_input() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let reversed = create_block_impl(
            &state,
            BlockDraft {
                title: "Backwards".to_string(),
                start_time: "11:00".to_string(),
                end_time: "10:00".to_string(),
                ..BlockDraft::default()
            },
        );
        assert!(matches!(reversed, Err(InfraError::Validation(_))));

        let unknown_task = create_block_impl(
            &state,
            BlockDraft {
                title: "Linked".to_string(),
                start_time: "2026-02-16T10:00:00".to_string(),
                end_time: "2026-02-16T11:00:00".to_string(),
                task_id: Some("tsk-missing".to_string()),
                ..BlockDraft::default()
            },
        );
        assert!(matches!(unknown_task, Err(InfraError::NotFound(_))));
        assert!(list_blocks_impl(&state).expect("list").is_empty());
    }

    #[test]
    fn linked_todos_stay_in_sync_across_days() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task(&state, "Essay", None);

        let monday = inserted(create_event(&state, "Morning", "09:00", "10:00"));
        let monday_todo =
            drop_task_onto_block_impl(&state, task.id.clone(), monday.id.clone()).expect("link");
        select_date_impl(&state, "2026-02-17".to_string()).expect("select");
        let tuesday = inserted(create_event(&state, "Morning", "09:00", "10:00"));
        let tuesday_todo =
            drop_task_onto_block_impl(&state, task.id.clone(), tuesday.id.clone()).expect("link");

        select_date_impl(&state, "2026-02-16".to_string()).expect("select");
        toggle_block_todo_impl(&state, monday.id.clone(), monday_todo.id.clone()).expect("toggle");

        let tasks = list_tasks_impl(&state).expect("tasks");
        assert_eq!(tasks[0].status, TaskStatus::Done);
        assert_eq!(tasks[0].completed_at, Some(fixed_now()));

        let tuesday_blocks = select_date_impl(&state, "2026-02-17".to_string()).expect("select");
        let mirrored = &tuesday_blocks[0].todos[0];
        assert_eq!(mirrored.id, tuesday_todo.id);
        assert!(mirrored.done);

        let blocked = set_block_todo_doing_impl(&state, tuesday.id, tuesday_todo.id);
        assert!(matches!(blocked, Err(InfraError::Validation(_))));
    }

    #[test]
    fn kanban_move_updates_block_todos() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task(&state, "Essay", None);
        let block = inserted(create_event(&state, "Morning", "09:00", "10:00"));
        drop_task_onto_block_impl(&state, task.id.clone(), block.id.clone()).expect("link");

        move_task_impl(&state, task.id.clone(), "doing".to_string()).expect("move");
        let todo = &list_blocks_impl(&state).expect("list")[0].todos[0];
        assert_eq!((todo.done, todo.doing), (false, true));

        move_task_impl(&state, task.id, "done".to_string()).expect("move");
        let todo = &list_blocks_impl(&state).expect("list")[0].todos[0];
        assert_eq!((todo.done, todo.doing), (true, false));
    }

    #[test]
    fn deleting_task_block_reverts_task() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task(&state, "Focus", Some(30));
        let block = inserted(
            drop_task_impl(&state, task.id.clone(), y_of(9, 0), Modifiers::default())
                .expect("drop task"),
        );
        move_task_impl(&state, task.id.clone(), "done".to_string()).expect("move");

        delete_block_impl(&state, block.id.clone()).expect("delete block");
        let tasks = list_tasks_impl(&state).expect("tasks");
        assert_eq!(tasks[0].status, TaskStatus::Todo);
        assert_eq!(tasks[0].completed_at, None);
        assert!(list_blocks_impl(&state).expect("list").is_empty());

        let missing = delete_block_impl(&state, block.id);
        assert!(matches!(missing, Err(InfraError::NotFound(_))));
    }

    #[test]
    fn deleting_task_removes_its_blocks_everywhere() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task(&state, "Focus", Some(30));
        drop_task_impl(&state, task.id.clone(), y_of(9, 0), Modifiers::default()).expect("drop");
        let event = inserted(create_event(&state, "Sync", "11:00", "12:00"));
        drop_task_onto_block_impl(&state, task.id.clone(), event.id.clone()).expect("link");
        select_date_impl(&state, "2026-02-18".to_string()).expect("select");
        drop_task_impl(&state, task.id.clone(), y_of(13, 0), Modifiers::default()).expect("drop");

        delete_task_impl(&state, task.id.clone()).expect("delete task");
        assert!(list_tasks_impl(&state).expect("tasks").is_empty());
        assert!(list_blocks_impl(&state).expect("list").is_empty());

        let monday = select_date_impl(&state, "2026-02-16".to_string()).expect("select");
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].id, event.id);
        assert_eq!(monday[0].todos[0].task_id, None);

        let reopened = workspace.app_state();
        assert!(list_tasks_impl(&reopened).expect("tasks").is_empty());
        assert_eq!(list_blocks_impl(&reopened).expect("list").len(), 1);
    }

    #[test]
    fn switching_day_mid_drag_keeps_the_move() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let block = inserted(create_event(&state, "Deep work", "10:00", "11:00"));

        pointer_down_impl(&state, y_of(10, 30), Some(block.id.clone())).expect("down");
        pointer_move_impl(&state, y_of(13, 0), Modifiers::default())
            .expect("move")
            .expect("block moved");
        assert!(select_date_impl(&state, "2026-02-17".to_string())
            .expect("select")
            .is_empty());
        assert_eq!(pointer_up_impl(&state).expect("up"), Gesture::Idle);
        assert_eq!(
            pointer_move_impl(&state, y_of(15, 0), Modifiers::default()).expect("move"),
            None
        );

        let reopened = workspace.app_state();
        let stored = list_blocks_impl(&reopened).expect("list");
        assert_eq!((stored[0].start_time, stored[0].end_time), (at(13, 0), at(14, 0)));
    }

    #[test]
    fn drag_commits_on_release_and_guards_click() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let block = inserted(create_event(&state, "Deep work", "10:00", "11:00"));

        let gesture =
            pointer_down_impl(&state, y_of(10, 30), Some(block.id.clone())).expect("down");
        assert!(matches!(gesture, Gesture::Dragging { .. }));

        let moved = pointer_move_impl(&state, y_of(11, 4), Modifiers::default())
            .expect("move")
            .expect("block moved");
        assert_eq!((moved[0].start_time, moved[0].end_time), (at(11, 0), at(12, 0)));
        assert_eq!(
            pointer_move_impl(&state, y_of(11, 2), Modifiers::default()).expect("move"),
            None
        );

        let finished = pointer_up_impl(&state).expect("up");
        assert_eq!(finished.block_id(), Some(block.id.as_str()));
        assert_eq!(click_timeline_impl(&state, y_of(15, 0)).expect("click"), None);

        let reopened = workspace.app_state();
        let stored = list_blocks_impl(&reopened).expect("list");
        assert_eq!(stored[0].start_time, at(11, 0));
        assert_eq!(
            click_timeline_impl(&reopened, y_of(15, 8)).expect("click"),
            Some(at(15, 15))
        );
    }

    #[test]
    fn resize_from_bottom_edge() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let block = inserted(create_event(&state, "Deep work", "10:00", "11:00"));

        let gesture =
            pointer_down_impl(&state, y_of(10, 58), Some(block.id.clone())).expect("down");
        assert!(matches!(
            gesture,
            Gesture::Resizing {
                edge: ResizeEdge::Bottom,
                ..
            }
        ));
        let resized = pointer_move_impl(&state, y_of(11, 31), Modifiers::default())
            .expect("move")
            .expect("resized");
        assert_eq!(resized[0].end_time, at(11, 30));
        assert_eq!(
            pointer_move_impl(&state, y_of(10, 5), Modifiers::default()).expect("move"),
            None
        );
        pointer_up_impl(&state).expect("up");

        let idle = pointer_down_impl(&state, y_of(12, 0), None).expect("empty timeline");
        assert_eq!(idle, Gesture::Idle);
    }

    #[test]
    fn timeline_view_reports_layout_and_now_line() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        inserted(create_event(&state, "A", "09:00", "10:00"));
        create_event(&state, "B", "09:30", "10:30");
        resolve_overlap_impl(&state, "allow".to_string()).expect("allow");

        let view = timeline_view_impl(&state).expect("view");
        assert_eq!(view.date, "2026-02-16");
        assert_eq!(view.height, 18.0 * 60.0);
        assert_eq!(view.hour_labels.first().map(String::as_str), Some("06:00"));
        assert_eq!(view.blocks.len(), 2);
        assert!(view.blocks.iter().all(|layout| layout.has_overlap));
        assert_eq!(view.blocks[0].top, 180.0);
        assert_eq!(view.now_indicator, Some(150.0));
        assert_eq!(hover_indicator_impl(&state, 188.0).expect("hover"), 195.0);

        select_date_impl(&state, "2026-02-17".to_string()).expect("select");
        assert_eq!(timeline_view_impl(&state).expect("view").now_indicator, None);
    }

    #[test]
    fn block_todos_can_be_added_toggled_and_removed() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let block = inserted(create_event(&state, "Errands", "17:00", "18:00"));

        let todo = add_block_todo_impl(&state, block.id.clone(), "Groceries".to_string())
            .expect("add todo");
        let toggled =
            toggle_block_todo_impl(&state, block.id.clone(), todo.id.clone()).expect("toggle");
        assert!(toggled.todos[0].done);

        remove_block_todo_impl(&state, block.id.clone(), todo.id.clone()).expect("remove");
        assert!(list_blocks_impl(&state).expect("list")[0].todos.is_empty());
        assert!(matches!(
            remove_block_todo_impl(&state, block.id, todo.id),
            Err(InfraError::NotFound(_))
        ));
    }

    #[test]
    fn settings_are_validated_and_persisted() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert_eq!(get_settings_impl(&state).expect("settings"), AppSettings::default());

        let invalid = AppSettings {
            snap_interval: 7,
            ..AppSettings::default()
        };
        assert!(matches!(
            save_settings_impl(&state, invalid),
            Err(InfraError::Validation(_))
        ));

        let custom = AppSettings {
            day_start: 8,
            snap_interval: 30,
            ..AppSettings::default()
        };
        save_settings_impl(&state, custom.clone()).expect("save settings");
        assert_eq!(get_settings_impl(&workspace.app_state()).expect("settings"), custom);
    }

    #[test]
    fn failed_commands_are_written_to_command_log() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let read_last_entry = || {
            let log = fs::read_to_string(workspace.path.join("logs").join("commands.log"))
                .expect("read command log");
            let last = log.lines().last().expect("log line").to_string();
            serde_json::from_str::<serde_json::Value>(&last).expect("json line")
        };

        let missing = delete_task_impl(&state, "tsk-missing".to_string());
        assert!(matches!(missing, Err(InfraError::NotFound(_))));
        let entry = read_last_entry();
        assert_eq!(entry["level"], "error");
        assert_eq!(entry["command"], "delete_task");
        assert!(entry["message"].as_str().expect("message").contains("tsk-missing"));

        let rejected = resolve_overlap_impl(&state, "merge".to_string());
        assert!(matches!(rejected, Err(InfraError::Validation(_))));
        assert_eq!(read_last_entry()["command"], "resolve_overlap");
    }

    #[test]
    fn invalid_stored_settings_fall_back_to_defaults() {
        let workspace = TempWorkspace::new();
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::default());
        store
            .set(
                "settings",
                r##"{"dayStart":10,"dayEnd":8,"snapInterval":15,"weekStart":1,"defaultBlockColor":"#6366f1"}"##,
            )
            .expect("seed settings");

        let state = AppState::with_store(workspace.path.clone(), store)
            .expect("state")
            .with_now_provider(fixed_now);
        assert_eq!(get_settings_impl(&state).expect("settings"), AppSettings::default());

        let view = timeline_view_impl(&state).expect("view");
        assert_eq!(view.day_start, 6);
        assert_eq!(view.height, 18.0 * 60.0);
    }

    #[test]
    fn in_memory_store_keeps_board_between_states() {
        let workspace = TempWorkspace::new();
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::default());
        let state = AppState::with_store(workspace.path.clone(), store.clone())
            .expect("state")
            .with_now_provider(fixed_now);
        create_task(&state, "Kept", None);
        inserted(create_event(&state, "Kept", "07:00", "07:30"));

        let reopened = AppState::with_store(workspace.path.clone(), store)
            .expect("state")
            .with_now_provider(fixed_now);
        assert_eq!(list_tasks_impl(&reopened).expect("tasks").len(), 1);
        assert_eq!(list_blocks_impl(&reopened).expect("list").len(), 1);
    }
}
