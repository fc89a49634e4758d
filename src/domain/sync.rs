//! Status propagation between kanban tasks and the block todos that mirror them.
//!
//! A task's status is authoritative. Every todo carrying its id holds the same
//! `done` value across all blocks of all days; `doing` is only forced on every
//! mirror by kanban moves and done/undone toggles.

use crate::domain::models::{BlockTodo, DaySchedule, Task, TaskStatus, TimeBlock};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Day schedules keyed by `YYYY-MM-DD`.
pub type Schedules = BTreeMap<String, DaySchedule>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("todo not found: {0}")]
    TodoNotFound(String),
    #[error("todo {0} is done and cannot be marked doing")]
    TodoAlreadyDone(String),
}

/// Which records a sync step touched, so callers persist exactly those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub tasks_changed: bool,
    pub touched_dates: BTreeSet<String>,
}

impl SyncOutcome {
    fn merge(&mut self, other: SyncOutcome) {
        self.tasks_changed |= other.tasks_changed;
        self.touched_dates.extend(other.touched_dates);
    }
}

/// `(done, doing)` a linked todo shows for `status`.
pub fn todo_mirror(status: TaskStatus) -> (bool, bool) {
    match status {
        TaskStatus::Done => (true, false),
        TaskStatus::Doing => (false, true),
        TaskStatus::Todo | TaskStatus::Hold => (false, false),
    }
}

/// Writes the mirror of `status` into every todo linked to `task_id`.
pub fn mirror_task_status(task_id: &str, status: TaskStatus, schedules: &mut Schedules) -> SyncOutcome {
    let (done, doing) = todo_mirror(status);
    let mut outcome = SyncOutcome::default();
    for (date, schedule) in schedules.iter_mut() {
        let linked = schedule
            .blocks
            .iter_mut()
            .flat_map(|block| block.todos.iter_mut())
            .filter(|todo| todo.task_id.as_deref() == Some(task_id));
        for todo in linked {
            if todo.done != done || todo.doing != doing {
                todo.done = done;
                todo.doing = doing;
                outcome.touched_dates.insert(date.clone());
            }
        }
    }
    outcome
}

/// Kanban drop of a task into the `status` column.
pub fn move_task(
    tasks: &mut [Task],
    schedules: &mut Schedules,
    task_id: &str,
    status: TaskStatus,
    now: NaiveDateTime,
) -> Result<SyncOutcome, SyncError> {
    let task = find_task(tasks, task_id)?;
    task.apply_status(status, now);
    let mut outcome = SyncOutcome {
        tasks_changed: true,
        ..SyncOutcome::default()
    };
    outcome.merge(mirror_task_status(task_id, status, schedules));
    Ok(outcome)
}

/// Checkbox toggle on a block todo. Linked todos drive their task first and the
/// new status then fans out to every sibling mirror.
pub fn toggle_todo(
    tasks: &mut [Task],
    schedules: &mut Schedules,
    date: &str,
    block_id: &str,
    todo_id: &str,
    now: NaiveDateTime,
) -> Result<SyncOutcome, SyncError> {
    let todo = find_todo(schedules, date, block_id, todo_id)?;
    let now_done = !todo.done;

    let Some(task_id) = todo.task_id.clone() else {
        todo.done = now_done;
        if now_done {
            todo.doing = false;
        }
        return Ok(SyncOutcome {
            tasks_changed: false,
            touched_dates: BTreeSet::from([date.to_string()]),
        });
    };

    let status = if now_done {
        TaskStatus::Done
    } else if todo.doing {
        TaskStatus::Doing
    } else {
        TaskStatus::Todo
    };
    move_task(tasks, schedules, &task_id, status, now)
}

/// Marks one todo as in progress and moves its task to doing. Sibling mirrors
/// keep their `doing` flag.
pub fn set_todo_doing(
    tasks: &mut [Task],
    schedules: &mut Schedules,
    date: &str,
    block_id: &str,
    todo_id: &str,
    now: NaiveDateTime,
) -> Result<SyncOutcome, SyncError> {
    let todo = find_todo(schedules, date, block_id, todo_id)?;
    if todo.done {
        return Err(SyncError::TodoAlreadyDone(todo_id.to_string()));
    }
    let Some(task_id) = todo.task_id.clone() else {
        tracing::debug!(todo_id, "doing mark ignored for unlinked todo");
        return Ok(SyncOutcome::default());
    };

    find_task(tasks, &task_id)?.apply_status(TaskStatus::Doing, now);
    find_todo(schedules, date, block_id, todo_id)?.doing = true;
    Ok(SyncOutcome {
        tasks_changed: true,
        touched_dates: BTreeSet::from([date.to_string()]),
    })
}

/// Reverts the task of a deleted task block to todo. Other mirrors of the same
/// task are left as they are.
pub fn release_block_task(tasks: &mut [Task], block: &TimeBlock, now: NaiveDateTime) -> bool {
    let Some(task_id) = block.linked_task_id() else {
        return false;
    };
    match tasks.iter_mut().find(|task| task.id == task_id) {
        Some(task) => {
            task.apply_status(TaskStatus::Todo, now);
            true
        }
        None => {
            tracing::warn!(task_id, block_id = %block.id, "deleted block referenced a missing task");
            false
        }
    }
}

/// Removes a task, every block linked to it, and unlinks any remaining todo
/// mirrors of it.
pub fn delete_task(
    tasks: &mut Vec<Task>,
    schedules: &mut Schedules,
    task_id: &str,
) -> Result<SyncOutcome, SyncError> {
    let index = tasks
        .iter()
        .position(|task| task.id == task_id)
        .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;
    tasks.remove(index);

    let mut outcome = SyncOutcome {
        tasks_changed: true,
        ..SyncOutcome::default()
    };
    for (date, schedule) in schedules.iter_mut() {
        let before = schedule.blocks.len();
        schedule
            .blocks
            .retain(|block| block.task_id.as_deref() != Some(task_id));
        let mut touched = schedule.blocks.len() != before;

        for todo in schedule
            .blocks
            .iter_mut()
            .flat_map(|block| block.todos.iter_mut())
            .filter(|todo| todo.task_id.as_deref() == Some(task_id))
        {
            todo.task_id = None;
            touched = true;
        }
        if touched {
            outcome.touched_dates.insert(date.clone());
        }
    }
    Ok(outcome)
}

/// Drops a task onto a block: appends a todo mirroring the task.
pub fn attach_task_todo(
    tasks: &[Task],
    schedules: &mut Schedules,
    date: &str,
    block_id: &str,
    task_id: &str,
    todo_id: String,
) -> Result<BlockTodo, SyncError> {
    let task = tasks
        .iter()
        .find(|task| task.id == task_id)
        .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;
    let (done, doing) = todo_mirror(task.status);
    let todo = BlockTodo {
        id: todo_id,
        text: task.title.clone(),
        done,
        doing,
        task_id: Some(task.id.clone()),
    };
    find_block(schedules, date, block_id)?.todos.push(todo.clone());
    Ok(todo)
}

pub fn add_todo(
    schedules: &mut Schedules,
    date: &str,
    block_id: &str,
    todo: BlockTodo,
) -> Result<(), SyncError> {
    find_block(schedules, date, block_id)?.todos.push(todo);
    Ok(())
}

pub fn remove_todo(
    schedules: &mut Schedules,
    date: &str,
    block_id: &str,
    todo_id: &str,
) -> Result<BlockTodo, SyncError> {
    let block = find_block(schedules, date, block_id)?;
    let index = block
        .todos
        .iter()
        .position(|todo| todo.id == todo_id)
        .ok_or_else(|| SyncError::TodoNotFound(todo_id.to_string()))?;
    Ok(block.todos.remove(index))
}

fn find_task<'a>(tasks: &'a mut [Task], task_id: &str) -> Result<&'a mut Task, SyncError> {
    tasks
        .iter_mut()
        .find(|task| task.id == task_id)
        .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))
}

fn find_block<'a>(
    schedules: &'a mut Schedules,
    date: &str,
    block_id: &str,
) -> Result<&'a mut TimeBlock, SyncError> {
    schedules
        .get_mut(date)
        .and_then(|schedule| schedule.blocks.iter_mut().find(|block| block.id == block_id))
        .ok_or_else(|| SyncError::BlockNotFound(block_id.to_string()))
}

fn find_todo<'a>(
    schedules: &'a mut Schedules,
    date: &str,
    block_id: &str,
    todo_id: &str,
) -> Result<&'a mut BlockTodo, SyncError> {
    find_block(schedules, date, block_id)?
        .todos
        .iter_mut()
        .find(|todo| todo.id == todo_id)
        .ok_or_else(|| SyncError::TodoNotFound(todo_id.to_string()))
}
