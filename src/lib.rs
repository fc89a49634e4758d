//! BlockBoard: a day planner pairing a kanban task board with a drag-and-resize
//! timeline of time blocks.
//!
//! The `domain` layer is pure: time arithmetic, overlap detection, the gesture
//! controller, overlap resolution and task/todo status sync. The `application`
//! layer owns the session state and exposes one `*_impl` function per user
//! command. `infrastructure` persists the board as JSON records in SQLite.

pub mod application {
    pub mod bootstrap;
    pub mod commands;
}

pub mod domain {
    pub mod interaction;
    pub mod models;
    pub mod overlap;
    pub mod resolution;
    pub mod sync;
    pub mod time_math;
}

pub mod infrastructure {
    pub mod config;
    pub mod error;
    pub mod records;
    pub mod storage;
}

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::commands::AppState;
pub use domain::models::{AppSettings, BlockTodo, BlockType, DaySchedule, Task, TaskStatus, TimeBlock};
pub use infrastructure::error::InfraError;

use std::path::PathBuf;

/// Opens the board stored under `root`, or under the current directory.
pub fn open_board(root: Option<PathBuf>) -> Result<AppState, InfraError> {
    let workspace_root = match root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    AppState::new(workspace_root)
}
