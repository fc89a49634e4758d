//! Pointer gestures on the timeline.
//!
//! A gesture lives from pointer-down to pointer-up. Moves never mutate blocks in
//! place: an accepted move yields a full replacement array for the caller to swap in.

use crate::domain::models::{AppSettings, TimeBlock};
use crate::domain::overlap::overlap_flags;
use crate::domain::time_math::{
    instant_at_offset, minutes_from_day_start, minutes_to_pixels, pixel_to_minutes, snap_or_raw,
    DEFAULT_PIXELS_PER_MINUTE,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::time::{Duration as StdDuration, Instant};

/// Distance from a block's rendered edge that starts a resize instead of a move.
pub const EDGE_THRESHOLD_PX: f64 = 10.0;
pub const DRAG_CLICK_GUARD: StdDuration = StdDuration::from_millis(120);
pub const RESIZE_CLICK_GUARD: StdDuration = StdDuration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineGeometry {
    pub date: NaiveDate,
    pub day_start: u32,
    pub day_end: u32,
    pub snap_interval: u32,
    pub pixels_per_minute: f64,
}

impl TimelineGeometry {
    pub fn from_settings(date: NaiveDate, settings: &AppSettings) -> Self {
        Self {
            date,
            day_start: settings.day_start,
            day_end: settings.day_end,
            snap_interval: settings.snap_interval,
            pixels_per_minute: DEFAULT_PIXELS_PER_MINUTE,
        }
    }

    /// Unsnapped instant under a pointer `y` pixels below the container top.
    pub fn instant_at(&self, y: f64) -> NaiveDateTime {
        instant_at_offset(
            self.date,
            self.day_start,
            pixel_to_minutes(y, self.pixels_per_minute),
        )
    }

    pub fn snapped_at(&self, y: f64, fine: bool) -> NaiveDateTime {
        snap_or_raw(self.instant_at(y), self.snap_interval, fine)
    }

    pub fn top_of(&self, block: &TimeBlock) -> f64 {
        minutes_to_pixels(
            minutes_from_day_start(block.start_time, self.day_start),
            self.pixels_per_minute,
        )
    }

    pub fn height_of(&self, block: &TimeBlock) -> f64 {
        minutes_to_pixels(block.duration().num_minutes(), self.pixels_per_minute)
    }

    /// Minimum block length a resize may leave behind.
    pub fn resize_floor(&self, fine: bool) -> Duration {
        if fine {
            Duration::minutes(1)
        } else {
            Duration::minutes(i64::from(self.snap_interval.max(1)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockLayout {
    pub block_id: String,
    pub top: f64,
    pub height: f64,
    pub has_overlap: bool,
}

pub fn layout_blocks(blocks: &[TimeBlock], geometry: &TimelineGeometry) -> Vec<BlockLayout> {
    blocks
        .iter()
        .zip(overlap_flags(blocks))
        .map(|(block, has_overlap)| BlockLayout {
            block_id: block.id.clone(),
            top: geometry.top_of(block),
            height: geometry.height_of(block),
            has_overlap,
        })
        .collect()
}

/// Snapped hover line position for a pointer at `y`.
pub fn hover_indicator(y: f64, geometry: &TimelineGeometry) -> f64 {
    let day_start_minutes = i64::from(geometry.day_start) * 60;
    let total = day_start_minutes + pixel_to_minutes(y, geometry.pixels_per_minute);
    let step = i64::from(geometry.snap_interval.max(1));
    let snapped = (total + step / 2).div_euclid(step) * step;
    minutes_to_pixels(snapped - day_start_minutes, geometry.pixels_per_minute)
}

/// Current-time line, only on the displayed day and inside the day window.
pub fn now_indicator(now: NaiveDateTime, geometry: &TimelineGeometry) -> Option<f64> {
    if now.date() != geometry.date {
        return None;
    }
    let minutes = i64::from(now.hour()) * 60 + i64::from(now.minute());
    let start = i64::from(geometry.day_start) * 60;
    let end = i64::from(geometry.day_end) * 60;
    if minutes < start || minutes > end {
        return None;
    }
    Some(minutes_to_pixels(minutes - start, geometry.pixels_per_minute))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Bypass snapping for fine placement.
    pub fine: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Idle,
    Dragging {
        block_id: String,
        duration: Duration,
    },
    Resizing {
        block_id: String,
        edge: ResizeEdge,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    },
}

impl Gesture {
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Dragging { block_id, .. } | Self::Resizing { block_id, .. } => Some(block_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GestureController {
    gesture: Gesture,
    click_guard_until: Option<Instant>,
}

impl Default for GestureController {
    fn default() -> Self {
        Self {
            gesture: Gesture::Idle,
            click_guard_until: None,
        }
    }
}

impl GestureController {
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// Starts a gesture on `target`. Pointer-downs on empty timeline or during an
    /// active gesture are ignored.
    pub fn pointer_down(
        &mut self,
        y: f64,
        target: Option<&TimeBlock>,
        geometry: &TimelineGeometry,
    ) -> &Gesture {
        let Some(block) = target else {
            return &self.gesture;
        };
        if !self.is_idle() {
            return &self.gesture;
        }

        let offset = y - geometry.top_of(block);
        let height = geometry.height_of(block);
        self.gesture = if offset <= EDGE_THRESHOLD_PX {
            Gesture::Resizing {
                block_id: block.id.clone(),
                edge: ResizeEdge::Top,
                start_time: block.start_time,
                end_time: block.end_time,
            }
        } else if height - offset <= EDGE_THRESHOLD_PX {
            Gesture::Resizing {
                block_id: block.id.clone(),
                edge: ResizeEdge::Bottom,
                start_time: block.start_time,
                end_time: block.end_time,
            }
        } else {
            Gesture::Dragging {
                block_id: block.id.clone(),
                duration: block.duration(),
            }
        };
        tracing::debug!(block_id = %block.id, gesture = ?self.gesture, "gesture started");
        &self.gesture
    }

    /// Replacement block array for a pointer at `y`, or `None` when nothing moves.
    pub fn pointer_move(
        &self,
        y: f64,
        modifiers: Modifiers,
        blocks: &[TimeBlock],
        geometry: &TimelineGeometry,
    ) -> Option<Vec<TimeBlock>> {
        let target = geometry.snapped_at(y, modifiers.fine);
        let (block_id, start, end) = match &self.gesture {
            Gesture::Idle => return None,
            Gesture::Dragging { block_id, duration } => (block_id, target, target + *duration),
            Gesture::Resizing {
                block_id,
                edge,
                start_time,
                end_time,
            } => {
                let floor = geometry.resize_floor(modifiers.fine);
                match edge {
                    ResizeEdge::Top => {
                        if target >= *end_time || *end_time - target < floor {
                            return None;
                        }
                        (block_id, target, *end_time)
                    }
                    ResizeEdge::Bottom => {
                        if target <= *start_time || target - *start_time < floor {
                            return None;
                        }
                        (block_id, *start_time, target)
                    }
                }
            }
        };

        let current = blocks.iter().find(|block| &block.id == block_id)?;
        if current.start_time == start && current.end_time == end {
            return None;
        }
        Some(
            blocks
                .iter()
                .map(|block| {
                    if &block.id == block_id {
                        TimeBlock {
                            start_time: start,
                            end_time: end,
                            ..block.clone()
                        }
                    } else {
                        block.clone()
                    }
                })
                .collect(),
        )
    }

    /// Ends the gesture wherever the pointer is released and returns it.
    pub fn pointer_up(&mut self, now: Instant) -> Gesture {
        let finished = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let guard = match finished {
            Gesture::Idle => None,
            Gesture::Dragging { .. } => Some(DRAG_CLICK_GUARD),
            Gesture::Resizing { .. } => Some(RESIZE_CLICK_GUARD),
        };
        if let Some(guard) = guard {
            self.click_guard_until = Some(now + guard);
            tracing::debug!(gesture = ?finished, "gesture finished");
        }
        finished
    }

    /// True while a gesture runs or its release is still fresh enough to be
    /// mistaken for a click.
    pub fn suppresses_click(&self, now: Instant) -> bool {
        !self.is_idle()
            || self
                .click_guard_until
                .map(|until| now < until)
                .unwrap_or(false)
    }
}
