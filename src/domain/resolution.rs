use crate::domain::models::TimeBlock;
use crate::domain::overlap::find_overlaps;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverlapAction {
    Cancel,
    Allow,
    Push,
}

impl OverlapAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cancel" => Some(Self::Cancel),
            "allow" => Some(Self::Allow),
            "push" => Some(Self::Push),
            _ => None,
        }
    }
}

/// A new block waiting for the user to pick an [`OverlapAction`], together with
/// the blocks it collided with at proposal time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapProposal {
    pub date: String,
    pub block: TimeBlock,
    pub overlapping: Vec<TimeBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Clear(TimeBlock),
    Conflict(OverlapProposal),
}

pub fn propose(date: &str, candidate: TimeBlock, existing: &[TimeBlock]) -> Placement {
    let overlapping = find_overlaps(&candidate, existing)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    if overlapping.is_empty() {
        Placement::Clear(candidate)
    } else {
        Placement::Conflict(OverlapProposal {
            date: date.to_string(),
            block: candidate,
            overlapping,
        })
    }
}

/// New block array for `action`, or `None` when the proposal is discarded.
pub fn resolve(
    blocks: &[TimeBlock],
    proposal: OverlapProposal,
    action: OverlapAction,
) -> Option<Vec<TimeBlock>> {
    match action {
        OverlapAction::Cancel => None,
        OverlapAction::Allow => {
            let mut next = blocks.to_vec();
            next.push(proposal.block);
            Some(next)
        }
        OverlapAction::Push => Some(push_back(blocks, proposal)),
    }
}

/// Chains the overlapped blocks, in start order, directly after the proposed
/// block. Each keeps the duration it had when the proposal was made. Blocks
/// that left the day since then are skipped.
pub fn push_back(blocks: &[TimeBlock], proposal: OverlapProposal) -> Vec<TimeBlock> {
    let mut next = blocks.to_vec();
    let mut overlapping = proposal.overlapping;
    overlapping.sort_by(|left, right| left.start_time.cmp(&right.start_time));

    let mut cursor = proposal.block.end_time;
    for overlap in &overlapping {
        let duration = overlap.end_time - overlap.start_time;
        let Some(slot) = next.iter_mut().find(|block| block.id == overlap.id) else {
            continue;
        };
        slot.start_time = cursor;
        slot.end_time = cursor + duration;
        cursor = slot.end_time;
    }

    next.push(proposal.block);
    next
}
