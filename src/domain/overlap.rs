use crate::domain::models::TimeBlock;

/// Half-open intersection: blocks that only touch do not overlap.
pub fn intervals_overlap(a: &TimeBlock, b: &TimeBlock) -> bool {
    a.start_time < b.end_time && a.end_time > b.start_time
}

/// Blocks in `existing` that intersect `candidate`, skipping the candidate itself.
pub fn find_overlaps<'a>(candidate: &TimeBlock, existing: &'a [TimeBlock]) -> Vec<&'a TimeBlock> {
    existing
        .iter()
        .filter(|block| block.id != candidate.id && intervals_overlap(candidate, block))
        .collect()
}

/// One flag per block, in input order.
pub fn overlap_flags(blocks: &[TimeBlock]) -> Vec<bool> {
    blocks
        .iter()
        .map(|block| !find_overlaps(block, blocks).is_empty())
        .collect()
}
