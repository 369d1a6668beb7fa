//! Unit tests for the staging flush range computation

use super::flush_range;

// ============================================================================
// FLUSH RANGE
// ============================================================================

#[test]
fn test_flush_range_already_aligned() {
    assert_eq!(flush_range(0, 256, 64, 1024), (0, 256));
}

#[test]
fn test_flush_range_widened_to_atom() {
    // [70, 130) -> [64, 192)
    assert_eq!(flush_range(70, 60, 64, 1024), (64, 128));
}

#[test]
fn test_flush_range_clamped_to_allocation() {
    // Rounding up would pass the end of a 1000-byte allocation
    assert_eq!(flush_range(960, 40, 64, 1000), (960, 40));
}

#[test]
fn test_flush_range_atom_of_one() {
    assert_eq!(flush_range(13, 7, 1, 100), (13, 7));
}
