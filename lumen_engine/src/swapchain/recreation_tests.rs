/// Unit tests for RecreationState

use crate::graphics_device::Extent2D;
use crate::swapchain::RecreationState;

#[test]
fn test_idle_state_has_nothing_to_do() {
    let mut state = RecreationState::new();
    assert!(!state.is_pending());
    assert_eq!(state.begin(), None);
}

#[test]
fn test_repeated_requests_coalesce() {
    let mut state = RecreationState::new();
    state.request(Extent2D::new(640, 480));
    state.request(Extent2D::new(700, 500));
    state.request(Extent2D::new(1024, 768));

    assert_eq!(state.begin(), Some(Extent2D::new(1024, 768)));
    state.finish();
    assert_eq!(state.begin(), None);
}

#[test]
fn test_guard_blocks_overlapping_recreation() {
    let mut state = RecreationState::new();
    state.request(Extent2D::new(640, 480));
    assert!(state.begin().is_some());

    state.request(Extent2D::new(800, 600));
    assert!(state.is_recreating());
    assert_eq!(state.begin(), None);

    state.finish();
    assert_eq!(state.begin(), Some(Extent2D::new(800, 600)));
}

#[test]
fn test_zero_extent_pauses_until_resized() {
    let mut state = RecreationState::new();
    state.request(Extent2D::new(0, 0));
    assert!(state.is_paused());
    assert_eq!(state.begin(), None);
    assert!(state.is_pending());

    state.request(Extent2D::new(320, 200));
    assert!(!state.is_paused());
    assert_eq!(state.begin(), Some(Extent2D::new(320, 200)));
}

#[test]
fn test_defer_keeps_newer_request() {
    let mut state = RecreationState::new();
    state.request(Extent2D::new(640, 480));
    let extent = state.begin().unwrap();
    state.defer(extent);
    assert!(!state.is_recreating());
    assert_eq!(state.begin(), Some(Extent2D::new(640, 480)));

    state.request(Extent2D::new(1, 1));
    state.defer(Extent2D::new(640, 480));
    assert_eq!(state.begin(), Some(Extent2D::new(1, 1)));
}
