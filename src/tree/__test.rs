use super::*;

#[test]
fn load_window_is_cached_while_clamped() {
    let mut state = LoadState::new();
    assert!(state.load == MINIMUM_LOAD);
    assert!(state.lower == 0);

    // The minimum clamp holds for every count under the first upper
    // threshold, so none of these updates may shift the cached window.
    let cached = (state.load, state.lower, state.upper);
    for count in 0..=1000 {
        state.update(count);
        assert!((state.load, state.lower, state.upper) == cached);
    }
}

#[test]
fn load_window_recomputes_once_count_escapes() {
    let mut state = LoadState::new();
    let upper = state.upper;

    state.update(upper + 1);
    assert!(state.load > MINIMUM_LOAD);
    assert!(state.lower > 0);
    assert!(state.upper > upper);

    // Dropping back into clamp territory restores the open lower bound.
    state.update(2000);
    assert!(state.load == MINIMUM_LOAD);
    assert!(state.lower == 0);
}

#[test]
fn merge_threshold_is_half_the_load() {
    let state = LoadState::new();
    assert!(state.merge_threshold() == state.load / 2);
}
