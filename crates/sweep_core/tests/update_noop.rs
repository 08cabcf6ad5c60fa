use sweep_core::{update, AppState, Msg, PageLimits};

const LIMITS: PageLimits = PageLimits {
    default_pages: 5,
    max_pages: 50,
};

#[test]
fn update_is_noop() {
    let state = AppState::new(LIMITS);
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn tick_is_noop() {
    let state = AppState::new(LIMITS);
    let (next, effects) = update(state.clone(), Msg::Tick);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
