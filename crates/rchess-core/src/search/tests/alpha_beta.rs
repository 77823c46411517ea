//! alpha_beta モジュールのテスト

use crate::search::alpha_beta::{reduction, SearchWorker};
use crate::search::history::HistoryCell;

#[test]
fn test_reduction_values() {
    let root_delta = 64;
    let delta = 32;
    assert!(reduction(true, 10, 5, delta, root_delta) / 1024 >= 0);
    assert!(
        reduction(false, 10, 5, delta, root_delta) / 1024
            >= reduction(true, 10, 5, delta, root_delta) / 1024
    );
}

#[test]
fn test_reduction_bounds() {
    let root_delta = 64;
    let delta = 32;
    assert_eq!(reduction(true, 0, 0, delta, root_delta), 0);
    assert!(reduction(true, 63, 63, delta, root_delta) / 1024 < 64);
    assert!(reduction(false, 63, 63, delta, root_delta) / 1024 < 64);
}

/// depth/move_countが大きい場合にreductionが正になることを確認
#[test]
fn test_reduction_returns_positive_for_late_moves() {
    let root_delta = 64;
    let delta = 32;
    let r = reduction(false, 10, 10, delta, root_delta) / 1024;
    assert!(r > 0, "reduction should be positive for depth=10, move_count=10, got {r}");
}

/// 広いwindowではreductionが小さくなることを確認
#[test]
fn test_reduction_window_term() {
    let r_narrow = reduction(true, 10, 10, 0, 64);
    let r_wide = reduction(true, 10, 10, 64, 64);
    assert!(r_wide < r_narrow);
}

#[test]
fn test_reduction_extremes_no_overflow() {
    let r = reduction(false, 63, 63, 0, 1);
    assert!((0..i32::MAX / 2).contains(&r), "reduction extreme out of range: {r}");
}

#[test]
fn test_sentinel_initialization() {
    // SearchWorker作成時に番兵が正しく初期化されること
    let worker = SearchWorker::new(0);

    let sentinel = worker.cont_history_sentinel;
    let sentinel_ref = unsafe { sentinel.as_ref() };
    assert_eq!(sentinel_ref.get(0, shakmaty::Square::A1), 0, "sentinel should be zeroed");

    for (i, frame) in worker.state.stack.iter().enumerate() {
        assert_eq!(
            frame.cont_history_ptr, sentinel,
            "stack[{i}].cont_history_ptr should point to the sentinel"
        );
    }
}

#[test]
fn test_worker_clear_resets_history() {
    let mut worker = SearchWorker::new(0);
    let mv = crate::types::Move::normal(shakmaty::Square::E2, shakmaty::Square::E4);
    worker
        .history
        .with_write(|h| h.main_history.update(shakmaty::Color::White, mv, 500));
    assert!(worker.history.with_read(|h| h.main_history.get(shakmaty::Color::White, mv)) > 0);

    worker.clear();
    assert_eq!(worker.history.with_read(|h| h.main_history.get(shakmaty::Color::White, mv)), 0);
}

#[test]
fn test_prepare_search_keeps_history() {
    // goの間は履歴を保持する（ucinewgameでのみクリア）
    let mut worker = SearchWorker::new(0);
    let mv = crate::types::Move::normal(shakmaty::Square::E2, shakmaty::Square::E4);
    worker
        .history
        .with_write(|h| h.main_history.update(shakmaty::Color::White, mv, 500));

    worker.prepare_search();
    assert!(worker.history.with_read(|h| h.main_history.get(shakmaty::Color::White, mv)) > 0);
}

#[test]
fn test_history_cell_boxed_is_zeroed() {
    let cell = HistoryCell::new_boxed();
    let v = cell.with_read(|h| h.tt_move_history.get());
    assert_eq!(v, 0);
}
