//! 時間管理
//!
//! goコマンドの持ち時間情報から `optimum`（目標）と `maximum`（上限）の
//! 2つの予算を計算する。探索は `maximum` を絶対に守り、`optimum` は
//! 反復深化ループの安定性ヒューリスティクスに従って伸縮する。

use shakmaty::Color;

use super::types::LimitsType;
use crate::types::TimePoint;
use std::time::Instant;

/// 時間管理
#[derive(Clone, Debug)]
pub struct TimeManagement {
    start: Instant,
    optimum: TimePoint,
    maximum: TimePoint,
    use_time: bool,
}

impl TimeManagement {
    /// 時間制御なしのダミー（固定深さ・ノード・無限など）
    pub fn disabled() -> Self {
        Self {
            start: Instant::now(),
            optimum: 0,
            maximum: 0,
            use_time: false,
        }
    }

    /// 持ち時間から予算を計算する
    ///
    /// `movetime` 指定時は両予算をそこへ固定。それ以外は残り時間と加算、
    /// 残り手数（または突然死の推定）からロジスティックに配分する。
    pub fn init(limits: &LimitsType, us: Color, game_ply: i32, move_overhead: TimePoint) -> Self {
        let start = Instant::now();

        if limits.movetime > 0 {
            let budget = (limits.movetime - move_overhead).max(1);
            return Self {
                start,
                optimum: budget,
                maximum: budget,
                use_time: true,
            };
        }

        if !limits.use_time_management() {
            return Self {
                start,
                optimum: 0,
                maximum: 0,
                use_time: false,
            };
        }

        let idx = if us == Color::White { 0 } else { 1 };
        let my_time = limits.time[idx].max(1);
        let my_inc = limits.inc[idx];

        // 残り手数。movestogo指定がなければ進行度から逓減する推定値。
        let mtg = if limits.movestogo > 0 {
            limits.movestogo.min(50) as f64
        } else {
            (50.0 - 0.1 * game_ply as f64).max(20.0)
        };

        // 今回使ってよい時間のベース
        let time_left =
            (my_time as f64 + my_inc as f64 * (mtg - 1.0) - move_overhead as f64 * (2.0 + mtg))
                .max(1.0);

        // 序盤はやや厚く、終盤に向けて平準化するロジスティックスケール
        let ply_factor = 1.0 + 1.2 / (1.0 + (0.1 * (game_ply as f64 - 30.0)).exp());

        let opt_scale = if limits.movestogo > 0 {
            (0.88 / mtg).min(0.88)
        } else {
            (0.025 * ply_factor).min(0.25)
        };

        let optimum = (opt_scale * time_left) as TimePoint;
        // 上限は残り時間の約8割を超えない
        let maximum = ((my_time as f64 * 0.8) as TimePoint - move_overhead)
            .min(optimum * 6)
            .max(optimum)
            .max(1);

        Self {
            start,
            optimum: optimum.max(1),
            maximum,
            use_time: true,
        }
    }

    /// 探索開始からの経過時間（ms）
    #[inline]
    pub fn elapsed(&self) -> TimePoint {
        self.start.elapsed().as_millis() as TimePoint
    }

    /// 目標予算
    #[inline]
    pub fn optimum(&self) -> TimePoint {
        self.optimum
    }

    /// 絶対上限
    #[inline]
    pub fn maximum(&self) -> TimePoint {
        self.maximum
    }

    /// 時間制御が有効か
    #[inline]
    pub fn active(&self) -> bool {
        self.use_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movetime_pins_both_budgets() {
        let limits = LimitsType {
            movetime: 2000,
            ..Default::default()
        };
        let tm = TimeManagement::init(&limits, Color::White, 0, 10);
        assert!(tm.active());
        assert_eq!(tm.optimum(), tm.maximum());
        assert!(tm.optimum() <= 2000 && tm.optimum() >= 1900);
    }

    #[test]
    fn test_clock_budgets_ordered() {
        let limits = LimitsType {
            time: [60_000, 60_000],
            inc: [1000, 1000],
            ..Default::default()
        };
        let tm = TimeManagement::init(&limits, Color::White, 20, 10);
        assert!(tm.active());
        assert!(tm.optimum() >= 1);
        assert!(tm.maximum() >= tm.optimum());
        assert!(tm.maximum() <= 48_000);
    }

    #[test]
    fn test_movestogo_spends_more_per_move() {
        let sudden_death = LimitsType {
            time: [60_000, 60_000],
            ..Default::default()
        };
        let repeating = LimitsType {
            time: [60_000, 60_000],
            movestogo: 5,
            ..Default::default()
        };
        let tm_sd = TimeManagement::init(&sudden_death, Color::White, 20, 10);
        let tm_mtg = TimeManagement::init(&repeating, Color::White, 20, 10);
        assert!(tm_mtg.optimum() > tm_sd.optimum());
    }

    #[test]
    fn test_disabled_when_no_clock() {
        let limits = LimitsType {
            depth: 10,
            ..Default::default()
        };
        let tm = TimeManagement::init(&limits, Color::White, 0, 10);
        assert!(!tm.active());
    }
}
