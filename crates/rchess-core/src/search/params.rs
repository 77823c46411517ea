//! 探索チューニングパラメータ
//!
//! 枝刈り・延長・時間管理の定数を1つの構造体にまとめる。既定値が
//! 本番の値で、JSONへダンプしてチューニングの差分管理に使える。

use serde::{Deserialize, Serialize};

/// 探索パラメータ一式
///
/// すべての探索系の定数は名前付きフィールドとしてここに置く。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTuneParams {
    // Aspiration window
    pub aspiration_delta_base: i32,
    pub aspiration_delta_div: i32,

    // Razoring: eval < alpha - base - mult*depth^2
    pub razoring_base: i32,
    pub razoring_depth_mult: i32,

    // Futility pruning（子ノード）
    pub futility_max_depth: i32,
    pub futility_mult: i32,

    // Null move pruning
    pub nmp_base_reduction: i32,
    pub nmp_depth_div: i32,
    pub nmp_eval_div: i32,
    pub nmp_eval_max: i32,
    pub nmp_verification_depth: i32,

    // ProbCut
    pub probcut_beta_base: i32,
    pub probcut_improving_sub: i32,
    pub probcut_depth_sub: i32,
    pub small_probcut_margin: i32,

    // Singular extension
    pub singular_margin_base: i32,
    pub singular_margin_tt_pv: i32,
    pub singular_margin_div: i32,
    pub singular_multi_ext_limit: i32,

    // 静止探索
    pub qsearch_futility_base: i32,
    pub qsearch_see_margin: i32,

    // Move loop pruning
    pub see_quiet_mult: i32,
    pub cont_hist_prune_mult: i32,

    // 時間管理
    pub falling_eval_base: i32,
    pub falling_eval_prev_mult: i32,
    pub falling_eval_iter_mult: i32,
    pub time_reduction_stable: f64,
    pub time_reduction_unstable: f64,
    pub instability_mult: f64,
}

impl Default for SearchTuneParams {
    fn default() -> Self {
        Self {
            aspiration_delta_base: 10,
            aspiration_delta_div: 12493,

            razoring_base: 488,
            razoring_depth_mult: 289,

            futility_max_depth: 12,
            futility_mult: 118,

            nmp_base_reduction: 4,
            nmp_depth_div: 3,
            nmp_eval_div: 144,
            nmp_eval_max: 6,
            nmp_verification_depth: 16,

            probcut_beta_base: 170,
            probcut_improving_sub: 64,
            probcut_depth_sub: 4,
            small_probcut_margin: 417,

            singular_margin_base: 56,
            singular_margin_tt_pv: 79,
            singular_margin_div: 58,
            singular_multi_ext_limit: 12,

            qsearch_futility_base: 226,
            qsearch_see_margin: -78,

            see_quiet_mult: -50,
            cont_hist_prune_mult: -5000,

            falling_eval_base: 1067,
            falling_eval_prev_mult: 223,
            falling_eval_iter_mult: 97,
            time_reduction_stable: 1.495,
            time_reduction_unstable: 0.687,
            instability_mult: 1.88,
        }
    }
}

impl SearchTuneParams {
    /// 現在のパラメータをJSONで出力
    pub fn dump_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrip_json() {
        let params = SearchTuneParams::default();
        let json = params.dump_json();
        let parsed: SearchTuneParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.razoring_base, params.razoring_base);
        assert_eq!(parsed.nmp_verification_depth, params.nmp_verification_depth);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: SearchTuneParams = serde_json::from_str(r#"{"razoring_base": 500}"#).unwrap();
        assert_eq!(parsed.razoring_base, 500);
        assert_eq!(parsed.qsearch_futility_base, 226);
    }
}
