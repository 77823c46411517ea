//! 探索モジュールのテスト

mod alpha_beta;
