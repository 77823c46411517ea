//! 評価ハッシュ
//!
//! 静的評価（未補正）の小さな共有キャッシュ。ロックは使わず、
//! キーの上位32bitで検証する。外れてもヒントを失うだけで正しさには
//! 影響しない。

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Value;

/// 1エントリ: 上位32bit = キー上位、下位32bit = 評価値(i32)
pub struct EvalHash {
    table: Vec<AtomicU64>,
    mask: usize,
}

impl EvalHash {
    /// MB単位でテーブルを確保（2のべき乗エントリ数に切り下げ）
    pub fn new(mb_size: usize) -> Self {
        let entries = (mb_size.max(1) * 1024 * 1024 / 8).next_power_of_two() / 2;
        let entries = entries.max(1024);
        let mut table = Vec::with_capacity(entries);
        table.resize_with(entries, || AtomicU64::new(0));
        Self {
            table,
            mask: entries - 1,
        }
    }

    /// キャッシュを引く
    #[inline]
    pub fn probe(&self, key: u64) -> Option<Value> {
        let slot = &self.table[(key as usize) & self.mask];
        let packed = slot.load(Ordering::Relaxed);
        if packed == 0 {
            return None;
        }
        if (packed >> 32) == (key >> 32) {
            Some(Value::new(packed as u32 as i32))
        } else {
            None
        }
    }

    /// キャッシュへ書き込む
    #[inline]
    pub fn store(&self, key: u64, value: Value) {
        let packed = (key & 0xFFFF_FFFF_0000_0000) | (value.raw() as u32 as u64);
        self.table[(key as usize) & self.mask].store(packed, Ordering::Relaxed);
    }

    /// 全クリア
    pub fn clear(&self) {
        for slot in &self.table {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_miss_then_hit() {
        let hash = EvalHash::new(1);
        let key = 0xABCD_EF01_2345_6789;
        assert!(hash.probe(key).is_none());

        hash.store(key, Value::new(-137));
        assert_eq!(hash.probe(key), Some(Value::new(-137)));
    }

    #[test]
    fn test_key_mismatch_rejected() {
        let hash = EvalHash::new(1);
        let key = 0xABCD_EF01_2345_6789u64;
        hash.store(key, Value::new(10));
        // 同じスロットでも上位32bitが違えば外れ
        let other = (key & 0xFFFF_FFFF) | 0x1111_0000_0000_0000;
        assert!(hash.probe(other).is_none());
    }

    #[test]
    fn test_clear() {
        let hash = EvalHash::new(1);
        let key = 42u64 | (7u64 << 40);
        hash.store(key, Value::new(5));
        hash.clear();
        assert!(hash.probe(key).is_none());
    }
}
