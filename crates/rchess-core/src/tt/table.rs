//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ（キャッシュライン1本）
//! - TranspositionTable: テーブル本体
//! - probe/write操作・並列クリア・世代管理

use super::entry::{TTData, TTEntry};
use super::{CLUSTER_SIZE, GENERATION_DELTA};
use crate::position::Position;
use crate::types::Move;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, Ordering};

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ。
/// 16bytes × 3 + 16 = 64bytes（キャッシュライン1本に収まる）
#[repr(C, align(64))]
pub struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
    _padding: [u8; 16],
}

impl Cluster {
    const fn new() -> Self {
        Self {
            entries: [TTEntry::new(); CLUSTER_SIZE],
            _padding: [0; 16],
        }
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

// クラスターは64バイトであることを保証（キャッシュラインサイズ）
const _: () = assert!(std::mem::size_of::<Cluster>() == 64);

/// アラインメント付きで確保したクラスター配列
struct ClusterTable {
    ptr: NonNull<Cluster>,
    len: usize,
}

impl ClusterTable {
    fn new(len: usize) -> Self {
        let layout = Self::layout(len);
        // SAFETY: layoutはゼロサイズでなく、Clusterはゼロ初期化が有効
        let raw = unsafe { alloc_zeroed(layout) } as *mut Cluster;
        let ptr = match NonNull::new(raw) {
            Some(p) => p,
            None => std::alloc::handle_alloc_error(layout),
        };
        Self { ptr, len }
    }

    fn layout(len: usize) -> Layout {
        Layout::array::<Cluster>(len)
            .and_then(|l| l.align_to(std::mem::align_of::<Cluster>()))
            .unwrap_or_else(|_| Layout::new::<Cluster>())
    }
}

impl Drop for ClusterTable {
    fn drop(&mut self) {
        // SAFETY: newで確保したポインタとレイアウト
        unsafe { dealloc(self.ptr.as_ptr() as *mut u8, Self::layout(self.len)) };
    }
}

impl Deref for ClusterTable {
    type Target = [Cluster];

    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for ClusterTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

// SAFETY: テーブルは単一のヒープ領域で、共有アクセスはTranspositionTableの
// 検証付きレース許容プロトコルに従う
unsafe impl Send for ClusterTable {}
unsafe impl Sync for ClusterTable {}

/// 置換表
pub struct TranspositionTable {
    /// クラスターの配列
    table: ClusterTable,
    /// クラスター数
    cluster_count: usize,
    /// 世代カウンター（下位3bitは使用しない）
    generation8: AtomicU8,
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize) -> Self {
        let cluster_count =
            (mb_size * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(2);
        Self {
            table: ClusterTable::new(cluster_count),
            cluster_count,
            generation8: AtomicU8::new(0),
        }
    }

    /// サイズを変更
    ///
    /// 探索停止中にのみ呼ぶこと。同一サイズなら何もしない。
    pub fn resize(&mut self, mb_size: usize) {
        let new_count = (mb_size * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(2);
        if new_count != self.cluster_count {
            self.table = ClusterTable::new(new_count);
            self.cluster_count = new_count;
        }
    }

    /// クリア（ワーカースレッドで分担してゼロ埋め）
    pub fn clear(&mut self, threads: usize) {
        self.generation8.store(0, Ordering::Relaxed);
        let len = self.table.len();
        let threads = threads.max(1);

        if threads == 1 || len < threads * 1024 {
            for cluster in self.table.iter_mut() {
                *cluster = Cluster::new();
            }
            return;
        }

        let chunk = len.div_ceil(threads);
        let ptr_addr = self.table.as_mut_ptr() as usize;

        std::thread::scope(|scope| {
            for i in 0..threads {
                let start = i * chunk;
                if start >= len {
                    break;
                }
                let count = (start + chunk).min(len) - start;
                scope.spawn(move || unsafe {
                    let ptr = (ptr_addr as *mut Cluster).add(start);
                    std::ptr::write_bytes(ptr, 0, count);
                });
            }
        });
    }

    /// 新しい探索を開始（世代を進める）
    ///
    /// 下位3bit（pv/bound）はそのままに、世代5bitだけ進む。
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// 置換表を検索（64bitキーで完全マッチング）
    ///
    /// ヒット時は世代を現在値へ更新し、指し手は局面で合法性検証してから
    /// 返す。ミス時は置換対象（最も古く浅いエントリ）を書き込み先に選ぶ。
    pub fn probe(&self, key: u64, pos: &Position) -> ProbeResult {
        let cluster = self.cluster_for(key);
        let gen8 = self.generation();

        for entry in &cluster.entries {
            if entry.key64() == key && entry.is_occupied() {
                let mut data = entry.read();
                data.mv = pos.validate_tt_move(data.mv);

                let writer = entry as *const TTEntry as *mut TTEntry;
                // ヒットしたエントリの世代を更新（レースは許容）
                unsafe { (*writer).refresh_generation(gen8) };

                return ProbeResult {
                    found: true,
                    data,
                    writer,
                };
            }
        }

        // 置換するエントリを選択（depth8 − relative_age が最小のもの）
        let mut replace = &cluster.entries[0] as *const TTEntry as *mut TTEntry;
        let mut min_value = i32::MAX;
        for entry in &cluster.entries {
            let value = entry.depth8() as i32 - entry.relative_age(gen8) as i32;
            if value < min_value {
                min_value = value;
                replace = entry as *const TTEntry as *mut TTEntry;
            }
        }

        ProbeResult {
            found: false,
            data: TTData::EMPTY,
            writer: replace,
        }
    }

    /// 置換表の使用率を1000分率で返す
    ///
    /// 先頭1000クラスターをサンプリングして現世代のエントリを数える。
    pub fn hashfull(&self) -> i32 {
        let gen8 = self.generation();
        let sample = 1000.min(self.cluster_count);
        let mut count = 0;
        for cluster in self.table.iter().take(sample) {
            for entry in &cluster.entries {
                if entry.is_occupied() && entry.relative_age(gen8) == 0 {
                    count += 1;
                }
            }
        }
        count / CLUSTER_SIZE as i32
    }

    /// クラスターインデックスを計算（固定小数点乗算ハッシュ)
    #[inline]
    fn cluster_index(&self, key: u64) -> usize {
        ((key as u128 * self.cluster_count as u128) >> 64) as usize
    }

    #[inline]
    fn cluster_for(&self, key: u64) -> &Cluster {
        &self.table[self.cluster_index(key)]
    }

    /// 指定キーのクラスターをプリフェッチ
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let cluster = self.cluster_for(key);

        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::_mm_prefetch;
            _mm_prefetch(cluster as *const _ as *const i8, 3); // _MM_HINT_T0
        }

        #[cfg(not(target_arch = "x86_64"))]
        let _ = cluster;
    }
}

/// probe結果
pub struct ProbeResult {
    /// ヒットしたか
    pub found: bool,
    /// 読み取ったデータ
    pub data: TTData,
    /// 書き込み用エントリ
    writer: *mut TTEntry,
}

impl ProbeResult {
    /// エントリに書き込む
    ///
    /// # Safety
    /// writerはprobe()で取得した有効なポインタ。複数スレッドの書き込みは
    /// 競合しうるが、読み手の検証プロトコルにより許容される。
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &self,
        key: u64,
        value: crate::types::Value,
        is_pv: bool,
        bound: crate::types::Bound,
        depth: crate::types::Depth,
        mv: Move,
        eval: crate::types::Value,
        generation8: u8,
    ) {
        unsafe {
            (*self.writer).save(key, value, is_pv, bound, depth, mv, eval, generation8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bound, Value};

    #[test]
    fn test_tt_new() {
        let tt = TranspositionTable::new(1);
        assert!(tt.cluster_count >= 2);
        assert_eq!(tt.generation(), 0);
    }

    #[test]
    fn test_tt_new_search() {
        let tt = TranspositionTable::new(1);
        tt.new_search();
        assert_eq!(tt.generation(), GENERATION_DELTA);
        tt.new_search();
        assert_eq!(tt.generation(), GENERATION_DELTA * 2);
    }

    #[test]
    fn test_tt_probe_and_write() {
        let pos = Position::startpos();
        let tt = TranspositionTable::new(1);
        let key = pos.key();

        let probe1 = tt.probe(key, &pos);
        assert!(!probe1.found);

        probe1.write(
            key,
            Value::new(50),
            true,
            Bound::Exact,
            10,
            Move::NONE,
            Value::ZERO,
            tt.generation(),
        );

        let probe2 = tt.probe(key, &pos);
        assert!(probe2.found);
        assert_eq!(probe2.data.value, Value::new(50));
        assert_eq!(probe2.data.bound, Bound::Exact);
        assert!(probe2.data.is_pv);
    }

    #[test]
    fn test_tt_move_validation_on_probe() {
        let pos = Position::startpos();
        let tt = TranspositionTable::new(1);
        let key = pos.key();

        // 不正な指し手を書き込んでも、probeで弾かれてNONEになる
        let bogus = Move::from_raw(0x0FFF);
        let probe1 = tt.probe(key, &pos);
        probe1.write(key, Value::new(1), false, Bound::Lower, 4, bogus, Value::ZERO, 0);

        let probe2 = tt.probe(key, &pos);
        assert!(probe2.found);
        assert_eq!(probe2.data.mv, Move::NONE);

        // 合法手はそのまま返る
        let legal = pos.parse_uci_move("e2e4").unwrap();
        probe2.write(key, Value::new(1), false, Bound::Lower, 8, legal, Value::ZERO, 0);
        let probe3 = tt.probe(key, &pos);
        assert_eq!(probe3.data.mv, legal);
    }

    #[test]
    fn test_tt_clear() {
        let pos = Position::startpos();
        let mut tt = TranspositionTable::new(1);
        let key = pos.key();

        let probe1 = tt.probe(key, &pos);
        probe1.write(key, Value::new(100), false, Bound::Lower, 10, Move::NONE, Value::ZERO, 0);

        tt.clear(4);

        let probe2 = tt.probe(key, &pos);
        assert!(!probe2.found);
        assert_eq!(tt.generation(), 0);
    }

    #[test]
    fn test_tt_resize() {
        let mut tt = TranspositionTable::new(1);
        let initial = tt.cluster_count;
        tt.resize(2);
        assert!(tt.cluster_count > initial);
        tt.resize(1);
        assert_eq!(tt.cluster_count, initial);
    }

    #[test]
    fn test_tt_hashfull_counts_current_generation() {
        let pos = Position::startpos();
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.hashfull(), 0);

        let probe = tt.probe(pos.key(), &pos);
        probe.write(
            pos.key(),
            Value::new(1),
            false,
            Bound::Lower,
            4,
            Move::NONE,
            Value::ZERO,
            tt.generation(),
        );
        // 1エントリではまだ0‰のはず（1000クラスターサンプル）
        assert!(tt.hashfull() <= 1);
    }

    #[test]
    fn test_cluster_size() {
        assert_eq!(std::mem::size_of::<Cluster>(), 64);
    }
}
