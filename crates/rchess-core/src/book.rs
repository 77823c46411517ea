//! 定跡（Polyglot形式）
//!
//! 16バイト固定長エントリの標準的なPolyglotバイナリを二分探索で引く。
//! エントリはbig-endianで {key: u64, move: u16, weight: u16, learn: u32}。
//! 返す前に合法性を確認し、壊れたエントリは無視する。

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use shakmaty::{Role, Square};

use crate::position::Position;
use crate::types::Move;

const ENTRY_SIZE: u64 = 16;

/// Polyglot定跡ファイル
pub struct OpeningBook {
    file: Option<File>,
}

impl OpeningBook {
    /// ファイルを開く（失敗しても定跡なしとして動く）
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let file = File::open(path.as_ref()).ok();
        if file.is_none() {
            log::warn!("book: could not open {}", path.as_ref().display());
        }
        Self { file }
    }

    /// 定跡なし
    pub fn empty() -> Self {
        Self { file: None }
    }

    /// 定跡が読み込めているか
    pub fn is_loaded(&self) -> bool {
        self.file.is_some()
    }

    /// 局面に対する定跡手を引く
    ///
    /// 同一キーのエントリのうち最大weightの手を返す。
    pub fn probe(&mut self, pos: &Position) -> Option<Move> {
        let key = pos.key();
        let file = self.file.as_mut()?;
        let entries = (file.metadata().ok()?.len() / ENTRY_SIZE) as i64;
        if entries == 0 {
            return None;
        }

        // キーの最初の出現位置を二分探索
        let mut low = 0i64;
        let mut high = entries - 1;
        let mut found = None;
        while low <= high {
            let mid = (low + high) / 2;
            let (entry_key, _, _) = read_entry(file, mid as u64)?;
            if entry_key < key {
                low = mid + 1;
            } else {
                if entry_key == key {
                    found = Some(mid);
                }
                high = mid - 1;
            }
        }

        // 同一キーの中で最大weightの手を選ぶ
        let mut best: Option<(u16, u16)> = None;
        let mut idx = found?;
        while idx < entries {
            let (entry_key, raw_move, weight) = read_entry(file, idx as u64)?;
            if entry_key != key {
                break;
            }
            if best.map_or(true, |(_, w)| weight > w) {
                best = Some((raw_move, weight));
            }
            idx += 1;
        }

        best.and_then(|(raw, _)| decode_polyglot_move(raw, pos))
    }
}

fn read_entry(file: &mut File, idx: u64) -> Option<(u64, u16, u16)> {
    file.seek(SeekFrom::Start(idx * ENTRY_SIZE)).ok()?;
    let mut buf = [0u8; 16];
    file.read_exact(&mut buf).ok()?;
    let key = u64::from_be_bytes(buf[0..8].try_into().ok()?);
    let raw_move = u16::from_be_bytes(buf[8..10].try_into().ok()?);
    let weight = u16::from_be_bytes(buf[10..12].try_into().ok()?);
    Some((key, raw_move, weight))
}

/// Polyglotの指し手符号を復元して合法性を確認する
fn decode_polyglot_move(raw: u16, pos: &Position) -> Option<Move> {
    let to = Square::new(u32::from(raw) & 0x3F);
    let from = Square::new((u32::from(raw) >> 6) & 0x3F);
    let promo = match (raw >> 12) & 0x7 {
        1 => Some(Role::Knight),
        2 => Some(Role::Bishop),
        3 => Some(Role::Rook),
        4 => Some(Role::Queen),
        _ => None,
    };

    // Polyglotのキャスリングは king→rook 表記
    for em in pos.legal_moves() {
        let m = Move::from_engine(&em);
        let matches = if m.is_castling() {
            m.from() == from && m.to() == to
        } else if let Some(p) = promo {
            m.is_promotion() && m.from() == from && m.to() == to && m.promotion_role() == p
        } else {
            !m.is_promotion() && m.from() == from && m.to() == to
        };
        if matches {
            return Some(m);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_book_returns_none() {
        let mut book = OpeningBook::empty();
        let pos = Position::startpos();
        assert!(!book.is_loaded());
        assert!(book.probe(&pos).is_none());
    }

    #[test]
    fn test_probe_finds_highest_weight_entry() {
        let pos = Position::startpos();
        let key = pos.key();

        // e2e4（weight 10）と d2d4（weight 200）を同一キーで書く
        let e2e4: u16 = ((Square::E2 as u16) << 6) | Square::E4 as u16;
        let d2d4: u16 = ((Square::D2 as u16) << 6) | Square::D4 as u16;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        for (mv, weight) in [(e2e4, 10u16), (d2d4, 200u16)] {
            tmp.write_all(&key.to_be_bytes()).unwrap();
            tmp.write_all(&mv.to_be_bytes()).unwrap();
            tmp.write_all(&weight.to_be_bytes()).unwrap();
            tmp.write_all(&0u32.to_be_bytes()).unwrap();
        }
        tmp.flush().unwrap();

        let mut book = OpeningBook::open(tmp.path());
        assert!(book.is_loaded());
        let m = book.probe(&pos).unwrap();
        assert_eq!(Position::move_to_uci(m, false), "d2d4");
    }

    #[test]
    fn test_probe_rejects_illegal_entry() {
        let pos = Position::startpos();
        let key = pos.key();

        // e2e5 は非合法
        let e2e5: u16 = ((Square::E2 as u16) << 6) | Square::E5 as u16;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&key.to_be_bytes()).unwrap();
        tmp.write_all(&e2e5.to_be_bytes()).unwrap();
        tmp.write_all(&1u16.to_be_bytes()).unwrap();
        tmp.write_all(&0u32.to_be_bytes()).unwrap();
        tmp.flush().unwrap();

        let mut book = OpeningBook::open(tmp.path());
        assert!(book.probe(&pos).is_none());
    }
}
