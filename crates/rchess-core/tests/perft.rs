//! perftの固定値テスト
//!
//! 数え上げは探索・評価・置換表から独立しており、スレッド数や
//! ハッシュサイズに依存せず決定的であること。

use rchess_core::Position;

#[test]
fn perft_startpos() {
    let pos = Position::startpos();
    assert_eq!(pos.perft(1), 20);
    assert_eq!(pos.perft(2), 400);
    assert_eq!(pos.perft(3), 8_902);
    assert_eq!(pos.perft(4), 197_281);
}

#[test]
#[ignore = "slow; run with --ignored"]
fn perft_startpos_depth5() {
    let pos = Position::startpos();
    assert_eq!(pos.perft(5), 4_865_609);
}

#[test]
fn perft_kiwipete() {
    let pos = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        false,
    )
    .unwrap();
    assert_eq!(pos.perft(1), 48);
    assert_eq!(pos.perft(2), 2_039);
    assert_eq!(pos.perft(3), 97_862);
}

#[test]
fn perft_en_passant_position() {
    // アンパッサンとプロモーションを含む局面
    let pos = Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", false).unwrap();
    assert_eq!(pos.perft(1), 14);
    assert_eq!(pos.perft(2), 191);
    assert_eq!(pos.perft(3), 2_812);
    assert_eq!(pos.perft(4), 43_238);
}

#[test]
fn perft_independent_of_position_history() {
    // 同じ局面なら、そこへ至る手順に依らず同じ値になる
    let direct = Position::from_fen(
        "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        false,
    )
    .unwrap();

    let mut played = Position::startpos();
    played.do_uci_move("e2e4").unwrap();
    played.do_uci_move("e7e5").unwrap();

    for d in 1..=3 {
        assert_eq!(direct.perft(d), played.perft(d));
    }
}
