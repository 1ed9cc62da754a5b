//! Benchmark for the versioned leaderboard.
//!
//! Measures registration throughput (two path copies per call), rank
//! queries, and rollback cost.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use podium::ranking::Leaderboard;

fn populated_board(players: i64) -> Leaderboard {
    let mut board = Leaderboard::new();
    for step in 0..players {
        // A few hundred distinct ratings, so ties occur at every size.
        board.register(format!("player-{step:06}"), (step * 197) % 512);
    }
    board
}

// =============================================================================
// register Benchmark
// =============================================================================

fn benchmark_register(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("register");

    for players in [100i64, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(players),
            &players,
            |bencher, &players| {
                bencher.iter(|| black_box(populated_board(players)));
            },
        );
    }

    group.finish();
}

// =============================================================================
// rank Benchmark
// =============================================================================

fn benchmark_rank(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("rank");

    for players in [100i64, 1000, 10000] {
        let board = populated_board(players);
        let names: Vec<String> = (0..players).map(|step| format!("player-{step:06}")).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(players),
            &players,
            |bencher, _| {
                bencher.iter(|| {
                    for name in &names {
                        black_box(board.rank(name));
                    }
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// rollback Benchmark
// =============================================================================

fn benchmark_rollback(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("rollback");

    for players in [1000i64, 10000] {
        let board = populated_board(players);

        group.bench_with_input(
            BenchmarkId::from_parameter(players),
            &players,
            |bencher, &players| {
                bencher.iter(|| {
                    let mut fork = board.clone();
                    fork.rollback(usize::try_from(players / 2).expect("fits"));
                    black_box(fork)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_register, benchmark_rank, benchmark_rollback);
criterion_main!(benches);
