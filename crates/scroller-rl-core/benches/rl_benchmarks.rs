use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scroller_rl_core::{
    combinations, ActionUniverse, CounterTrendAnalyser, FrameShape, HudRead, RewardInput,
    RewardMemory, RewardModel, Symbol, WorldState,
};

fn bench_memory_update(c: &mut Criterion) {
    let actions = combinations(&Symbol::BASIC, 2);
    c.bench_function("reward_memory_update", |b| {
        let mut memory = RewardMemory::new();
        let mut i = 0usize;
        b.iter(|| {
            let action = &actions[i % actions.len()];
            i += 1;
            black_box(memory.update(action, 0.5));
        });
    });
}

fn bench_universe_draw(c: &mut Criterion) {
    let mut universe = ActionUniverse::new(combinations(&Symbol::BASIC, 2)).unwrap();
    let stuck = universe.actions()[0].clone();
    for _ in 0..3 {
        universe.record_outcome(&stuck, false);
    }
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("universe_draw", |b| {
        b.iter(|| black_box(universe.draw(&mut rng)));
    });
}

fn bench_reward_compute(c: &mut Criterion) {
    let mut analyser = CounterTrendAnalyser::default();
    for score in [100, 200, 300, 400] {
        analyser.update(&["3".to_string(), score.to_string()]);
    }
    let prev = WorldState {
        player_pos: Some((100.0, 200.0)),
        enemy_positions: Some(vec![(130.0, 200.0), (240.0, 180.0)]),
        coins: Some(4),
        ..WorldState::default()
    };
    let next = WorldState {
        player_pos: Some((110.0, 196.0)),
        enemy_positions: Some(vec![(128.0, 200.0), (236.0, 180.0)]),
        coins: Some(5),
        ..WorldState::default()
    };
    let before = HudRead::new("3 400");
    let after = HudRead::new("3 500");
    let model = RewardModel::default();

    c.bench_function("reward_compute", |b| {
        b.iter(|| {
            let input = RewardInput {
                prev: &prev,
                next: &next,
                hud_before: Some(&before),
                hud_after: Some(&after),
                analyser: &analyser,
                frame: FrameShape::new(240, 256),
                displacement: WorldState::displacement(&prev, &next),
            };
            black_box(model.compute(black_box(&input)))
        });
    });
}

fn bench_analyser_update(c: &mut Criterion) {
    let reads: Vec<Vec<String>> = (0..32u32)
        .map(|i| vec!["3".to_string(), format!("{:06}", i * 100), format!("{:02}", i % 7)])
        .collect();
    c.bench_function("analyser_update", |b| {
        let mut analyser = CounterTrendAnalyser::default();
        let mut i = 0usize;
        b.iter(|| {
            let read = &reads[i % reads.len()];
            i += 1;
            black_box(analyser.update(read.as_slice()))
        });
    });
}

criterion_group!(
    benches,
    bench_memory_update,
    bench_analyser_update,
    bench_universe_draw,
    bench_reward_compute
);
criterion_main!(benches);
