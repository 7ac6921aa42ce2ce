use std::sync::atomic::Ordering;
use std::time::Duration;

use scroller_rl_agent::{AgentConfig, DecisionLoop};
use scroller_rl_core::{ActionId, RLError, RewardMemory, Symbol};
use scroller_rl_env::{DarkScreenDetector, FrameSkip, SideScroller, SideScrollerConfig, SimulatorPerception};

fn fast_config(dir: &std::path::Path, episodes: u64) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.policy.seed = Some(11);
    config.run.episodes = episodes;
    config.run.action_duration = 0.02;
    config.run.grace_period = 0.0;
    config.run.poll_interval = 0.001;
    config.run.special_poll_interval = 0.001;
    config.run.checkpoint_every = 10;
    config.run.memory_path = dir.join("data").join("memory.json");
    config
}

fn simulator() -> SideScroller {
    SideScroller::new(SideScrollerConfig {
        seed: Some(11),
        ..SideScrollerConfig::default()
    })
}

#[tokio::test]
async fn test_full_run_against_simulator() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path(), 40);
    let sim = simulator();
    let perception = FrameSkip::new(SimulatorPerception::new(sim.clone()), 1);

    let mut agent = DecisionLoop::new(&config, perception, sim, DarkScreenDetector::default()).unwrap();
    let report = agent.run().await.unwrap();

    assert_eq!(report.steps, 40);
    assert!(!report.stopped_early);
    assert!(report.final_epsilon < config.policy.epsilon_start);
    assert!(!report.leaderboard.is_empty());
    assert!(report.leaderboard.len() <= config.run.leaderboard_size);
    for pair in report.leaderboard.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }

    let memory = agent.memory();
    for (_, value) in memory.iter() {
        assert!((-10.0..=10.0).contains(&value));
    }

    // `down` never moves the player, so enough uses must blacklist it
    let down = ActionId::single(Symbol::Down);
    if memory.usage(&down) >= 3 {
        assert!(agent.universe().is_blacklisted(&down));
    }

    let restored = RewardMemory::load(&config.run.memory_path, config.memory);
    assert_eq!(restored.len(), memory.len());
    for (action, value) in memory.iter() {
        assert_eq!(restored.value(action).map(f64::to_bits), Some(value.to_bits()));
    }
}

#[tokio::test]
async fn test_missing_window_aborts_without_acting() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path(), 10);
    let sim = simulator();
    sim.close();

    let mut agent =
        DecisionLoop::new(&config, SimulatorPerception::new(sim.clone()), sim, DarkScreenDetector::default())
            .unwrap();
    let err = agent.run().await.unwrap_err();

    assert!(matches!(err, RLError::EnvironmentUnavailable(_)));
    assert!(agent.memory().is_empty());
    assert!(!config.run.memory_path.exists());
}

#[tokio::test]
async fn test_stop_flag_from_another_task() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path(), 100_000);
    let sim = simulator();

    let mut agent =
        DecisionLoop::new(&config, SimulatorPerception::new(sim.clone()), sim, DarkScreenDetector::default())
            .unwrap();
    let stop = agent.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.store(true, Ordering::SeqCst);
    });

    let report = agent.run().await.unwrap();
    assert!(report.stopped_early);
    assert!(report.steps < 100_000);
    assert!(config.run.memory_path.exists());
}

#[tokio::test]
async fn test_learning_resumes_from_saved_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path(), 5);

    let sim = simulator();
    let mut first =
        DecisionLoop::new(&config, SimulatorPerception::new(sim.clone()), sim, DarkScreenDetector::default())
            .unwrap();
    first.run().await.unwrap();
    let learned = first.memory().len();
    assert!(learned > 0);

    let sim = simulator();
    let second =
        DecisionLoop::new(&config, SimulatorPerception::new(sim.clone()), sim, DarkScreenDetector::default())
            .unwrap();
    assert_eq!(second.memory().len(), learned);
}
