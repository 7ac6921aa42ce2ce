//! Decision loop: capture, decide, act, observe, reward, learn, persist

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::Instrument;
use uuid::Uuid;

use scroller_rl_core::{
    ActionId, ActionUniverse, Actuator, CounterTrendAnalyser, Frame, Perception, RLError, Result,
    RewardBreakdown, RewardInput, RewardMemory, RewardModel, SpecialScreenDetector, WorldState,
};

use crate::config::{AgentConfig, LoopConfig};
use crate::policy::CurriculumPolicy;

/// What happened during one decision step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Episode index
    pub episode: u64,
    /// Action taken
    pub action: ActionId,
    /// Reward terms and total
    pub reward: RewardBreakdown,
    /// Horizontal player displacement
    pub dx: f64,
    /// Vertical player displacement
    pub dy: f64,
    /// Whether the action visibly moved the player
    pub effective: bool,
    /// Exploration rate after decay
    pub epsilon: f64,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier attached to every log line of the run
    pub run_id: Uuid,
    /// Completed decision steps
    pub steps: u64,
    /// Sum of step rewards
    pub total_reward: f64,
    /// Exploration rate at the end
    pub final_epsilon: f64,
    /// Whether the stop flag ended the run
    pub stopped_early: bool,
    /// Best actions by learned value
    pub leaderboard: Vec<(ActionId, f64)>,
    /// Actions excluded for having no effect
    pub blacklisted: Vec<ActionId>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
}

/// Orchestrates one agent run against a set of collaborators.
///
/// All learning state is owned here and handed to the policy and reward
/// model by reference; nothing is global.
pub struct DecisionLoop<P, A, D> {
    perception: P,
    actuator: A,
    detector: D,
    policy: CurriculumPolicy,
    universe: ActionUniverse,
    memory: RewardMemory,
    analyser: CounterTrendAnalyser,
    reward_model: RewardModel,
    config: LoopConfig,
    bad_streak: u32,
    stop: Arc<AtomicBool>,
    run_id: Uuid,
}

impl<P, A, D> DecisionLoop<P, A, D>
where
    P: Perception,
    A: Actuator,
    D: SpecialScreenDetector,
{
    /// Build a loop, restoring the reward table from `config.run.memory_path`
    pub fn new(config: &AgentConfig, perception: P, actuator: A, detector: D) -> Result<Self> {
        let memory = RewardMemory::load(&config.run.memory_path, config.memory);
        Self::with_memory(config, memory, perception, actuator, detector)
    }

    /// Build a loop around an existing reward table
    pub fn with_memory(
        config: &AgentConfig,
        memory: RewardMemory,
        perception: P,
        actuator: A,
        detector: D,
    ) -> Result<Self> {
        config.validate()?;
        let policy = CurriculumPolicy::new(config.policy.clone())?;
        let universe = policy.initial_universe()?;
        let analyser = match &config.run.hud_slot_names {
            Some(names) => CounterTrendAnalyser::with_slot_names(config.run.hud_history, names.clone()),
            None => CounterTrendAnalyser::new(config.run.hud_history),
        };

        Ok(Self {
            perception,
            actuator,
            detector,
            policy,
            universe,
            memory,
            analyser,
            reward_model: RewardModel::new(config.reward.clone()),
            config: config.run.clone(),
            bad_streak: 0,
            stop: Arc::new(AtomicBool::new(false)),
            run_id: Uuid::new_v4(),
        })
    }

    /// Flag that ends the run before the next step once set
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Identifier of this run
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Learned values
    #[must_use]
    pub fn memory(&self) -> &RewardMemory {
        &self.memory
    }

    /// Current candidate actions and blacklist
    #[must_use]
    pub fn universe(&self) -> &ActionUniverse {
        &self.universe
    }

    /// HUD trend state
    #[must_use]
    pub fn analyser(&self) -> &CounterTrendAnalyser {
        &self.analyser
    }

    /// Action selection state
    #[must_use]
    pub fn policy(&self) -> &CurriculumPolicy {
        &self.policy
    }

    /// Current run of consecutive non-positive rewards
    #[must_use]
    pub fn bad_streak(&self) -> u32 {
        self.bad_streak
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Run every configured episode, or until the stop flag is raised.
    ///
    /// Fails without acting when the perception backend is unavailable. The
    /// reward table is saved on every other exit path.
    pub async fn run(&mut self) -> Result<RunReport> {
        let span = tracing::info_span!("run", run_id = %self.run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<RunReport> {
        self.perception.ensure_ready().await.map_err(|e| match e {
            RLError::EnvironmentUnavailable(_) => e,
            other => RLError::EnvironmentUnavailable(other.to_string()),
        })?;

        let started_at = Utc::now();
        tracing::info!(
            episodes = self.config.episodes,
            known_actions = self.memory.len(),
            "Starting run"
        );

        let mut steps = 0;
        let mut total_reward = 0.0;
        let mut stopped_early = false;
        let mut failure = None;

        for episode in 0..self.config.episodes {
            if self.stopped() {
                stopped_early = true;
                break;
            }
            match self.step(episode).await {
                Ok(Some(outcome)) => {
                    steps += 1;
                    total_reward += outcome.reward.total;
                }
                Ok(None) => {
                    stopped_early = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(episode, error = %e, "Step failed, ending run");
                    failure = Some(e);
                    break;
                }
            }

            if episode % self.config.checkpoint_every == 0 {
                self.checkpoint(episode);
            }
            let delay = self.config.delay();
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }

        if let Err(e) = self.memory.save(&self.config.memory_path) {
            tracing::error!(error = %e, "Failed to save reward table at shutdown");
        }
        if let Err(e) = self.actuator.release_all().await {
            tracing::warn!(error = %e, "Failed to release inputs");
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let leaderboard = self.memory.leaderboard(self.config.leaderboard_size);
        tracing::info!(steps, total_reward, "Run finished, top actions by value:");
        for (rank, (action, value)) in leaderboard.iter().enumerate() {
            tracing::info!(rank = rank + 1, action = %action, value, usage = self.memory.usage(action), "Leaderboard");
        }

        Ok(RunReport {
            run_id: self.run_id,
            steps,
            total_reward,
            final_epsilon: self.policy.epsilon(),
            stopped_early,
            leaderboard,
            blacklisted: self.universe.blacklist().cloned().collect(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Execute one decision step.
    ///
    /// Returns `None` when the stop flag was raised while waiting out a
    /// special screen.
    pub async fn step(&mut self, episode: u64) -> Result<Option<StepOutcome>> {
        let Some(frame) = self.wait_for_interactive().await? else {
            return Ok(None);
        };
        let shape = frame.shape();
        let prev_state = self.perception.extract_state(&frame);
        let hud_before = self.perception.extract_hud(&frame);
        if prev_state.is_empty() {
            tracing::debug!(episode, "No usable state in frame");
        }

        let action = self
            .policy
            .choose(episode, self.bad_streak, &self.memory, &mut self.universe);
        let duration = self.config.duration_of(&action);
        self.actuator.act(action.symbols(), duration).await?;
        sleep(duration).await;

        let (next_frame, next_state) = self.observe_after(&prev_state, duration).await?;
        let hud_after = self.perception.extract_hud(&next_frame);
        let (dx, dy) = WorldState::displacement(&prev_state, &next_state);
        tracing::debug!(episode, dx, dy, "Movement");

        self.analyser.update(hud_before.tokens().as_slice());
        self.analyser.update(hud_after.tokens().as_slice());

        #[allow(clippy::float_cmp)]
        let effective = !(dx == 0.0 && dy == 0.0);
        if self.universe.record_outcome(&action, effective) {
            #[allow(clippy::cast_precision_loss)]
            let blacklisted = self.universe.blacklist().count() as f64;
            metrics::gauge!("scroller.blacklisted", blacklisted);
        }

        let reward = self.reward_model.compute(&RewardInput {
            prev: &prev_state,
            next: &next_state,
            hud_before: Some(&hud_before),
            hud_after: Some(&hud_after),
            analyser: &self.analyser,
            frame: shape,
            displacement: (dx, dy),
        });
        self.memory.update(&action, reward.total);
        let epsilon = self.policy.decay_epsilon();
        self.bad_streak = if reward.total <= 0.0 { self.bad_streak + 1 } else { 0 };

        tracing::info!(
            episode,
            action = %action,
            reward = reward.total,
            epsilon,
            "Step complete"
        );
        metrics::counter!("scroller.steps", 1);
        metrics::gauge!("scroller.epsilon", epsilon);
        metrics::gauge!("scroller.reward", reward.total);

        Ok(Some(StepOutcome {
            episode,
            action,
            reward,
            dx,
            dy,
            effective,
            epsilon,
        }))
    }

    /// Capture until the frame is not a special screen
    async fn wait_for_interactive(&mut self) -> Result<Option<Frame>> {
        let mut frame = self.perception.capture().await?;
        let mut waited = false;
        while self.detector.is_special(&frame) {
            if self.stopped() {
                return Ok(None);
            }
            if !waited {
                tracing::debug!("Special screen, waiting");
                waited = true;
            }
            sleep(self.config.special_poll()).await;
            frame = self.perception.capture().await?;
        }
        Ok(Some(frame))
    }

    /// Poll until the world state changes or `duration + grace` has passed
    async fn observe_after(
        &mut self,
        prev_state: &WorldState,
        duration: Duration,
    ) -> Result<(Frame, WorldState)> {
        let deadline = Instant::now() + duration + self.config.grace();
        let mut frame = self.perception.capture().await?;
        let mut state = self.perception.extract_state(&frame);
        while state == *prev_state && Instant::now() < deadline {
            sleep(self.config.poll()).await;
            frame = self.perception.capture().await?;
            state = self.perception.extract_state(&frame);
        }
        Ok((frame, state))
    }

    fn checkpoint(&self, episode: u64) {
        match self.memory.save(&self.config.memory_path) {
            Ok(()) => tracing::info!(
                episode,
                path = %self.config.memory_path.display(),
                actions = self.memory.len(),
                "Checkpoint saved"
            ),
            Err(e) => tracing::warn!(episode, error = %e, "Checkpoint failed"),
        }
    }
}
