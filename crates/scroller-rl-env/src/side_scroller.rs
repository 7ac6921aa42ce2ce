//! In-process side-scrolling game
//!
//! A small platformer rendered into RGB frames so the agent can be run end
//! to end without a real emulator. The player walks, runs and jumps over a
//! flat ground strip; enemies walk in from the right and can be stomped;
//! coins and power-ups float above the ground. Crossing three quarters of
//! the screen scrolls the level. Row 0 of every frame is a HUD strip that
//! encodes the counters as pixels (see [`crate::perception::read_hud_strip`]).

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use scroller_rl_core::{Actuator, Frame, RLError, Result, Symbol};

use crate::perception::{encode_hud_strip, ColourKeys, Rgb};

const PLAYER_SIZE: (f64, f64) = (8.0, 12.0);
const ENEMY_SIZE: (f64, f64) = (10.0, 10.0);
const COIN_SIZE: (f64, f64) = (4.0, 4.0);
const POWERUP_SIZE: (f64, f64) = (6.0, 6.0);
const START_X: f64 = 24.0;
/// Idle ticks allowed after an action for a jump to land
const SETTLE_TICKS: u32 = 120;

const SKY: Rgb = [92, 148, 252];
const GROUND: Rgb = [200, 76, 12];

/// Simulator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideScrollerConfig {
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,
    /// Row where the ground starts
    pub ground_y: usize,
    /// Seconds of game time per physics tick
    pub tick_seconds: f64,
    /// Upper bound on ticks simulated for one action
    pub max_ticks_per_act: u32,
    /// Walking speed in pixels per tick
    pub walk_speed: f64,
    /// Speed multiplier while `shift` is held
    pub run_multiplier: f64,
    /// Initial upward speed of a jump
    pub jump_velocity: f64,
    /// Downward acceleration per tick
    pub gravity: f64,
    /// Enemies kept alive at once
    pub enemies: usize,
    /// Mean enemy walking speed
    pub enemy_speed: f64,
    /// Coins kept on screen
    pub coins: usize,
    /// Chance of a power-up appearing on each scroll
    pub powerup_chance: f64,
    /// Lives at the start of a game
    pub lives: u32,
    /// Timer value at the start of a life
    pub timer: u32,
    /// Ticks per timer unit
    pub ticks_per_timer_unit: u32,
    /// Captures that show the dark respawn screen after a life is lost
    pub respawn_frames: u32,
    /// Seed for spawning; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SideScrollerConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 240,
            ground_y: 208,
            tick_seconds: 1.0 / 60.0,
            max_ticks_per_act: 240,
            walk_speed: 1.0,
            run_multiplier: 2.0,
            jump_velocity: 5.0,
            gravity: 0.3,
            enemies: 2,
            enemy_speed: 0.5,
            coins: 4,
            powerup_chance: 0.3,
            lives: 3,
            timer: 400,
            ticks_per_timer_unit: 24,
            respawn_frames: 3,
            seed: None,
        }
    }
}

/// Counters and positions of the simulated game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimStatus {
    /// Player centre
    pub player: (f64, f64),
    /// Remaining lives
    pub lives: u32,
    /// Score
    pub score: u32,
    /// Coins collected
    pub coins: u32,
    /// Power-ups collected
    pub powerups: u32,
    /// Remaining time
    pub timer: u32,
    /// Enemies currently on screen
    pub visible_enemies: usize,
    /// Enemies stomped this game
    pub stomped: u32,
    /// Level scrolls this game
    pub screens: u32,
    /// Whether the respawn screen is showing
    pub respawning: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Input {
    left: bool,
    right: bool,
    run: bool,
    jump: bool,
}

impl Input {
    fn from_symbols(symbols: &[Symbol]) -> Self {
        let mut input = Self::default();
        for symbol in symbols {
            match symbol {
                Symbol::Left => input.left = true,
                Symbol::Right => input.right = true,
                Symbol::Shift => input.run = true,
                Symbol::Up | Symbol::Alt | Symbol::Space => input.jump = true,
                // no effect in this game
                Symbol::Down | Symbol::Ctrl | Symbol::Enter => {}
            }
        }
        input
    }
}

#[derive(Debug, Clone)]
struct Enemy {
    x: f64,
    y: f64,
    speed: f64,
}

#[derive(Debug)]
struct World {
    config: SideScrollerConfig,
    rng: StdRng,
    player: (f64, f64),
    vy: f64,
    on_ground: bool,
    enemies: Vec<Enemy>,
    coins: Vec<(f64, f64)>,
    powerups: Vec<(f64, f64)>,
    lives: u32,
    score: u32,
    coin_count: u32,
    powerup_count: u32,
    timer: u32,
    timer_ticks: u32,
    stomped: u32,
    screens: u32,
    respawn_frames: u32,
    frames: u64,
    open: bool,
}

impl World {
    fn new(config: SideScrollerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut world = Self {
            player: (START_X, 0.0),
            vy: 0.0,
            on_ground: true,
            enemies: Vec::new(),
            coins: Vec::new(),
            powerups: Vec::new(),
            lives: config.lives,
            score: 0,
            coin_count: 0,
            powerup_count: 0,
            timer: config.timer,
            timer_ticks: 0,
            stomped: 0,
            screens: 0,
            respawn_frames: 0,
            frames: 0,
            open: true,
            rng,
            config,
        };
        world.player.1 = world.ground_centre();
        world.populate();
        world
    }

    fn ground_centre(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let ground = self.config.ground_y as f64;
        ground - PLAYER_SIZE.1 / 2.0
    }

    #[allow(clippy::cast_precision_loss)]
    fn width(&self) -> f64 {
        self.config.width as f64
    }

    fn populate(&mut self) {
        while self.enemies.len() < self.config.enemies {
            let enemy = self.spawn_enemy();
            self.enemies.push(enemy);
        }
        while self.coins.len() < self.config.coins {
            let coin = self.spawn_floating(0.25);
            self.coins.push(coin);
        }
    }

    fn spawn_enemy(&mut self) -> Enemy {
        let width = self.width();
        let mean = self.config.enemy_speed;
        let speed = Normal::new(mean, mean * 0.2)
            .map(|d| d.sample(&mut self.rng))
            .unwrap_or(mean)
            .max(0.1);
        #[allow(clippy::cast_precision_loss)]
        let ground = self.config.ground_y as f64;
        Enemy {
            x: width + self.rng.gen_range(0.0..width / 2.0),
            y: ground - ENEMY_SIZE.1 / 2.0,
            speed,
        }
    }

    /// Random position above the ground, right of `from` (a fraction of the width)
    fn spawn_floating(&mut self, from: f64) -> (f64, f64) {
        let width = self.width();
        #[allow(clippy::cast_precision_loss)]
        let ground = self.config.ground_y as f64;
        (
            self.rng.gen_range(width * from..width - 8.0),
            self.rng.gen_range(ground - 50.0..ground - 16.0),
        )
    }

    /// Advance one tick. Returns false when the tick cost a life.
    fn tick(&mut self, input: Input) -> bool {
        let cfg = &self.config;
        let speed = cfg.walk_speed * if input.run { cfg.run_multiplier } else { 1.0 };
        let mut vx = 0.0;
        if input.right {
            vx += speed;
        }
        if input.left {
            vx -= speed;
        }
        let half_w = PLAYER_SIZE.0 / 2.0;
        let prev_bottom = self.player.1 + PLAYER_SIZE.1 / 2.0;
        self.player.0 = (self.player.0 + vx).clamp(half_w, self.width() - half_w);

        if input.jump && self.on_ground {
            self.vy = -cfg.jump_velocity;
            self.on_ground = false;
        }
        self.vy += cfg.gravity;
        self.player.1 += self.vy;
        let ground = self.ground_centre();
        if self.player.1 >= ground {
            self.player.1 = ground;
            self.vy = 0.0;
            self.on_ground = true;
        }
        let ceiling = 1.0 + PLAYER_SIZE.1 / 2.0;
        if self.player.1 < ceiling {
            self.player.1 = ceiling;
            self.vy = 0.0;
        }

        for enemy in &mut self.enemies {
            enemy.x -= enemy.speed;
        }
        if !self.resolve_enemies(prev_bottom) {
            return false;
        }
        self.collect();
        self.enemies.retain(|e| e.x > -ENEMY_SIZE.0);
        self.populate();

        if self.player.0 > self.width() * 0.75 {
            self.scroll();
        }

        self.timer_ticks += 1;
        if self.timer_ticks >= self.config.ticks_per_timer_unit {
            self.timer_ticks = 0;
            self.timer = self.timer.saturating_sub(1);
            if self.timer == 0 {
                self.lose_life();
                return false;
            }
        }
        true
    }

    fn resolve_enemies(&mut self, prev_bottom: f64) -> bool {
        let player = self.player;
        let mut stomped = Vec::new();
        for (i, enemy) in self.enemies.iter().enumerate() {
            if !overlaps(player, PLAYER_SIZE, (enemy.x, enemy.y), ENEMY_SIZE) {
                continue;
            }
            let enemy_top = enemy.y - ENEMY_SIZE.1 / 2.0;
            if self.vy > 0.0 && prev_bottom <= enemy_top + 2.0 {
                stomped.push(i);
            } else {
                self.lose_life();
                return false;
            }
        }
        for i in stomped.into_iter().rev() {
            self.enemies.remove(i);
            self.stomped += 1;
            self.score += 200;
            self.vy = -self.config.jump_velocity / 2.0;
        }
        true
    }

    fn collect(&mut self) {
        let player = self.player;
        let before = self.coins.len();
        self.coins.retain(|&c| !overlaps(player, PLAYER_SIZE, c, COIN_SIZE));
        let gained = u32::try_from(before - self.coins.len()).unwrap_or(0);
        self.coin_count = (self.coin_count + gained).min(99);
        self.score += 10 * gained;

        let before = self.powerups.len();
        self.powerups.retain(|&p| !overlaps(player, PLAYER_SIZE, p, POWERUP_SIZE));
        let gained = u32::try_from(before - self.powerups.len()).unwrap_or(0);
        self.powerup_count = (self.powerup_count + gained).min(9);
        self.score += 50 * gained;
    }

    fn scroll(&mut self) {
        let shift = self.width() / 2.0;
        self.player.0 -= shift;
        for enemy in &mut self.enemies {
            enemy.x -= shift;
        }
        self.enemies.retain(|e| e.x > -ENEMY_SIZE.0);
        for coin in &mut self.coins {
            coin.0 -= shift;
        }
        self.coins.retain(|c| c.0 > 0.0);
        for powerup in &mut self.powerups {
            powerup.0 -= shift;
        }
        self.powerups.retain(|p| p.0 > 0.0);

        self.screens += 1;
        self.score += 100;
        if self.rng.gen::<f64>() < self.config.powerup_chance {
            let powerup = self.spawn_floating(0.5);
            self.powerups.push(powerup);
        }
        self.populate();
        tracing::trace!(screens = self.screens, "Level scrolled");
    }

    fn lose_life(&mut self) {
        self.lives = self.lives.saturating_sub(1);
        self.respawn_frames = self.config.respawn_frames;
        self.player = (START_X, self.ground_centre());
        self.vy = 0.0;
        self.on_ground = true;
        self.timer = self.config.timer;
        self.timer_ticks = 0;
        self.enemies.clear();
        self.populate();
        tracing::debug!(lives = self.lives, "Player lost a life");

        if self.lives == 0 {
            tracing::debug!(score = self.score, "Game over, starting a new game");
            self.lives = self.config.lives;
            self.score = 0;
            self.coin_count = 0;
            self.powerup_count = 0;
            self.stomped = 0;
            self.screens = 0;
        }
    }

    fn act(&mut self, symbols: &[Symbol], duration: Duration) {
        if self.respawn_frames > 0 {
            return;
        }
        let input = Input::from_symbols(symbols);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = ((duration.as_secs_f64() / self.config.tick_seconds - 1e-6).ceil() as u32)
            .clamp(1, self.config.max_ticks_per_act.max(1));
        for _ in 0..ticks {
            if !self.tick(input) {
                return;
            }
        }
        for _ in 0..SETTLE_TICKS {
            if self.on_ground {
                break;
            }
            if !self.tick(Input::default()) {
                return;
            }
        }
    }

    fn render(&mut self, keys: &ColourKeys) -> Frame {
        let (h, w) = (self.config.height, self.config.width);
        let mut pixels = Array3::<u8>::zeros((h, w, 3));
        self.frames += 1;

        if self.respawn_frames > 0 {
            self.respawn_frames -= 1;
        } else {
            let ground = self.config.ground_y.min(h);
            for y in 1..h {
                let colour = if y < ground { SKY } else { GROUND };
                for x in 0..w {
                    for (c, &v) in colour.iter().enumerate() {
                        pixels[[y, x, c]] = v;
                    }
                }
            }
            for &coin in &self.coins {
                fill_rect(&mut pixels, coin, COIN_SIZE, keys.coin);
            }
            for &powerup in &self.powerups {
                fill_rect(&mut pixels, powerup, POWERUP_SIZE, keys.powerup);
            }
            for enemy in &self.enemies {
                fill_rect(&mut pixels, (enemy.x, enemy.y), ENEMY_SIZE, keys.enemy);
            }
            fill_rect(&mut pixels, self.player, PLAYER_SIZE, keys.player);
        }

        let tokens = [
            self.lives.to_string(),
            format!("{:06}", self.score.min(999_999)),
            format!("{:02}", self.coin_count),
            self.powerup_count.to_string(),
            format!("{:03}", self.timer),
        ];
        encode_hud_strip(&mut pixels, &tokens);
        Frame::new(pixels, self.frames)
    }

    fn status(&self) -> SimStatus {
        let width = self.width();
        SimStatus {
            player: self.player,
            lives: self.lives,
            score: self.score,
            coins: self.coin_count,
            powerups: self.powerup_count,
            timer: self.timer,
            visible_enemies: self
                .enemies
                .iter()
                .filter(|e| e.x + ENEMY_SIZE.0 / 2.0 >= 0.0 && e.x - ENEMY_SIZE.0 / 2.0 < width)
                .count(),
            stomped: self.stomped,
            screens: self.screens,
            respawning: self.respawn_frames > 0,
        }
    }
}

fn overlaps(a: (f64, f64), a_size: (f64, f64), b: (f64, f64), b_size: (f64, f64)) -> bool {
    (a.0 - b.0).abs() * 2.0 < a_size.0 + b_size.0 && (a.1 - b.1).abs() * 2.0 < a_size.1 + b_size.1
}

/// Draw an axis-aligned rectangle centred on `centre`, clipped below the HUD row
fn fill_rect(pixels: &mut Array3<u8>, centre: (f64, f64), size: (f64, f64), colour: Rgb) {
    let (h, w, _) = pixels.dim();
    #[allow(clippy::cast_possible_truncation)]
    let (x0, y0) = (
        (centre.0 - size.0 / 2.0).round() as i64,
        (centre.1 - size.1 / 2.0).round() as i64,
    );
    #[allow(clippy::cast_possible_truncation)]
    let (rw, rh) = (size.0 as i64, size.1 as i64);
    for y in y0.max(1)..(y0 + rh).min(h as i64) {
        for x in x0.max(0)..(x0 + rw).min(w as i64) {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let (yu, xu) = (y as usize, x as usize);
            for (c, &v) in colour.iter().enumerate() {
                pixels[[yu, xu, c]] = v;
            }
        }
    }
}

/// Handle to a shared simulated game.
///
/// Clones drive the same world, so one handle can act while another
/// captures.
#[derive(Debug, Clone)]
pub struct SideScroller {
    world: Arc<Mutex<World>>,
    keys: ColourKeys,
}

impl SideScroller {
    /// Start a new game
    #[must_use]
    pub fn new(config: SideScrollerConfig) -> Self {
        Self {
            world: Arc::new(Mutex::new(World::new(config))),
            keys: ColourKeys::default(),
        }
    }

    fn world(&self) -> Result<MutexGuard<'_, World>> {
        let world = self
            .world
            .lock()
            .map_err(|_| RLError::EnvironmentUnavailable("simulator state poisoned".into()))?;
        if world.open {
            Ok(world)
        } else {
            Err(RLError::EnvironmentUnavailable("simulator window closed".into()))
        }
    }

    /// Render the current screen
    pub fn capture(&self) -> Result<Frame> {
        let keys = self.keys;
        Ok(self.world()?.render(&keys))
    }

    /// Counters and positions, for inspection
    pub fn status(&self) -> Result<SimStatus> {
        Ok(self.world()?.status())
    }

    /// Whether the game window is still available
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.world().is_ok()
    }

    /// Make the game unavailable to every handle
    pub fn close(&self) {
        if let Ok(mut world) = self.world.lock() {
            world.open = false;
        }
    }

    /// Colours used for sprites
    #[must_use]
    pub fn colour_keys(&self) -> ColourKeys {
        self.keys
    }
}

#[async_trait]
impl Actuator for SideScroller {
    async fn act(&mut self, symbols: &[Symbol], duration: Duration) -> Result<()> {
        self.world()?.act(symbols, duration);
        tracing::trace!(?symbols, ?duration, "Simulated input");
        Ok(())
    }
}
