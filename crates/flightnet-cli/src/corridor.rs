//! Headless scrolling corridor for training runs.
//!
//! Two walls scroll from right to left past a column of ships. The walls
//! follow a smooth noise curve and start flat at every generation. Each ship
//! senses the walls with five rays (up, up-right, right, down-right, down) and
//! crashes when it touches either wall. The score rises by one every
//! [`SHIFTS_PER_SCORE`] wall shifts, and the gap between the walls narrows
//! every [`GAP_INTERVAL`] points until it reaches [`MIN_GAP`].

use std::collections::VecDeque;

use anyhow::ensure;
use flightnet_evolution::{
    Action, Environment, FitnessSource as _, GenerationEvent, GenerationObserver, Scorekeeper,
};
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use tracing::trace;

/// Number of distance sensors per ship.
pub const RAY_COUNT: usize = 5;
/// Distance reported by a ray that hits nothing.
const RAY_LENGTH: f32 = 22.0;
const RAY_STEP: f32 = 0.05;

const SEGMENT_COUNT: usize = 250;
const SEGMENT_WIDTH: f32 = 0.25;
const SHIP_X: f32 = 4.0;
const SHIP_HALF_HEIGHT: f32 = 0.2;
const SHIP_NOSE: f32 = 0.4;
const SHIP_SPEED: f32 = 0.12;

const INITIAL_GAP: f32 = 4.0;
const MIN_GAP: f32 = 1.25;
const GAP_STEP: f32 = 0.025;
const GAP_INTERVAL: i32 = 50;
const SHIFTS_PER_SCORE: u32 = 10;

const NOISE_RESOLUTION: f32 = 0.125;
const NOISE_AMPLITUDE: f32 = 4.25;

/// Score at generation start. Ships hold still until it turns positive.
pub const STARTING_SCORE: i32 = -3;

/// Checks that networks expecting `sensor_count` sensor values can fly here.
pub fn check_sensor_count(sensor_count: usize) -> anyhow::Result<()> {
    ensure!(
        sensor_count == RAY_COUNT,
        "the corridor provides {RAY_COUNT} ray sensors, but the network topology expects {sensor_count}"
    );
    Ok(())
}

/// Smooth 1D value noise producing wall center offsets.
#[derive(Debug, Clone)]
struct WallNoise {
    position: f32,
    left: f32,
    right: f32,
}

impl WallNoise {
    fn new(rng: &mut Pcg32) -> Self {
        Self {
            position: 0.0,
            left: rng.random(),
            right: rng.random(),
        }
    }

    fn next_offset(&mut self, rng: &mut Pcg32) -> f32 {
        self.position += NOISE_RESOLUTION;
        while self.position >= 1.0 {
            self.position -= 1.0;
            self.left = self.right;
            self.right = rng.random();
        }
        let t = self.position;
        let smooth = t * t * (3.0 - 2.0 * t);
        (self.left + (self.right - self.left) * smooth - 0.5) * NOISE_AMPLITUDE
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ship {
    y: f32,
    crashed: bool,
}

impl Ship {
    const START: Self = Self {
        y: 0.0,
        crashed: false,
    };
}

#[derive(Debug, Clone)]
pub struct Corridor {
    rng: Pcg32,
    noise: WallNoise,
    /// Wall center offset per segment, leftmost first.
    offsets: VecDeque<f32>,
    gap: f32,
    shifts_since_score: u32,
    ships: Vec<Ship>,
}

impl Corridor {
    /// Creates a corridor with one ship per roster slot.
    pub fn new(ship_count: usize, seed: Option<u64>) -> Self {
        let mut rng = seed.map_or_else(Pcg32::from_os_rng, Pcg32::seed_from_u64);
        let noise = WallNoise::new(&mut rng);
        Self {
            rng,
            noise,
            offsets: VecDeque::from(vec![0.0; SEGMENT_COUNT]),
            gap: INITIAL_GAP,
            shifts_since_score: 0,
            ships: vec![Ship::START; ship_count],
        }
    }

    /// Flattens the walls and puts every ship back at the start.
    fn reset(&mut self) {
        self.noise = WallNoise::new(&mut self.rng);
        self.offsets.iter_mut().for_each(|offset| *offset = 0.0);
        self.gap = INITIAL_GAP;
        self.shifts_since_score = 0;
        self.ships.fill(Ship::START);
    }

    /// Scrolls the walls by one segment and updates the score.
    pub fn advance(&mut self, score: &mut Scorekeeper) {
        self.offsets.pop_front();
        self.offsets.push_back(self.noise.next_offset(&mut self.rng));

        self.shifts_since_score += 1;
        if self.shifts_since_score >= SHIFTS_PER_SCORE {
            self.shifts_since_score = 0;
            score.increment(1);
            if score.score() % GAP_INTERVAL == 0 && self.gap > MIN_GAP {
                self.gap = (self.gap - GAP_STEP).max(MIN_GAP);
                trace!(gap = self.gap, "corridor narrowed");
            }
        }

        for slot in 0..self.ships.len() {
            self.check_collision(slot);
        }
    }

    /// Crashes every ship still flying.
    pub fn crash_all(&mut self) {
        for ship in &mut self.ships {
            ship.crashed = true;
        }
    }

    /// Lower and upper wall heights at `x`, or `None` past the visible corridor.
    fn walls_at(&self, x: f32) -> Option<(f32, f32)> {
        if x < 0.0 {
            return None;
        }
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let segment = (x / SEGMENT_WIDTH) as usize;
        let center = *self.offsets.get(segment)?;
        let half_gap = self.gap / 2.0;
        Some((center - half_gap, center + half_gap))
    }

    fn check_collision(&mut self, slot: usize) {
        let ship = self.ships[slot];
        if ship.crashed {
            return;
        }
        if let Some((lower, upper)) = self.walls_at(SHIP_X)
            && (ship.y + SHIP_HALF_HEIGHT >= upper || ship.y - SHIP_HALF_HEIGHT <= lower)
        {
            self.ships[slot].crashed = true;
        }
    }

    fn cast_ray(&self, origin: (f32, f32), direction: (f32, f32)) -> f32 {
        let mut distance = 0.0;
        while distance < RAY_LENGTH {
            let x = origin.0 + direction.0 * distance;
            let y = origin.1 + direction.1 * distance;
            if let Some((lower, upper)) = self.walls_at(x)
                && (y >= upper || y <= lower)
            {
                return distance;
            }
            distance += RAY_STEP;
        }
        RAY_LENGTH
    }
}

impl GenerationObserver for Corridor {
    fn generation_started(&mut self, _event: &GenerationEvent) {
        self.reset();
    }
}

impl Environment for Corridor {
    fn sense(&mut self, slot: usize, sensors: &mut Vec<f32>) {
        let y = self.ships[slot].y;
        let diagonal = std::f32::consts::FRAC_1_SQRT_2;
        let nose = (SHIP_X + SHIP_NOSE, y);
        sensors.extend([
            self.cast_ray((SHIP_X, y + SHIP_HALF_HEIGHT), (0.0, 1.0)),
            self.cast_ray(nose, (diagonal, diagonal)),
            self.cast_ray(nose, (1.0, 0.0)),
            self.cast_ray(nose, (diagonal, -diagonal)),
            self.cast_ray((SHIP_X, y - SHIP_HALF_HEIGHT), (0.0, -1.0)),
        ]);
    }

    fn act(&mut self, slot: usize, action: Action) {
        self.ships[slot].y += action.direction() * SHIP_SPEED;
        self.check_collision(slot);
    }

    fn is_terminated(&self, slot: usize) -> bool {
        self.ships[slot].crashed
    }
}
