use std::f32::consts::TAU;

use anyhow::{Result, ensure};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::math::Vector3;

/// One sprite of the particle system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vector3,
    pub velocity: Vector3,
    /// Spin around the view axis, radians.
    pub rotation: f32,
    pub angular_velocity: f32,
    pub scale: f32,
    /// Layer of the sprite atlas, a whole number below the atlas size.
    pub atlas_index: f32,
    /// Camera distance as of the last sort.
    pub distance: f32,
}

/// Spawn distribution and limits of a particle system.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleConfig {
    pub count: usize,
    /// Respawned particles appear at this height, scattered in x and y.
    pub center: Vector3,
    /// Maximum x/y distance from `center` at spawn.
    pub spawn_jitter: f32,
    pub velocity_min: Vector3,
    pub velocity_max: Vector3,
    /// Spin is drawn from `[-max_angular_velocity, max_angular_velocity]`.
    pub max_angular_velocity: f32,
    /// Particles falling below this height are respawned.
    pub respawn_height: f32,
    /// Number of sprites in the atlas.
    pub atlas_size: u32,
    pub billboard_scale: f32,
    /// Fixed seed for reproducible runs, entropy otherwise.
    pub seed: Option<u64>,
    /// Spread the initial heights between `respawn_height` and `center.z`
    /// instead of starting every particle at the top.
    pub prewarm: bool,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 100,
            center: Vector3::new(0.0, 0.0, 10.0),
            spawn_jitter: 3.0,
            velocity_min: Vector3::new(-0.5, -0.5, -2.0),
            velocity_max: Vector3::new(0.5, 0.5, -1.0),
            max_angular_velocity: 1.0,
            respawn_height: 0.0,
            atlas_size: 1,
            billboard_scale: 0.2,
            seed: None,
            prewarm: true,
        }
    }
}

impl ParticleConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.count > 0, "particle system needs at least one particle");
        ensure!(self.atlas_size > 0, "atlas size must be positive");
        ensure!(
            self.center.z >= self.respawn_height,
            "spawn height {} is below the respawn height {}",
            self.center.z,
            self.respawn_height
        );
        ensure!(self.spawn_jitter >= 0.0, "spawn jitter must not be negative");
        ensure!(self.billboard_scale > 0.0, "billboard scale must be positive");
        ensure!(
            self.max_angular_velocity >= 0.0,
            "max angular velocity must not be negative"
        );
        for axis in 0..3 {
            ensure!(
                self.velocity_min[axis] <= self.velocity_max[axis],
                "velocity range is empty on axis {axis}"
            );
        }
        Ok(())
    }
}

/// The CPU side of a particle system: state, physics and ordering.
#[derive(Debug)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    config: ParticleConfig,
    rng: StdRng,
}

impl ParticlePool {
    pub fn new(config: ParticleConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let particles = (0..config.count)
            .map(|_| {
                let mut p = spawn(&config, &mut rng);
                if config.prewarm {
                    p.position.z = rng.random_range(config.respawn_height..=config.center.z);
                }
                p
            })
            .collect();
        Ok(Self {
            particles,
            config,
            rng,
        })
    }

    /// A pool with explicit initial state. The count comes from `particles`.
    pub fn with_particles(config: ParticleConfig, particles: Vec<Particle>) -> Result<Self> {
        let config = ParticleConfig {
            count: particles.len(),
            ..config
        };
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            particles,
            config,
            rng,
        })
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Integrates every particle and respawns the ones below the threshold.
    ///
    /// Afterwards every particle is at or above `respawn_height`.
    pub fn update(&mut self, delta: f32) {
        let Self {
            particles,
            config,
            rng,
        } = self;
        for p in particles.iter_mut() {
            p.position += p.velocity * delta;
            p.rotation = (p.rotation + p.angular_velocity * delta).rem_euclid(TAU);
            // negated so a NaN height respawns as well
            if !(p.position.z >= config.respawn_height) {
                *p = spawn(config, rng);
            }
        }
    }

    /// Stable sort, nearest particle first.
    pub fn sort_by_distance(&mut self, eye: Vector3) {
        for p in &mut self.particles {
            p.distance = (p.position - eye).norm();
        }
        self.particles
            .sort_by(|a, b| a.distance.total_cmp(&b.distance));
    }
}

fn spawn(config: &ParticleConfig, rng: &mut StdRng) -> Particle {
    let jitter = config.spawn_jitter;
    let mut offset = |max: f32| {
        if max > 0.0 {
            rng.random_range(-max..=max)
        } else {
            0.0
        }
    };
    let position = Vector3::new(
        config.center.x + offset(jitter),
        config.center.y + offset(jitter),
        config.center.z,
    );
    let angular_velocity = offset(config.max_angular_velocity);
    let (lo, hi) = (config.velocity_min, config.velocity_max);
    let velocity = Vector3::new(
        rng.random_range(lo.x..=hi.x),
        rng.random_range(lo.y..=hi.y),
        rng.random_range(lo.z..=hi.z),
    );
    Particle {
        position,
        velocity,
        rotation: rng.random_range(0.0..TAU),
        angular_velocity,
        scale: config.billboard_scale,
        atlas_index: rng.random_range(0..config.atlas_size) as f32,
        distance: 0.0,
    }
}
