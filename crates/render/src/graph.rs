use std::convert::Infallible;

use turntable_scene::{Camera, SceneGraph};

/// Number of half-resolution blur levels in the bloom chain.
pub const BLOOM_LEVELS: usize = 5;

/// Separable Gaussian kernel radius per blur level, finest first.
pub const BLUR_KERNEL_RADII: [u32; BLOOM_LEVELS] = [3, 5, 7, 9, 11];

/// Pipeline exposure before the frame controller supplies one: 1.5^4.
pub const DEFAULT_EXPOSURE: f32 = 5.0625;

/// Bloom shape parameters, fixed when the pipeline is built.
///
/// Runtime exposure is deliberately absent; it changes per frame and rides
/// in through [`StageExecutor::run_composition`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    /// Overall bloom intensity multiplier.
    pub strength: f32,
    /// Blur-level weighting skew in [0, 1]; higher favors the wide levels.
    pub radius: f32,
    /// Luminance cutoff for the bright-pass extraction.
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 2.0,
            radius: 1.0,
            threshold: 0.0,
        }
    }
}

impl BloomSettings {
    /// Composite weight for blur level `level`, 0 being the finest.
    ///
    /// Each level has a fixed falloff factor; `radius` slides it toward its
    /// mirror around 0.6, and `strength` scales the result.
    pub fn level_weight(&self, level: usize) -> f32 {
        const FACTORS: [f32; BLOOM_LEVELS] = [1.0, 0.8, 0.6, 0.4, 0.2];
        let factor = FACTORS[level];
        self.strength * (factor + (1.2 - 2.0 * factor) * self.radius)
    }
}

/// Identity of one extraction run's output. Strictly increasing per
/// executor, so "composition consumed this frame's extraction" is a plain
/// equality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetVersion(pub u64);

/// Backend executing the two bloom stages.
///
/// The executor owns targets and pipelines. It never mutates the scene;
/// scene truth is controller-owned.
pub trait StageExecutor {
    type Error;

    /// Stage 1: render the scene, extract regions above the luminance
    /// threshold, blur them down the level chain, and composite the
    /// weighted levels into the bloom target. Returns the version this run
    /// produced.
    fn run_extraction(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
    ) -> Result<TargetVersion, Self::Error>;

    /// Stage 2: render the base scene, add the named bloom target on top,
    /// and tone map with the frame's exposure into the output.
    fn run_composition(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
        bloom: TargetVersion,
        exposure: f32,
    ) -> Result<(), Self::Error>;
}

/// The fixed two-stage frame: extraction, then composition consuming that
/// same extraction. Owns no GPU state, so the ordering contract is the
/// whole of its job.
#[derive(Debug, Clone, Default)]
pub struct BloomGraph {
    settings: BloomSettings,
}

impl BloomGraph {
    pub fn new(settings: BloomSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> BloomSettings {
        self.settings
    }

    /// Render one frame through `executor`.
    pub fn render_frame<E: StageExecutor>(
        &self,
        executor: &mut E,
        scene: &SceneGraph,
        camera: &Camera,
        exposure: f32,
    ) -> Result<TargetVersion, E::Error> {
        let bloom = executor.run_extraction(scene, camera)?;
        executor.run_composition(scene, camera, bloom, exposure)?;
        tracing::trace!(version = bloom.0, exposure, "stages submitted");
        Ok(bloom)
    }
}

/// What a recording executor saw, in call order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageEvent {
    Extraction { version: TargetVersion },
    Composition { bloom: TargetVersion, exposure: f32 },
}

/// Recording executor ... device-free stand-in for the wgpu backend.
///
/// Captures the stage sequence for assertions and headless runs.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    next_version: u64,
    events: Vec<StageEvent>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }
}

impl StageExecutor for RecordingExecutor {
    type Error = Infallible;

    fn run_extraction(
        &mut self,
        _scene: &SceneGraph,
        _camera: &Camera,
    ) -> Result<TargetVersion, Infallible> {
        self.next_version += 1;
        let version = TargetVersion(self.next_version);
        self.events.push(StageEvent::Extraction { version });
        Ok(version)
    }

    fn run_composition(
        &mut self,
        _scene: &SceneGraph,
        _camera: &Camera,
        bloom: TargetVersion,
        exposure: f32,
    ) -> Result<(), Infallible> {
        self.events.push(StageEvent::Composition { bloom, exposure });
        Ok(())
    }
}
