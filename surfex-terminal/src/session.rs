/// Capture session: drives a sample source into the assembly and keeps the
/// point mirror in sync, one frame per render tick.
use std::path::PathBuf;

use log::{error, info, warn};
use nalgebra::Matrix4;
use surfex_core::gpu::LIT_POINT_SHADER;
use surfex_core::{
    AssemblyError, Density, ExportError, GpuError, GraphicsDevice, PointCloudAssembly,
    PointCloudMirror, SampleSource,
};

/// Settings for one capture run
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub density: Density,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            density: Density::default(),
            output: None,
            verbose: false,
        }
    }
}

pub struct ScanSession<S> {
    source: S,
    assembly: PointCloudAssembly,
    mirror: PointCloudMirror,
    started: bool,
    complete: bool,
    output: Option<PathBuf>,
    output_done: bool,
    show_points: bool,
    pending_density: Density,
}

impl<S: SampleSource> ScanSession<S> {
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        source: S,
        config: SessionConfig,
    ) -> Result<Self, GpuError> {
        let mut assembly = PointCloudAssembly::with_density(config.density);
        assembly.set_verbose(config.verbose);
        let mirror = PointCloudMirror::new(device, assembly.point_cloud(), &LIT_POINT_SHADER)?;

        Ok(Self {
            source,
            assembly,
            mirror,
            started: false,
            complete: false,
            output: config.output,
            output_done: false,
            show_points: true,
            pending_density: config.density,
        })
    }

    /// Begin consuming frames on subsequent ticks.
    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn assembly(&self) -> &PointCloudAssembly {
        &self.assembly
    }

    pub fn mirror(&self) -> &PointCloudMirror {
        &self.mirror
    }

    pub fn mirror_mut(&mut self) -> &mut PointCloudMirror {
        &mut self.mirror
    }

    pub fn pending_density(&self) -> f32 {
        self.pending_density.get()
    }

    pub fn show_points(&self) -> bool {
        self.show_points
    }

    pub fn toggle_points(&mut self) {
        self.show_points = !self.show_points;
    }

    pub fn set_output(&mut self, path: PathBuf) {
        self.output = Some(path);
        self.output_done = false;
    }

    /// Capture and merge one frame while the sequence runs; afterwards write
    /// the output file once.
    pub fn tick<D: GraphicsDevice>(&mut self, device: &mut D) {
        if self.started && !self.complete {
            self.complete = self.source.draw_next_frame();
            self.assembly.add_data(self.source.current_frame());
            self.mirror.update_points(device, self.assembly.point_cloud());

            if self.complete {
                info!("capture complete: {} points", self.assembly.num_points());
            }
        } else if !self.output_done {
            if let Some(path) = self.output.clone() {
                if let Err(e) = self.save_to(&path) {
                    error!("failed to write {}: {}", path.display(), e);
                }
                self.output_done = true;
            }
        }
    }

    /// Multiply the pending resample density, keeping it in the valid range.
    pub fn scale_pending_density(&mut self, factor: f32) {
        match Density::new(self.pending_density.get() * factor) {
            Ok(density) => self.pending_density = density,
            Err(e) => warn!("{}", e),
        }
    }

    pub fn resample<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        density: f32,
    ) -> Result<usize, AssemblyError> {
        let count = self.assembly.resample(density)?;
        self.mirror.update_points(device, self.assembly.point_cloud());
        info!("sampled {} points", count);
        Ok(count)
    }

    pub fn resample_pending<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
    ) -> Result<usize, AssemblyError> {
        self.resample(device, self.pending_density.get())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ExportError> {
        self.assembly.write_to_file_obj(path)
    }

    /// Save to the configured output path, if any.
    pub fn save(&self) -> Option<Result<(), ExportError>> {
        self.output.as_deref().map(|path| self.save_to(path))
    }

    /// End the session, releasing the mirror's device resources.
    pub fn finish<D: GraphicsDevice>(self, device: &mut D) -> PointCloudAssembly {
        self.mirror.destroy(device);
        self.assembly
    }

    pub fn draw<D: GraphicsDevice>(
        &self,
        device: &mut D,
        projection: &Matrix4<f32>,
        view: &Matrix4<f32>,
    ) {
        if self.show_points {
            self.mirror.draw(device, projection, view);
        }
    }
}
