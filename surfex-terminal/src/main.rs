/// Surfex - point cloud capture from a simulated multi-view scan
///
/// Scans a reference model (STL, or a cube by default) from the vertices of
/// a subdivided icosahedron, merges the samples into a density-controlled
/// point cloud and renders both in the terminal.
/// Controls:
///   - , / . : Camera distance
///   - 1 / 2 : Toggle model / point cloud
///   - [ / ] : Halve / double the resample density, r: resample
///   - s : Save, q / ESC: Quit
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use surfex_core::{
    stl, Camera, Density, GraphicsDevice, HeadlessDevice, Mesh, PolyhedronViewSampler,
};
use surfex_gpu::WgpuDevice;
use surfex_terminal::{ScanSession, SessionConfig, TerminalApp};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Reference model to scan (binary or ASCII STL)
    #[arg(long, short = 'm')]
    model: Option<PathBuf>,
    /// Minimum separation between points, 0.005 <= density < 1.0
    #[arg(long, short = 'd', default_value_t = 0.025)]
    density: f32,
    /// Distance of the scan cameras from the model centre
    #[arg(long, default_value_t = 3.5)]
    distance: f32,
    /// Icosahedron subdivisions for the scan viewpoints
    #[arg(long, default_value_t = 1)]
    subdivisions: u32,
    /// Rays per side of each captured view
    #[arg(long, default_value_t = 64)]
    resolution: u32,
    /// Write the point cloud here once the scan completes
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    /// Log merge and resample diagnostics
    #[arg(long, short = 'v')]
    verbose: bool,
    /// Run the scan without the terminal viewer
    #[arg(long)]
    headless: bool,
    /// Render the headless scan on the GPU into an offscreen target
    #[arg(long, requires = "headless")]
    gpu: bool,
}

fn load_model(path: Option<&PathBuf>) -> anyhow::Result<Mesh> {
    let Some(path) = path else {
        info!("no model given, scanning the default cube");
        return Ok(Mesh::cube(1.0));
    };
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mesh = stl::parse_stl(&data).with_context(|| format!("failed to parse {}", path.display()))?;
    info!("loaded {} triangles from {}", mesh.triangles.len(), path.display());
    Ok(mesh.normalized())
}

/// Offscreen target size for `--gpu` runs
const GPU_TARGET_SIZE: u32 = 512;

fn run_headless<D: GraphicsDevice>(
    device: &mut D,
    sampler: PolyhedronViewSampler,
    config: SessionConfig,
    camera_distance: f32,
) -> anyhow::Result<()> {
    let mut camera = Camera::new(GPU_TARGET_SIZE, GPU_TARGET_SIZE);
    camera.set_distance(camera_distance);
    let (view, projection) = (camera.view_matrix(), camera.projection_matrix());

    let mut session = ScanSession::new(device, sampler, config)?;
    session.start();
    while !session.is_complete() {
        session.tick(device);
        session.draw(device, &projection, &view);
    }
    // One more tick writes the output file
    session.tick(device);

    let assembly = session.finish(device);
    info!("scan finished with {} points", assembly.num_points());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logging to stderr would tear the terminal view, keep it quiet there
    let default_level = if args.headless { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let density = Density::new(args.density)?;
    let mesh = load_model(args.model.as_ref())?;
    let sampler = PolyhedronViewSampler::new(
        mesh.clone(),
        args.distance,
        args.subdivisions,
        args.resolution,
    );
    let config = SessionConfig {
        density,
        output: args.output,
        verbose: args.verbose,
    };

    if args.gpu {
        let mut device = WgpuDevice::headless(GPU_TARGET_SIZE, GPU_TARGET_SIZE)?;
        return run_headless(&mut device, sampler, config, args.distance);
    }
    if args.headless {
        return run_headless(&mut HeadlessDevice::new(), sampler, config, args.distance);
    }

    let mut app = TerminalApp::new(mesh, sampler, config, args.distance)?;
    app.run()?;

    let assembly = app.into_assembly();
    println!(
        "Captured {} points at density {}",
        assembly.num_points(),
        assembly.density()
    );
    Ok(())
}
