/// Terminal front end: renders the capture of a reference model and the
/// growing point cloud as ASCII
use crossterm::{
    cursor,
    event::{self, Event},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use log::{error, warn};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use surfex_core::{
    Camera, GpuError, Mesh, PointCloudAssembly, RotationState, SampleSource, Transform,
};

pub mod input;
pub mod renderer;
pub mod session;

pub use input::{command_for_key, Command};
pub use renderer::AsciiRenderer;
pub use session::{ScanSession, SessionConfig};

/// Main application struct for the terminal capture viewer
pub struct TerminalApp<S> {
    mesh: Mesh,
    session: ScanSession<S>,
    rotation: RotationState,
    camera: Camera,
    renderer: AsciiRenderer,
    show_model: bool,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
    status: String,
}

impl<S: SampleSource> TerminalApp<S> {
    pub fn new(
        mesh: Mesh,
        source: S,
        config: SessionConfig,
        camera_distance: f32,
    ) -> anyhow::Result<Self> {
        let (width, height) = terminal::size()?;
        // Leave the top row for the status line
        let rows = height.saturating_sub(1).max(1);
        let mut renderer = AsciiRenderer::new(width as usize, rows as usize);
        let session = ScanSession::new(&mut renderer, source, config)
            .map_err(|e: GpuError| anyhow::anyhow!("point renderer setup failed: {e}"))?;

        let mut camera = Camera::new(width as u32, rows as u32 * 2);
        if !camera.set_distance(camera_distance) {
            warn!("camera distance {} below minimum, keeping {}", camera_distance, camera.distance());
        }

        Ok(Self {
            mesh,
            session,
            rotation: RotationState::zero(),
            camera,
            renderer,
            show_model: true,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
            status: String::new(),
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        self.session.start();
        // The scan hides the reference model so the cloud is visible
        self.show_model = false;
        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    pub fn session(&self) -> &ScanSession<S> {
        &self.session
    }

    /// Tear down the point mirror and hand back the assembled cloud.
    pub fn into_assembly(mut self) -> PointCloudAssembly {
        self.session.finish(&mut self.renderer)
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                if let Event::Key(key) = event::read()? {
                    if let Some(command) = command_for_key(&key) {
                        self.apply(command);
                    }
                }
            }

            self.session.tick(&mut self.renderer);
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Quit => self.running = false,
            Command::Zoom(delta) => {
                let distance = self.camera.distance() + delta;
                if !self.camera.set_distance(distance) {
                    self.status = format!("camera distance floor {:.1}", self.camera.distance());
                }
            }
            Command::Rotate { dx, dy, dz } => self.rotation.rotate(dx, dy, dz),
            Command::ToggleModel => self.show_model = !self.show_model,
            Command::TogglePoints => self.session.toggle_points(),
            Command::ScaleDensity(factor) => {
                self.session.scale_pending_density(factor);
                self.status = format!("resample density {}", self.session.pending_density());
            }
            Command::Resample => match self.session.resample_pending(&mut self.renderer) {
                Ok(count) => self.status = format!("sampled {count} points"),
                Err(e) => {
                    warn!("{}", e);
                    self.status = e.to_string();
                }
            },
            Command::Save => match self.session.save() {
                Some(Ok(())) => self.status = "saved".to_string(),
                Some(Err(e)) => {
                    error!("save failed: {}", e);
                    self.status = format!("save failed: {e}");
                }
                None => self.status = "no output path set (--output)".to_string(),
            },
        }
    }

    fn render(&mut self) -> io::Result<()> {
        let model = Transform::rotation_matrix(&self.rotation);
        let view = self.camera.view_matrix();
        let projection = self.camera.projection_matrix();

        self.renderer.clear();
        if self.show_model {
            self.renderer.render_mesh(&self.mesh, &model, &view, &projection);
        }
        self.session.mirror_mut().set_model_matrix(model);
        self.session.draw(&mut self.renderer, &projection, &view);

        // Output to terminal
        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 1))?;
        self.renderer.draw(&mut stdout)?;

        // Status line
        let assembly = self.session.assembly();
        let phase = if self.session.is_complete() { "done" } else { "scanning" };
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "Surfex | {} | {} pts @ {} | FPS {:.1} | ,/. zoom 1 model 2 points [/] density r resample s save q quit | {}",
                phase,
                assembly.num_points(),
                assembly.density(),
                self.fps,
                self.status,
            )),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}
