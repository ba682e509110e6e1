/// ASCII rasterizer for terminal rendering of the reference mesh and the
/// point cloud mirror
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix4, Point3, Vector3};
use std::io::Write;
use surfex_core::gpu::{BufferId, DrawPoints, GpuError, PointShader, ProgramId, ResourceStore};
use surfex_core::projection::project_to_screen;
use surfex_core::{GraphicsDevice, Mesh, Transform, Triangle};

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Character used for points drawn by an unlit program
const FLAT_POINT: char = 'o';

fn shade(brightness: f32) -> char {
    let index = (brightness.clamp(0.0, 1.0) * (LUMINOSITY_RAMP.len() - 1) as f32) as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

/// ASCII renderer that converts meshes and point draws to terminal
/// characters. Implements [`GraphicsDevice`] so the point mirror can draw
/// into it directly.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
    color_buffer: Vec<Color>,
    resources: ResourceStore,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
            color_buffer: vec![Color::Reset; size],
            resources: ResourceStore::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
        self.color_buffer.fill(Color::Reset);
    }

    /// Character at a cell, for inspection
    pub fn cell(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.char_buffer[y * self.width + x])
    }

    fn plot(&mut self, x: i32, y: i32, depth: f32, character: char, color: Color) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if depth < self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.char_buffer[idx] = character;
            self.color_buffer[idx] = color;
        }
    }

    pub fn render_mesh(
        &mut self,
        mesh: &Mesh,
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) {
        let mvp = Transform::mvp_matrix(model, view, projection);
        let model_view = view * model;
        for triangle in &mesh.triangles {
            self.render_triangle(triangle, &mvp, &model_view);
        }
    }

    fn render_triangle(&mut self, triangle: &Triangle, mvp: &Matrix4<f32>, model_view: &Matrix4<f32>) {
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (coords, vertex) in screen_coords.iter_mut().zip(&triangle.vertices) {
            match project_to_screen(&vertex.position, mvp, self.width, self.height) {
                Some(projected) => *coords = projected,
                None => return, // Triangle is clipped
            }
        }

        // Headlight shading in view space
        let normal = model_view.transform_vector(&triangle.calculate_normal());
        let brightness = normal.normalize().dot(&Vector3::z());
        if brightness <= 0.0 {
            return; // Back face
        }

        let character = shade(brightness);
        let color = match character {
            ' ' | '.' | ':' => Color::DarkGrey,
            '-' | '=' => Color::Grey,
            '+' | '*' => Color::White,
            _ => Color::Cyan,
        };
        self.rasterize_triangle(&screen_coords, character, color);
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], character: char, color: Color) {
        let [v0, v1, v2] = *coords;

        // Bounding box, clipped to screen bounds
        let min_x = (v0.0.min(v1.0).min(v2.0).floor() as i32).max(0);
        let max_x = (v0.0.max(v1.0).max(v2.0).ceil() as i32).min(self.width as i32 - 1);
        let min_y = (v0.1.min(v1.1).min(v2.1).floor() as i32).max(0);
        let max_y = (v0.1.max(v1.1).max(v2.1).ceil() as i32).min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) = barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), p)
                else {
                    continue;
                };
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                    self.plot(x, y, depth, character, color);
                }
            }
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                writer.queue(SetForegroundColor(self.color_buffer[idx]))?;
                writer.queue(Print(self.char_buffer[idx]))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

impl GraphicsDevice for AsciiRenderer {
    fn create_program(&mut self, shader: &PointShader) -> Result<ProgramId, GpuError> {
        self.resources.create_program(shader)
    }

    fn create_vertex_buffer(&mut self, size: u64) -> BufferId {
        self.resources.create_buffer(size)
    }

    fn write_vertex_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        self.resources.write_buffer(buffer, offset, data);
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.resources.destroy_buffer(buffer);
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.resources.destroy_program(program);
    }

    fn draw_points(&mut self, draw: &DrawPoints) {
        let lit = self
            .resources
            .program(draw.program)
            .is_some_and(|shader| shader.has_attribute("normal"));
        let mvp = draw.uniforms.mvp();
        let model_view = Matrix4::from(draw.uniforms.view) * Matrix4::from(draw.uniforms.model);

        let mut fragments = Vec::with_capacity(draw.vertex_count as usize);
        for vertex in self.resources.vertices(draw.vertex_buffer, draw.vertex_count) {
            let Some((x, y, depth)) =
                project_to_screen(&Point3::from(vertex.position), &mvp, self.width, self.height)
            else {
                continue;
            };
            let character = if lit {
                let normal = model_view.transform_vector(&Vector3::from(vertex.normal));
                shade(0.2 + 0.8 * normal.normalize().z.max(0.0))
            } else {
                FLAT_POINT
            };
            fragments.push((x.floor() as i32, y.floor() as i32, depth, character));
        }

        for (x, y, depth, character) in fragments {
            // Points win depth ties against the surface they were sampled from
            self.plot(x, y, depth - 1e-4, character, Color::Yellow);
        }
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
