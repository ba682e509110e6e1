/// In-memory graphics device for tests and runs without a GPU
use rustc_hash::FxHashMap;

use super::{BufferId, DrawPoints, GpuError, GraphicsDevice, PointShader, PointVertex, ProgramId};

/// CPU-side storage for programs and vertex buffers.
///
/// Software backends build on this to get GL-style handle bookkeeping.
#[derive(Debug, Default)]
pub struct ResourceStore {
    programs: Vec<Option<PointShader>>,
    buffers: FxHashMap<BufferId, Vec<u8>>,
    next_buffer: u32,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_program(&mut self, shader: &PointShader) -> Result<ProgramId, GpuError> {
        shader.validate()?;
        self.programs.push(Some(*shader));
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    pub fn program(&self, id: ProgramId) -> Option<&PointShader> {
        self.programs.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn destroy_program(&mut self, id: ProgramId) {
        if let Some(slot) = self.programs.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    pub fn live_programs(&self) -> usize {
        self.programs.iter().flatten().count()
    }

    pub fn create_buffer(&mut self, size: u64) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, vec![0; size as usize]);
        id
    }

    pub fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(storage) = self.buffers.get_mut(&buffer) else {
            panic!("write to unknown buffer {buffer:?}");
        };
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= storage.len(),
            "write of {} bytes at {} overruns buffer {:?} of {} bytes",
            data.len(),
            start,
            buffer,
            storage.len()
        );
        storage[start..end].copy_from_slice(data);
    }

    pub fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    pub fn buffer(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// The first `count` vertices stored in `buffer`.
    pub fn vertices(&self, buffer: BufferId, count: u32) -> impl Iterator<Item = PointVertex> + '_ {
        self.buffer(buffer)
            .unwrap_or(&[])
            .chunks_exact(PointVertex::SIZE as usize)
            .take(count as usize)
            .map(bytemuck::pod_read_unaligned::<PointVertex>)
    }
}

/// A device without a graphics context: resources live in memory and draw
/// calls are recorded instead of rasterized.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    store: ResourceStore,
    draws: Vec<DrawPoints>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn draws(&self) -> &[DrawPoints] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawPoints> {
        std::mem::take(&mut self.draws)
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_program(&mut self, shader: &PointShader) -> Result<ProgramId, GpuError> {
        self.store.create_program(shader)
    }

    fn create_vertex_buffer(&mut self, size: u64) -> BufferId {
        self.store.create_buffer(size)
    }

    fn write_vertex_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        self.store.write_buffer(buffer, offset, data);
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.store.destroy_buffer(buffer);
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.store.destroy_program(program);
    }

    fn draw_points(&mut self, draw: &DrawPoints) {
        self.draws.push(*draw);
    }
}
