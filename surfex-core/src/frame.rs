/// Per-frame samples and the sources that produce them
use nalgebra::{Point3, Vector3};

/// One capture step worth of `(position, normal)` samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, position: Point3<f32>, normal: Vector3<f32>) {
        self.positions.push(position);
        self.normals.push(normal);
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point3<f32>, &Vector3<f32>)> {
        self.positions.iter().zip(self.normals.iter())
    }
}

impl FromIterator<(Point3<f32>, Vector3<f32>)> for Frame {
    fn from_iter<I: IntoIterator<Item = (Point3<f32>, Vector3<f32>)>>(iter: I) -> Self {
        let mut frame = Frame::new();
        for (p, n) in iter {
            frame.push(p, n);
        }
        frame
    }
}

/// Produces frames of samples on demand.
pub trait SampleSource {
    /// Capture the next frame. Returns `true` once the sequence is exhausted;
    /// the frame captured by that call is still available.
    fn draw_next_frame(&mut self) -> bool;

    /// Samples of the most recently captured frame.
    fn current_frame(&self) -> &Frame;

    /// Total number of frames in the sequence, if known.
    fn frame_count(&self) -> Option<usize> {
        None
    }
}

/// Replays a prepared list of frames.
#[derive(Debug, Clone, Default)]
pub struct VecSampleSource {
    frames: Vec<Frame>,
    next: usize,
    empty: Frame,
}

impl VecSampleSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            next: 0,
            empty: Frame::new(),
        }
    }
}

impl SampleSource for VecSampleSource {
    fn draw_next_frame(&mut self) -> bool {
        if self.next < self.frames.len() {
            self.next += 1;
        }
        self.next >= self.frames.len()
    }

    fn current_frame(&self) -> &Frame {
        match self.next.checked_sub(1) {
            Some(i) => &self.frames[i],
            None => &self.empty,
        }
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.frames.len())
    }
}
