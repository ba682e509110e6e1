/// Point list export in an OBJ-like text format.
///
/// Each point is one line, `v x y z nx ny nz`. Lines starting with `#` are
/// comments. No faces are written.
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use nom::{
    bytes::complete::tag,
    character::complete::{space0, space1},
    combinator::all_consuming,
    number::complete::float,
    sequence::preceded,
    IResult,
};
use thiserror::Error;

use crate::assembly::PointCloudView;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed point on line {line}: {content:?}")]
    Parse { line: usize, content: String },
}

/// Points read back from a point file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointList {
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl PointList {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub fn write_points<W: Write>(writer: &mut W, cloud: PointCloudView<'_>) -> io::Result<()> {
    writeln!(writer, "# surfex point cloud")?;
    writeln!(writer, "# {} points", cloud.len())?;
    for (p, n) in cloud.iter() {
        writeln!(writer, "v {} {} {} {} {} {}", p.x, p.y, p.z, n.x, n.y, n.z)?;
    }
    Ok(())
}

pub fn write_points_file(path: &Path, cloud: PointCloudView<'_>) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_points(&mut writer, cloud)?;
    writer.flush()?;
    Ok(())
}

fn point_line(input: &str) -> IResult<&str, [f32; 6]> {
    let (mut input, _) = preceded(space0, tag("v"))(input)?;
    let mut values = [0.0f32; 6];
    for value in &mut values {
        let (rest, v) = preceded(space1, float)(input)?;
        *value = v;
        input = rest;
    }
    let (input, _) = all_consuming(space0)(input)?;
    Ok((input, values))
}

pub fn read_points(text: &str) -> Result<PointList, ExportError> {
    let mut points = PointList::default();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Ok((_, [x, y, z, nx, ny, nz])) = point_line(trimmed) else {
            return Err(ExportError::Parse {
                line: index + 1,
                content: line.to_string(),
            });
        };
        points.positions.push(Point3::new(x, y, z));
        points.normals.push(Vector3::new(nx, ny, nz));
    }
    Ok(points)
}

pub fn read_points_file(path: &Path) -> Result<PointList, ExportError> {
    read_points(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(n: usize) -> (Vec<Point3<f32>>, Vec<Vector3<f32>>) {
        let positions = (0..n)
            .map(|i| {
                let t = i as f32 * 0.37;
                Point3::new(t.sin() * 1.3, t.cos() * -0.25, i as f32 * 1e-3)
            })
            .collect();
        let normals = (0..n)
            .map(|i| Vector3::new(0.0, (i as f32).cos(), (i as f32).sin()))
            .collect();
        (positions, normals)
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        for n in [0, 1, 1000] {
            let (positions, normals) = cloud(n);
            let view = PointCloudView {
                positions: &positions,
                normals: &normals,
            };
            let path = dir.path().join(format!("cloud_{n}.obj"));
            write_points_file(&path, view).unwrap();

            let read = read_points_file(&path).unwrap();
            assert_eq!(read.len(), n);
            for i in 0..n {
                assert!((read.positions[i] - positions[i]).norm() < 1e-6);
                assert!((read.normals[i] - normals[i]).norm() < 1e-6);
            }
        }
    }

    #[test]
    fn test_one_line_per_point() {
        let (positions, normals) = cloud(3);
        let mut out = Vec::new();
        write_points(
            &mut out,
            PointCloudView {
                positions: &positions,
                normals: &normals,
            },
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 3);
    }

    #[test]
    fn test_read_skips_comments_and_reports_bad_lines() {
        let points = read_points("# header\n\nv 1 2 3 0 0 1\n").unwrap();
        assert_eq!(points.positions, vec![Point3::new(1.0, 2.0, 3.0)]);

        match read_points("v 1 2 3\n") {
            Err(ExportError::Parse { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(read_points("v 1 2 3 4 5 6 7\n").is_err());
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let (positions, normals) = cloud(1);
        let view = PointCloudView {
            positions: &positions,
            normals: &normals,
        };
        let result = write_points_file(&dir.path().join("no/such/dir/cloud.obj"), view);
        assert!(matches!(result, Err(ExportError::Io(_))));
    }
}
