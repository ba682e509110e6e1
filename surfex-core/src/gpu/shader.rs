/// Point shader descriptors and the stock WGSL programs
use super::{GpuError, PointVertex};

/// A `Float32x3` vertex attribute read from [`PointVertex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub location: u32,
    pub offset: u64,
}

/// Description of a point-rendering program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointShader {
    pub label: &'static str,
    /// WGSL source with a `vs_main` vertex and `fs_main` fragment entry.
    pub source: &'static str,
    pub attributes: &'static [VertexAttribute],
    pub uniforms: &'static [&'static str],
}

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

const POSITION: VertexAttribute = VertexAttribute {
    name: "position",
    location: 0,
    offset: 0,
};

const NORMAL: VertexAttribute = VertexAttribute {
    name: "normal",
    location: 1,
    offset: 12,
};

const MATRICES: &[&str] = &["model", "view", "projection"];

/// Unlit points in a single colour.
pub const POINT_SHADER: PointShader = PointShader {
    label: "points",
    source: include_str!("points.wgsl"),
    attributes: &[POSITION],
    uniforms: MATRICES,
};

/// Points shaded by their normal against a headlight.
pub const LIT_POINT_SHADER: PointShader = PointShader {
    label: "lit points",
    source: include_str!("lit_points.wgsl"),
    attributes: &[POSITION, NORMAL],
    uniforms: MATRICES,
};

impl PointShader {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Checks the interface every backend relies on. Backends with a real
    /// shader compiler run it in addition to this.
    pub fn validate(&self) -> Result<(), GpuError> {
        let fail = |reason: String| GpuError::ShaderCompilation {
            label: self.label.to_string(),
            reason,
        };

        if !self.attributes.contains(&POSITION) {
            return Err(fail("missing `position` attribute at location 0".into()));
        }
        for (i, a) in self.attributes.iter().enumerate() {
            if a.offset + 12 > PointVertex::SIZE {
                return Err(fail(format!("attribute `{}` reads past the vertex", a.name)));
            }
            if self.attributes[..i].iter().any(|b| b.location == a.location) {
                return Err(fail(format!("location {} bound twice", a.location)));
            }
        }
        if let Some(missing) = MATRICES.iter().find(|m| !self.uniforms.contains(*m)) {
            return Err(fail(format!("missing `{missing}` uniform")));
        }
        for entry in [VERTEX_ENTRY, FRAGMENT_ENTRY] {
            if !self.source.contains(&format!("fn {entry}(")) {
                return Err(fail(format!("missing entry point `{entry}`")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_shaders_validate() {
        POINT_SHADER.validate().unwrap();
        LIT_POINT_SHADER.validate().unwrap();
        assert!(LIT_POINT_SHADER.has_attribute("normal"));
        assert!(!POINT_SHADER.has_attribute("normal"));
    }

    #[test]
    fn test_rejects_broken_interfaces() {
        let no_position = PointShader {
            attributes: &[NORMAL],
            ..POINT_SHADER
        };
        assert!(no_position.validate().is_err());

        let clash = PointShader {
            attributes: &[
                POSITION,
                VertexAttribute {
                    name: "normal",
                    location: 0,
                    offset: 12,
                },
            ],
            ..POINT_SHADER
        };
        assert!(clash.validate().is_err());

        let no_projection = PointShader {
            uniforms: &["model", "view"],
            ..POINT_SHADER
        };
        assert!(no_projection.validate().is_err());

        let no_entry = PointShader {
            source: "@vertex fn main() {}",
            ..POINT_SHADER
        };
        assert!(matches!(
            no_entry.validate(),
            Err(GpuError::ShaderCompilation { .. })
        ));
    }
}
