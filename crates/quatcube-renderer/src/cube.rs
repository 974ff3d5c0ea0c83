use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use quatcube_config::CubeStyle;

/// Vertex format for cube meshes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl CubeVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // normal
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Corners of the `[-1, 1]³` cube.
pub const CUBE_VERTICES: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [1.0, 1.0, -1.0],
];

/// Index pairs into `CUBE_VERTICES`.
pub const CUBE_EDGES: [(u32, u32); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Outward normal plus two in-plane axes with `u × v = normal`.
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y, Vec3::Z),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::Z, Vec3::X),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y, Vec3::X),
];

/// A cube mesh and the topology it is drawn with.
pub struct CubeMesh {
    pub vertices: Vec<CubeVertex>,
    pub indices: Vec<u32>,
    pub topology: wgpu::PrimitiveTopology,
}

pub fn mesh_for(style: CubeStyle) -> CubeMesh {
    match style {
        CubeStyle::Wireframe => wireframe_mesh(),
        CubeStyle::Solid => solid_mesh(),
    }
}

/// The 12 cube edges as a line list.
pub fn wireframe_mesh() -> CubeMesh {
    let vertices = CUBE_VERTICES
        .iter()
        .map(|&position| CubeVertex {
            position,
            normal: Vec3::from(position).normalize().to_array(),
        })
        .collect();
    let indices = CUBE_EDGES.iter().flat_map(|&(a, b)| [a, b]).collect();

    CubeMesh {
        vertices,
        indices,
        topology: wgpu::PrimitiveTopology::LineList,
    }
}

/// Six flat faces, two counter-clockwise triangles each.
pub fn solid_mesh() -> CubeMesh {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in FACES {
        let base = vertices.len() as u32;
        for corner in [normal - u - v, normal + u - v, normal + u + v, normal - u + v] {
            vertices.push(CubeVertex {
                position: corner.to_array(),
                normal: normal.to_array(),
            });
        }
        indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    CubeMesh {
        vertices,
        indices,
        topology: wgpu::PrimitiveTopology::TriangleList,
    }
}
