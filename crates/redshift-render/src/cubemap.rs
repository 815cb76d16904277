//! Baked six-face environment map sampled by look direction.

use glam::Vec3;

use crate::raster::{RasterError, Rgba};

/// Map a unit direction to a cube face index (0..6) and UV coordinates in [0, 1].
///
/// Face order and orientation follow the GPU cube texture convention:
/// 0=+X, 1=-X, 2=+Y, 3=-Y, 4=+Z, 5=-Z.
pub fn direction_to_cube_face_uv(dir: Vec3) -> (usize, f32, f32) {
    let abs = dir.abs();
    let (face, u, v) = if abs.x >= abs.y && abs.x >= abs.z {
        if dir.x > 0.0 {
            (0, -dir.z / abs.x, -dir.y / abs.x)
        } else {
            (1, dir.z / abs.x, -dir.y / abs.x)
        }
    } else if abs.y >= abs.z {
        if dir.y > 0.0 {
            (2, dir.x / abs.y, dir.z / abs.y)
        } else {
            (3, dir.x / abs.y, -dir.z / abs.y)
        }
    } else if dir.z > 0.0 {
        (4, dir.x / abs.z, -dir.y / abs.z)
    } else {
        (5, -dir.x / abs.z, -dir.y / abs.z)
    };
    (face, u * 0.5 + 0.5, v * 0.5 + 0.5)
}

/// RGBA8 cubemap held on the CPU; uploaded as-is by the GPU warp stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentMap {
    face_size: u32,
    faces: [Vec<u8>; 6],
}

impl EnvironmentMap {
    /// Wrap six faces of `face_size * face_size * 4` bytes each.
    pub fn from_faces(face_size: u32, faces: [Vec<u8>; 6]) -> Result<Self, RasterError> {
        let expected = face_size as usize * face_size as usize * 4;
        if let Some(bad) = faces.iter().find(|f| f.len() != expected || expected == 0) {
            return Err(RasterError::BadLength {
                len: bad.len(),
                expected,
            });
        }
        Ok(Self { face_size, faces })
    }

    /// Every texel set to `color`.
    pub fn uniform(face_size: u32, color: Rgba) -> Self {
        let face_size = face_size.max(1);
        let face: Vec<u8> = color
            .iter()
            .copied()
            .cycle()
            .take(face_size as usize * face_size as usize * 4)
            .collect();
        Self {
            face_size,
            faces: std::array::from_fn(|_| face.clone()),
        }
    }

    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    pub fn face(&self, index: usize) -> Option<&[u8]> {
        self.faces.get(index).map(Vec::as_slice)
    }

    pub fn faces(&self) -> &[Vec<u8>; 6] {
        &self.faces
    }

    /// Nearest-texel lookup. Non-finite or zero directions return transparent.
    pub fn sample(&self, dir: Vec3) -> Rgba {
        if !dir.is_finite() || dir == Vec3::ZERO {
            return [0; 4];
        }
        let (face, u, v) = direction_to_cube_face_uv(dir);
        let size = self.face_size as f32;
        let x = ((u * size) as u32).min(self.face_size - 1);
        let y = ((v * size) as u32).min(self.face_size - 1);
        let o = (y as usize * self.face_size as usize + x as usize) * 4;
        let data = &self.faces[face];
        [data[o], data[o + 1], data[o + 2], data[o + 3]]
    }
}
