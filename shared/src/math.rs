//! Plain-data math shared by the parsers and the registry
//!
//! Tags, bones and bounds are stored as fixed-size float arrays so model
//! types stay `serde`-friendly and independent of any vector library.

use serde::{Deserialize, Serialize};

/// Bone transform as read from MDR frames: a 3×3 rotation block with the
/// translation in the fourth column of each row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct BoneMatrix3x4 {
    pub row0: [f32; 4],
    pub row1: [f32; 4],
    pub row2: [f32; 4],
}

impl BoneMatrix3x4 {
    pub const IDENTITY: Self = Self::from_rows(
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    );

    pub const fn from_rows(row0: [f32; 4], row1: [f32; 4], row2: [f32; 4]) -> Self {
        Self { row0, row1, row2 }
    }

    /// The twelve floats in file order, row by row
    pub fn to_array(&self) -> [f32; 12] {
        let mut out = [0.0; 12];
        for (chunk, row) in out.chunks_exact_mut(4).zip([&self.row0, &self.row1, &self.row2]) {
            chunk.copy_from_slice(row);
        }
        out
    }

    /// Inverse of [`BoneMatrix3x4::to_array`]
    pub fn from_array(values: [f32; 12]) -> Self {
        let row = |i: usize| [values[i], values[i + 1], values[i + 2], values[i + 3]];
        Self::from_rows(row(0), row(4), row(8))
    }

    /// Row `i` of the matrix
    #[inline]
    pub fn row(&self, i: usize) -> &[f32; 4] {
        match i {
            0 => &self.row0,
            1 => &self.row1,
            _ => &self.row2,
        }
    }

    /// Translation column (tx, ty, tz)
    #[inline]
    pub fn translation(&self) -> [f32; 3] {
        [self.row0[3], self.row1[3], self.row2[3]]
    }

    /// Extract a tag orientation: origin is the translation column and
    /// `axis[j][k] = m[k][j]` (the rotation block transposed).
    pub fn to_orientation(&self) -> Orientation {
        let mut axis = [[0.0; 3]; 3];
        for (j, out) in axis.iter_mut().enumerate() {
            for (k, value) in out.iter_mut().enumerate() {
                *value = self.row(k)[j];
            }
        }
        Orientation {
            origin: self.translation(),
            axis,
        }
    }
}

/// Origin plus three axis rows. Tags and resolved bones both use this.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub origin: [f32; 3],
    pub axis: [[f32; 3]; 3],
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Orientation {
    /// Zero origin, identity axes
    pub const IDENTITY: Self = Self {
        origin: [0.0; 3],
        axis: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Linear blend between two orientations.
    ///
    /// Origin and each axis row are blended with `back = 1 - frac` and
    /// `front = frac`, then every axis row is re-normalized.
    pub fn lerp(start: &Self, end: &Self, frac: f32) -> Self {
        let front = frac;
        let back = 1.0 - frac;
        let mut out = Self::IDENTITY;
        for i in 0..3 {
            out.origin[i] = start.origin[i] * back + end.origin[i] * front;
            for row in 0..3 {
                out.axis[row][i] = start.axis[row][i] * back + end.axis[row][i] * front;
            }
        }
        for row in out.axis.iter_mut() {
            *row = normalize3(*row);
        }
        out
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
}

impl Bounds {
    pub const fn new(mins: [f32; 3], maxs: [f32; 3]) -> Self {
        Self { mins, maxs }
    }

    /// Blend both corners with `back = 1 - frac`, `front = frac`
    pub fn lerp(start: &Self, end: &Self, frac: f32) -> Self {
        let front = frac;
        let back = 1.0 - frac;
        let mut out = Self::default();
        for i in 0..3 {
            out.mins[i] = start.mins[i] * back + end.mins[i] * front;
            out.maxs[i] = start.maxs[i] * back + end.maxs[i] * front;
        }
        out
    }
}

/// Normalize a vector, leaving a zero vector unchanged
#[inline]
pub fn normalize3(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        return v;
    }
    let inv = 1.0 / len;
    [v[0] * inv, v[1] * inv, v[2] * inv]
}

/// Forward, right and up vectors for (pitch, yaw, roll) in degrees
pub fn angle_vectors(angles: [f32; 3]) -> ([f32; 3], [f32; 3], [f32; 3]) {
    let (sy, cy) = angles[1].to_radians().sin_cos();
    let (sp, cp) = angles[0].to_radians().sin_cos();
    let (sr, cr) = angles[2].to_radians().sin_cos();

    let forward = [cp * cy, cp * sy, -sp];
    let right = [
        -sr * sp * cy + cr * sy,
        -sr * sp * sy - cr * cy,
        -sr * cp,
    ];
    let up = [cr * sp * cy + sr * sy, cr * sp * sy - sr * cy, cr * cp];
    (forward, right, up)
}

/// Axis rows for (pitch, yaw, roll) in degrees: forward, left, up
pub fn angles_to_axis(angles: [f32; 3]) -> [[f32; 3]; 3] {
    let (forward, right, up) = angle_vectors(angles);
    [forward, [-right[0], -right[1], -right[2]], up]
}

/// `a * b` for 3x3 row matrices
pub fn multiply_axes(a: &[[f32; 3]; 3], b: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}
