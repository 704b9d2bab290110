//! Encoding and decoding functions for compressed bone data

use tagmesh_shared::BoneMatrix3x4;

// ============================================================================
// Bone Matrix Codec
// ============================================================================

/// Size of one compressed 3x4 bone matrix (12 × u16)
pub const COMPRESSED_BONE_SIZE: usize = 24;

/// Bias subtracted from every stored field (half the u16 range)
pub const BONE_FIELD_BIAS: i32 = 1 << 15;

/// Scale applied to the three translation fields
pub const BONE_TRANSLATION_SCALE: f32 = 1.0 / 64.0;

/// Scale applied to the nine rotation fields
pub const BONE_ROTATION_SCALE: f32 = 1.0 / ((1 << 15) - 2) as f32;

#[inline]
fn field(comp: &[u8; COMPRESSED_BONE_SIZE], i: usize) -> f32 {
    let raw = u16::from_le_bytes([comp[i * 2], comp[i * 2 + 1]]) as i32;
    (raw - BONE_FIELD_BIAS) as f32
}

/// Decode a compressed bone matrix.
///
/// Field layout (u16 little-endian each):
/// `[tx, ty, tz, m00, m01, m02, m10, m11, m12, m20, m21, m22]`.
/// Every field decodes as `(raw - 32768) * scale`; the function is total.
pub fn decompress_bone_matrix(comp: &[u8; COMPRESSED_BONE_SIZE]) -> BoneMatrix3x4 {
    let t = BONE_TRANSLATION_SCALE;
    let r = BONE_ROTATION_SCALE;
    BoneMatrix3x4::from_rows(
        [field(comp, 3) * r, field(comp, 4) * r, field(comp, 5) * r, field(comp, 0) * t],
        [field(comp, 6) * r, field(comp, 7) * r, field(comp, 8) * r, field(comp, 1) * t],
        [field(comp, 9) * r, field(comp, 10) * r, field(comp, 11) * r, field(comp, 2) * t],
    )
}

/// Quantize a bone matrix into the compressed layout.
///
/// Values outside the representable range are clamped.
pub fn compress_bone_matrix(matrix: &BoneMatrix3x4) -> [u8; COMPRESSED_BONE_SIZE] {
    fn quantize(value: f32, scale: f32) -> [u8; 2] {
        let raw = (value / scale).round() as i32 + BONE_FIELD_BIAS;
        (raw.clamp(0, u16::MAX as i32) as u16).to_le_bytes()
    }

    let fields = [
        quantize(matrix.row0[3], BONE_TRANSLATION_SCALE),
        quantize(matrix.row1[3], BONE_TRANSLATION_SCALE),
        quantize(matrix.row2[3], BONE_TRANSLATION_SCALE),
        quantize(matrix.row0[0], BONE_ROTATION_SCALE),
        quantize(matrix.row0[1], BONE_ROTATION_SCALE),
        quantize(matrix.row0[2], BONE_ROTATION_SCALE),
        quantize(matrix.row1[0], BONE_ROTATION_SCALE),
        quantize(matrix.row1[1], BONE_ROTATION_SCALE),
        quantize(matrix.row1[2], BONE_ROTATION_SCALE),
        quantize(matrix.row2[0], BONE_ROTATION_SCALE),
        quantize(matrix.row2[1], BONE_ROTATION_SCALE),
        quantize(matrix.row2[2], BONE_ROTATION_SCALE),
    ];

    let mut out = [0u8; COMPRESSED_BONE_SIZE];
    for (chunk, bytes) in out.chunks_exact_mut(2).zip(fields) {
        chunk.copy_from_slice(&bytes);
    }
    out
}

// ============================================================================
// Skeletal Bone Frames (angle encoded)
// ============================================================================

/// Size of one angle-encoded bone frame record (6 × i16)
pub const BONE_FRAME_SIZE: usize = 12;

/// Degrees per i16 step
pub const SHORT_ANGLE_SCALE: f32 = 360.0 / 65536.0;

/// One bone's pose in a skeletal frame.
///
/// `angles` holds pitch, yaw, roll (the fourth short is padding) and
/// `ofs_angles` holds the pitch and yaw of the direction from the parent
/// bone to this one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressedBoneFrame {
    pub angles: [i16; 4],
    pub ofs_angles: [i16; 2],
}

impl CompressedBoneFrame {
    /// Bone orientation as (pitch, yaw, roll) degrees
    #[inline]
    pub fn angles_degrees(&self) -> [f32; 3] {
        [
            short_to_angle(self.angles[0]),
            short_to_angle(self.angles[1]),
            short_to_angle(self.angles[2]),
        ]
    }

    /// Parent-to-bone direction as (pitch, yaw, 0) degrees
    #[inline]
    pub fn offset_angles_degrees(&self) -> [f32; 3] {
        [
            short_to_angle(self.ofs_angles[0]),
            short_to_angle(self.ofs_angles[1]),
            0.0,
        ]
    }
}

#[inline]
pub fn short_to_angle(value: i16) -> f32 {
    value as f32 * SHORT_ANGLE_SCALE
}

/// Inverse of [`short_to_angle`], wrapping to the i16 range
#[inline]
pub fn angle_to_short(degrees: f32) -> i16 {
    ((degrees / SHORT_ANGLE_SCALE).round() as i32 & 0xFFFF) as u16 as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_decodes_to_negative_bias() {
        let m = decompress_bone_matrix(&[0u8; COMPRESSED_BONE_SIZE]);
        let t = -(BONE_FIELD_BIAS as f32) * BONE_TRANSLATION_SCALE;
        let r = -(BONE_FIELD_BIAS as f32) * BONE_ROTATION_SCALE;
        assert_eq!(m.translation(), [t, t, t]);
        assert_eq!(t, -512.0);
        for row in [m.row0, m.row1, m.row2] {
            assert_eq!(&row[..3], &[r, r, r]);
        }
    }

    #[test]
    fn test_bias_decodes_to_zero() {
        let mut comp = [0u8; COMPRESSED_BONE_SIZE];
        for chunk in comp.chunks_exact_mut(2) {
            chunk.copy_from_slice(&0x8000u16.to_le_bytes());
        }
        let m = decompress_bone_matrix(&comp);
        assert_eq!(m.to_array(), [0.0; 12]);
    }

    #[test]
    fn test_decode_is_pure() {
        let comp: [u8; COMPRESSED_BONE_SIZE] = core::array::from_fn(|i| (i * 37) as u8);
        assert_eq!(decompress_bone_matrix(&comp), decompress_bone_matrix(&comp));
    }

    #[test]
    fn test_field_placement() {
        let mut comp = [0u8; COMPRESSED_BONE_SIZE];
        for chunk in comp.chunks_exact_mut(2) {
            chunk.copy_from_slice(&0x8000u16.to_le_bytes());
        }
        // ty = +64 units -> raw 32768 + 4096
        comp[2..4].copy_from_slice(&(0x8000u16 + 4096).to_le_bytes());
        // m21 (field 10) = +1 step
        comp[20..22].copy_from_slice(&0x8001u16.to_le_bytes());

        let m = decompress_bone_matrix(&comp);
        assert_eq!(m.translation(), [0.0, 64.0, 0.0]);
        assert_eq!(m.row2[1], BONE_ROTATION_SCALE);
        assert_eq!(m.row1[2], 0.0);
    }

    #[test]
    fn test_compress_identity() {
        let comp = compress_bone_matrix(&BoneMatrix3x4::IDENTITY);
        let m = decompress_bone_matrix(&comp);
        for (a, b) in m.to_array().iter().zip(BoneMatrix3x4::IDENTITY.to_array()) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_short_angles() {
        assert_eq!(short_to_angle(0), 0.0);
        assert_eq!(short_to_angle(16384), 90.0);
        assert_eq!(short_to_angle(-16384), -90.0);
        assert_eq!(angle_to_short(90.0), 16384);
        assert_eq!(angle_to_short(-90.0), -16384);
    }
}
