//! Validation and array readers shared by every parser

use smallvec::SmallVec;
use tagmesh_shared::{Bounds, ModelFormat};

use crate::error::LoadError;
use crate::reader::{ByteReader, Cursor};
use crate::services::SurfaceLimits;

/// Width of every fixed name field
pub const NAME_SIZE: usize = tagmesh_shared::MAX_QPATH;
/// One triangle: three i32 vertex indices
pub const TRIANGLE_SIZE: usize = 12;
/// One texture coordinate: two f32
pub const ST_SIZE: usize = 8;

/// Check the leading ident and version fields against a format table entry
pub fn check_ident_version(ident: u32, version: i32, format: &ModelFormat) -> Result<(), LoadError> {
    if ident != format.ident_le() {
        return Err(LoadError::UnknownIdent { ident });
    }
    if version != format.version {
        return Err(LoadError::WrongVersion {
            found: version,
            expected: format.version,
        });
    }
    Ok(())
}

/// Reject `num_frames < 1`
pub fn frame_count(num_frames: i32) -> Result<usize, LoadError> {
    if num_frames < 1 {
        return Err(LoadError::NoFrames);
    }
    Ok(num_frames as usize)
}

/// A header count, which must not be negative
pub fn count(value: i32, what: &str) -> Result<usize, LoadError> {
    usize::try_from(value).map_err(|_| LoadError::broken(format!("negative {what} count ({value})")))
}

/// Resolve a forward offset relative to `base`
pub fn offset(base: usize, ofs: i32, what: &str) -> Result<usize, LoadError> {
    usize::try_from(ofs)
        .ok()
        .and_then(|ofs| base.checked_add(ofs))
        .ok_or_else(|| LoadError::broken(format!("invalid {what} offset ({ofs})")))
}

/// Start of the record after a chained one. `ofs_end` must clear the
/// record's own header so every step moves forward through the buffer.
pub fn chain_next(start: usize, ofs_end: i32, header_size: usize, what: &str) -> Result<usize, LoadError> {
    if !usize::try_from(ofs_end).is_ok_and(|len| len >= header_size) {
        return Err(LoadError::broken(format!(
            "{what} ends at {ofs_end}, inside its {header_size}-byte header"
        )));
    }
    offset(start, ofs_end, what)
}

/// Product of record counts and record sizes, or broken structure when the
/// header's counts overflow the address space
pub fn table_size(factors: &[usize], what: &str) -> Result<usize, LoadError> {
    factors
        .iter()
        .try_fold(1usize, |acc, &f| acc.checked_mul(f))
        .ok_or_else(|| LoadError::broken(format!("{what} table size overflows")))
}

/// Capacity for `count` chained records of at least `min_size` bytes, capped
/// at what the buffer can actually hold
#[inline]
pub fn capacity_hint(reader: &ByteReader<'_>, count: usize, min_size: usize) -> usize {
    count.min(reader.len() / min_size.max(1))
}

/// Lowercase a surface name and strip a trailing `_N` LOD suffix
pub fn normalize_surface_name(raw: &str) -> String {
    let mut name = raw.to_ascii_lowercase();
    let len = name.len();
    if len > 2 && name.as_bytes()[len - 2] == b'_' {
        name.truncate(len - 2);
    }
    name
}

fn display_name(raw: &str) -> String {
    if raw.is_empty() {
        "a surface".to_string()
    } else {
        raw.to_string()
    }
}

/// Enforce the per-surface vertex and index capacity
pub fn check_surface_limits(
    raw_name: &str,
    num_verts: usize,
    num_triangles: usize,
    limits: &SurfaceLimits,
) -> Result<(), LoadError> {
    if num_verts >= limits.max_vertexes {
        return Err(LoadError::TooManyVertices {
            surface: display_name(raw_name),
            count: num_verts,
            max: limits.max_vertexes,
        });
    }
    if num_triangles.saturating_mul(3) >= limits.max_indexes {
        return Err(LoadError::TooManyTriangles {
            surface: display_name(raw_name),
            count: num_triangles,
            max: limits.max_indexes,
        });
    }
    Ok(())
}

/// Read `num_triangles` index triples, rejecting any index outside `0..num_verts`
pub fn read_triangles(
    reader: &ByteReader<'_>,
    at: usize,
    num_triangles: usize,
    num_verts: usize,
    surface: &str,
) -> Result<Vec<u32>, LoadError> {
    reader.require(at, table_size(&[num_triangles, TRIANGLE_SIZE], "triangle")?)?;
    let mut cursor = reader.cursor(at);
    let num_indexes = num_triangles * 3;
    let mut indexes = Vec::with_capacity(num_indexes);
    for _ in 0..num_indexes {
        let index = cursor.i32()?;
        if index < 0 || index as usize >= num_verts {
            return Err(LoadError::TriangleIndexOutOfRange {
                surface: surface.to_string(),
                index,
                num_verts,
            });
        }
        indexes.push(index as u32);
    }
    Ok(indexes)
}

/// Read `num_verts` texture coordinates
pub fn read_st(reader: &ByteReader<'_>, at: usize, num_verts: usize) -> Result<Vec<[f32; 2]>, LoadError> {
    reader.require(at, table_size(&[num_verts, ST_SIZE], "st")?)?;
    let mut cursor = reader.cursor(at);
    (0..num_verts).map(|_| Ok(cursor.vec2()?)).collect()
}

/// Read `n` little-endian i32 values
pub fn read_i32_array(reader: &ByteReader<'_>, at: usize, n: usize) -> Result<Vec<i32>, LoadError> {
    reader.require(at, table_size(&[n, 4], "i32 array")?)?;
    let mut cursor = reader.cursor(at);
    (0..n).map(|_| Ok(cursor.i32()?)).collect()
}

/// Bounds, local origin and radius: the common prefix of every frame record
pub fn read_frame_prefix(cursor: &mut Cursor<'_>) -> Result<(Bounds, [f32; 3], f32), LoadError> {
    let mins = cursor.vec3()?;
    let maxs = cursor.vec3()?;
    let local_origin = cursor.vec3()?;
    let radius = cursor.f32()?;
    Ok((Bounds::new(mins, maxs), local_origin, radius))
}

/// Size of one bone weight: bone index, weight, offset
pub const WEIGHT_SIZE: usize = 20;

/// One bone influence on a skinned vertex
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoneWeight {
    pub bone_index: i32,
    pub weight: f32,
    /// Vertex position in the bone's space
    pub offset: [f32; 3],
}

/// Read a weight count followed by that many weights.
///
/// A negative count, or a weight array running past the buffer, is broken
/// structure.
pub fn read_weights(
    cursor: &mut Cursor<'_>,
    reader: &ByteReader<'_>,
    num_weights: i32,
) -> Result<SmallVec<[BoneWeight; 4]>, LoadError> {
    let n = usize::try_from(num_weights)
        .map_err(|_| LoadError::broken(format!("vertex has {num_weights} weights")))?;
    let len = table_size(&[n, WEIGHT_SIZE], "weight")?;
    if reader.require(cursor.position(), len).is_err() {
        return Err(LoadError::broken(format!(
            "{n} weights at {} run past the end of the file",
            cursor.position()
        )));
    }
    (0..n)
        .map(|_| {
            Ok(BoneWeight {
                bone_index: cursor.i32()?,
                weight: cursor.f32()?,
                offset: cursor.vec3()?,
            })
        })
        .collect()
}

/// Length of a 3-vector
#[inline]
pub fn length3(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::FieldWriter;
    use tagmesh_shared::MD3_FORMAT;

    #[test]
    fn test_surface_name_normalization() {
        assert_eq!(normalize_surface_name("H_Head_1"), "h_head");
        assert_eq!(normalize_surface_name("Torso"), "torso");
        assert_eq!(normalize_surface_name("a_1"), "a");
        assert_eq!(normalize_surface_name("_1"), "_1");
        assert_eq!(normalize_surface_name("ab_x"), "ab");
    }

    #[test]
    fn test_ident_then_version() {
        let ident = MD3_FORMAT.ident_le();
        assert!(check_ident_version(ident, 15, &MD3_FORMAT).is_ok());
        assert_eq!(
            check_ident_version(ident, 14, &MD3_FORMAT),
            Err(LoadError::WrongVersion {
                found: 14,
                expected: 15
            })
        );
        assert_eq!(
            check_ident_version(0, 15, &MD3_FORMAT),
            Err(LoadError::UnknownIdent { ident: 0 })
        );
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(0), Err(LoadError::NoFrames));
        assert_eq!(frame_count(-3), Err(LoadError::NoFrames));
        assert_eq!(frame_count(2), Ok(2));
    }

    #[test]
    fn test_limits_boundary() {
        let limits = SurfaceLimits::default();
        assert!(check_surface_limits("s", 999, 1999, &limits).is_ok());
        assert!(matches!(
            check_surface_limits("s", 1000, 1, &limits),
            Err(LoadError::TooManyVertices { count: 1000, .. })
        ));
        assert!(matches!(
            check_surface_limits("", 3, 2000, &limits),
            Err(LoadError::TooManyTriangles { ref surface, .. }) if surface == "a surface"
        ));
    }

    #[test]
    fn test_triangle_index_validation() {
        let mut w = FieldWriter::new();
        w.i32(0).i32(1).i32(2).i32(2).i32(3).i32(0);
        let bytes = w.into_bytes();
        let reader = ByteReader::new(&bytes);

        assert_eq!(read_triangles(&reader, 0, 2, 4, "s").unwrap(), vec![0, 1, 2, 2, 3, 0]);
        assert!(matches!(
            read_triangles(&reader, 0, 2, 3, "s"),
            Err(LoadError::TriangleIndexOutOfRange { index: 3, .. })
        ));
        assert!(matches!(
            read_triangles(&reader, 0, 3, 4, "s"),
            Err(LoadError::Truncated(_))
        ));
    }

    #[test]
    fn test_table_size_overflow() {
        assert_eq!(table_size(&[3, 4, 5], "x"), Ok(60));
        assert_eq!(table_size(&[], "x"), Ok(1));
        assert!(matches!(
            table_size(&[usize::MAX / 2, 3], "frame"),
            Err(LoadError::BrokenStructure(ref detail)) if detail.contains("frame")
        ));
    }

    #[test]
    fn test_capacity_hint_is_capped_by_buffer() {
        let data = [0u8; 100];
        let reader = ByteReader::new(&data);
        assert_eq!(capacity_hint(&reader, 3, 10), 3);
        assert_eq!(capacity_hint(&reader, i32::MAX as usize, 10), 10);
        assert_eq!(capacity_hint(&reader, 5, 0), 5);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(offset(100, 8, "x"), Ok(108));
        assert!(offset(100, -8, "x").is_err());
        assert_eq!(count(0, "x"), Ok(0));
        assert!(count(-1, "x").is_err());
    }

    #[test]
    fn test_chain_must_advance() {
        assert_eq!(chain_next(200, 108, 108, "surface"), Ok(308));
        assert!(chain_next(200, 0, 108, "surface").is_err());
        assert!(chain_next(200, 107, 108, "surface").is_err());
        assert!(chain_next(200, -4, 108, "surface").is_err());
    }
}
