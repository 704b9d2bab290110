//! Binary serialization trait for format headers.
//!
//! Every file and surface header implements `BinarySerializable`, giving
//! generic code (fixture writers, size checks) one interface while each
//! header keeps its type-specific `read`/`write` methods.

use crate::reader::{ByteReader, FieldWriter};

/// Trait for fixed-size binary headers.
///
/// # Example
///
/// ```
/// use tagmesh_formats::formats::{BinarySerializable, Md3Header};
///
/// let header = Md3Header { num_frames: 1, ..Default::default() };
/// let bytes = header.serialize();
/// assert_eq!(bytes.len(), Md3Header::SIZE);
///
/// let parsed = Md3Header::deserialize(&bytes).unwrap();
/// assert_eq!(parsed.num_frames, 1);
/// ```
pub trait BinarySerializable: Sized {
    /// Size of the serialized header in bytes.
    const SIZE: usize;

    /// Append the header's fields to `w`.
    fn write_to(&self, w: &mut FieldWriter);

    /// Serialize to a new buffer of exactly [`Self::SIZE`] bytes.
    fn serialize(&self) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(Self::SIZE);
        self.write_to(&mut w);
        w.into_bytes()
    }

    /// Deserialize from the start of `bytes`.
    ///
    /// Returns `None` if the slice is too short.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

macro_rules! file_header {
    ($($ty:ty),* $(,)?) => {$(
        impl BinarySerializable for $ty {
            const SIZE: usize = <$ty>::SIZE;

            fn write_to(&self, w: &mut FieldWriter) {
                self.write(w)
            }

            fn deserialize(bytes: &[u8]) -> Option<Self> {
                <$ty>::read(&ByteReader::new(bytes)).ok()
            }
        }
    )*};
}

macro_rules! surface_header {
    ($($ty:ty),* $(,)?) => {$(
        impl BinarySerializable for $ty {
            const SIZE: usize = <$ty>::SIZE;

            fn write_to(&self, w: &mut FieldWriter) {
                self.write(w)
            }

            fn deserialize(bytes: &[u8]) -> Option<Self> {
                <$ty>::read(&ByteReader::new(bytes), 0).ok()
            }
        }
    )*};
}

file_header!(
    super::Md3Header,
    super::MdcHeader,
    super::TanHeader,
    super::MdrHeader,
    super::MdsHeader,
    super::MdmHeader,
    super::MdxHeader,
);

surface_header!(
    super::Md3SurfaceHeader,
    super::MdcSurfaceHeader,
    super::TanSurfaceHeader,
    super::MdrSurfaceHeader,
    super::SkeletalSurfaceHeader,
);
