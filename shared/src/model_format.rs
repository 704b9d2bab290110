//! Model format specifications.
//!
//! This module defines the `ModelFormat` struct which serves as the single source of truth
//! for every model file constant (extension, ident bytes, version) and for the order in
//! which formats are preferred when several files share a base name.
//!
//! # Example
//!
//! ```
//! use tagmesh_shared::{MD3_FORMAT, MODEL_FORMATS, format_for_extension};
//!
//! assert_eq!(MD3_FORMAT.extension, "md3");
//! assert_eq!(MD3_FORMAT.ident, b"IDP3");
//!
//! // Lookups are case-insensitive and report the preference rank
//! let (rank, format) = format_for_extension("MD3").unwrap();
//! assert_eq!(format.extension, "md3");
//! assert_eq!(MODEL_FORMATS[rank].extension, "md3");
//! ```

/// Registration path a format is loaded through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderFamily {
    /// Generic bone-animation file, loaded as a single file
    Mdr,
    /// Static mesh with discrete LOD files (`name_2.ext`, `name_1.ext`, `name.ext`)
    Md3,
    /// Single skeletal file, parser chosen by ident
    Skeletal,
    /// Static mesh without LOD files
    Tan,
}

/// Model file format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFormat {
    /// File extension without dot (e.g., "md3")
    pub extension: &'static str,

    /// Ident bytes at the start of the file (4 bytes)
    pub ident: &'static [u8; 4],

    /// Expected version field
    pub version: i32,

    /// Registration path used for this extension
    pub family: LoaderFamily,
}

impl ModelFormat {
    /// Create a new model format specification.
    pub const fn new(
        extension: &'static str,
        ident: &'static [u8; 4],
        version: i32,
        family: LoaderFamily,
    ) -> Self {
        Self {
            extension,
            ident,
            version,
            family,
        }
    }

    /// Ident as the little-endian integer stored in the file header
    pub const fn ident_le(&self) -> u32 {
        u32::from_le_bytes(*self.ident)
    }
}

pub const MDR_FORMAT: ModelFormat = ModelFormat::new("mdr", b"RDM5", 2, LoaderFamily::Mdr);
pub const MD3_FORMAT: ModelFormat = ModelFormat::new("md3", b"IDP3", 15, LoaderFamily::Md3);
pub const MDC_FORMAT: ModelFormat = ModelFormat::new("mdc", b"IDPC", 2, LoaderFamily::Md3);
pub const MDS_FORMAT: ModelFormat = ModelFormat::new("mds", b"MDSW", 4, LoaderFamily::Skeletal);
pub const MDM_FORMAT: ModelFormat = ModelFormat::new("mdm", b"MDMW", 3, LoaderFamily::Skeletal);
pub const MDX_FORMAT: ModelFormat = ModelFormat::new("mdx", b"MDXW", 2, LoaderFamily::Skeletal);
pub const TAN_FORMAT: ModelFormat = ModelFormat::new("tan", b"TKAN", 2, LoaderFamily::Tan);

/// Every recognized format, highest preference first.
///
/// The order decides which file wins when several formats exist under one
/// base name, so it must not be rearranged.
pub const MODEL_FORMATS: [ModelFormat; 7] = [
    MDR_FORMAT, MD3_FORMAT, MDC_FORMAT, MDS_FORMAT, MDM_FORMAT, MDX_FORMAT, TAN_FORMAT,
];

/// Find a format by extension (case-insensitive), returning its preference rank.
pub fn format_for_extension(ext: &str) -> Option<(usize, &'static ModelFormat)> {
    MODEL_FORMATS
        .iter()
        .enumerate()
        .find(|(_, format)| format.extension.eq_ignore_ascii_case(ext))
}

/// Find a format by the little-endian ident read from a file header.
pub fn format_for_ident(ident: u32) -> Option<&'static ModelFormat> {
    MODEL_FORMATS.iter().find(|format| format.ident_le() == ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_order() {
        let order: Vec<&str> = MODEL_FORMATS.iter().map(|f| f.extension).collect();
        assert_eq!(order, ["mdr", "md3", "mdc", "mds", "mdm", "mdx", "tan"]);
    }

    #[test]
    fn test_md3_ident_value() {
        // ('3' << 24) + ('P' << 16) + ('D' << 8) + 'I'
        let expected = (b'3' as u32) << 24 | (b'P' as u32) << 16 | (b'D' as u32) << 8 | b'I' as u32;
        assert_eq!(MD3_FORMAT.ident_le(), expected);
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        let (rank, format) = format_for_extension("MdC").unwrap();
        assert_eq!(rank, 2);
        assert_eq!(format.family, LoaderFamily::Md3);
        assert!(format_for_extension("obj").is_none());
    }

    #[test]
    fn test_ident_lookup() {
        let format = format_for_ident(u32::from_le_bytes(*b"MDXW")).unwrap();
        assert_eq!(format.extension, "mdx");
        assert!(format_for_ident(0).is_none());
    }

    #[test]
    fn test_idents_are_unique() {
        for (i, a) in MODEL_FORMATS.iter().enumerate() {
            for b in &MODEL_FORMATS[i + 1..] {
                assert_ne!(a.ident, b.ident, "{} and {}", a.extension, b.extension);
            }
        }
    }
}
