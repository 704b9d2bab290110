//! Tag and bounds queries
//!
//! Both queries dispatch on the model's [`ModelData`] variant. Mesh and MDR
//! tags are stored per frame and lerped directly; MDS and MDM tags follow a
//! bone of a skeleton resolved through [`crate::skeleton`].

use tagmesh_formats::Skeleton;
use tagmesh_shared::{Bounds, Orientation, multiply_axes};

use crate::model::{ModelData, ModelHandle};
use crate::registry::ModelStore;
use crate::skeleton::{SkeletonPose, TorsoPose, blended_bone};

/// Frame pair and blend fraction for one animation channel.
///
/// `model` supplies the frames of skeletal models (an MDX for MDM, any
/// MDS or MDX for MDS); mesh and MDR models ignore it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameChannel {
    pub model: ModelHandle,
    pub start_frame: i32,
    pub end_frame: i32,
    pub frac: f32,
}

impl FrameChannel {
    pub fn new(start_frame: i32, end_frame: i32, frac: f32) -> Self {
        Self {
            model: ModelHandle::NONE,
            start_frame,
            end_frame,
            frac,
        }
    }

    /// A single frame, no blending
    pub fn still(frame: i32) -> Self {
        Self::new(frame, frame, 0.0)
    }

    pub fn with_model(mut self, model: ModelHandle) -> Self {
        self.model = model;
        self
    }
}

/// Secondary channel blended into bones with a torso weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoChannel {
    pub frames: FrameChannel,
    pub axis: Option<[[f32; 3]; 3]>,
}

/// Result of [`ModelStore::lerp_tag`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagLookup {
    /// Identity when the tag was not found
    pub orientation: Orientation,
    /// Index of the matched tag
    pub index: Option<usize>,
}

impl TagLookup {
    const NOT_FOUND: Self = Self {
        orientation: Orientation::IDENTITY,
        index: None,
    };

    #[inline]
    pub fn found(&self) -> bool {
        self.index.is_some()
    }
}

impl ModelStore {
    /// Interpolated transform of the first tag named `name` at or after
    /// `start_index`.
    ///
    /// Frame numbers outside the model's range are clamped. `torso` only
    /// affects MDS and MDM models.
    pub fn lerp_tag(
        &self,
        handle: ModelHandle,
        name: &str,
        start_index: usize,
        frames: &FrameChannel,
        torso: Option<&TorsoChannel>,
    ) -> TagLookup {
        let found = match &self.get(handle).data {
            ModelData::Mesh(lods) => {
                let mesh = &lods[0];
                mesh.find_tag(name, start_index).and_then(|index| {
                    let start = mesh.tag(frames.start_frame, index)?;
                    let end = mesh.tag(frames.end_frame, index)?;
                    Some((index, Orientation::lerp(&start, &end, frames.frac)))
                })
            }
            ModelData::Mdr(mdr) => mdr.find_tag(name, start_index).and_then(|index| {
                let bone = mdr.tags[index].bone_index;
                let start = mdr.frame_clamped(frames.start_frame)?.bones.get(bone)?;
                let end = mdr.frame_clamped(frames.end_frame)?.bones.get(bone)?;
                Some((
                    index,
                    Orientation::lerp(&start.to_orientation(), &end.to_orientation(), frames.frac),
                ))
            }),
            ModelData::Mds(mds) => mds.find_tag(name, start_index).and_then(|index| {
                let frame_skeleton = self.frame_skeleton(frames.model).unwrap_or(&mds.skeleton);
                let torso_skeleton = torso.map(|t| self.frame_skeleton(t.frames.model).unwrap_or(&mds.skeleton));
                let bone = resolve_bone(frame_skeleton, frames, torso_skeleton.zip(torso), mds.tags[index].bone_index)?;
                Some((index, bone))
            }),
            ModelData::Mdm(mdm) => mdm.find_tag(name, start_index).and_then(|index| {
                let tag = &mdm.tags[index];
                let skeleton = self.mdx_skeleton(frames.model)?;
                let torso = torso.and_then(|t| Some((self.mdx_skeleton(t.frames.model)?, t)));
                let bone_index = usize::try_from(tag.bone_index).ok()?;
                let bone = resolve_bone(skeleton, frames, torso, bone_index)?;

                let mut origin = bone.origin;
                for (offset, axis) in tag.offset.iter().zip(&bone.axis) {
                    for k in 0..3 {
                        origin[k] += offset * axis[k];
                    }
                }
                Some((
                    index,
                    Orientation {
                        origin,
                        axis: multiply_axes(&tag.axis, &bone.axis),
                    },
                ))
            }),
            ModelData::Mdx(_) | ModelData::Bad => None,
        };

        match found {
            Some((index, orientation)) => TagLookup {
                orientation,
                index: Some(index),
            },
            None => TagLookup::NOT_FOUND,
        }
    }

    /// Frame bounds lerped between two frames.
    ///
    /// Frame numbers wrap into the model's frame range. `None` for models
    /// without frames of their own (MDM and the default model).
    pub fn model_bounds(&self, handle: ModelHandle, start_frame: i32, end_frame: i32, frac: f32) -> Option<Bounds> {
        let (start, end) = match &self.get(handle).data {
            ModelData::Mesh(lods) => (
                lods[0].frame_wrapped(start_frame)?.bounds,
                lods[0].frame_wrapped(end_frame)?.bounds,
            ),
            ModelData::Mdr(mdr) => (
                mdr.frame_wrapped(start_frame)?.bounds,
                mdr.frame_wrapped(end_frame)?.bounds,
            ),
            ModelData::Mds(mds) => skeleton_bounds(&mds.skeleton, start_frame, end_frame)?,
            ModelData::Mdx(mdx) => skeleton_bounds(&mdx.skeleton, start_frame, end_frame)?,
            ModelData::Mdm(_) | ModelData::Bad => return None,
        };

        if start_frame == end_frame {
            Some(start)
        } else {
            Some(Bounds::lerp(&start, &end, frac))
        }
    }

    /// Skeleton carried by an MDS or MDX frame model
    fn frame_skeleton(&self, handle: ModelHandle) -> Option<&Skeleton> {
        match &self.get(handle).data {
            ModelData::Mds(mds) => Some(&mds.skeleton),
            ModelData::Mdx(mdx) => Some(&mdx.skeleton),
            _ => None,
        }
    }

    fn mdx_skeleton(&self, handle: ModelHandle) -> Option<&Skeleton> {
        match &self.get(handle).data {
            ModelData::Mdx(mdx) => Some(&mdx.skeleton),
            _ => None,
        }
    }
}

fn resolve_bone(
    skeleton: &Skeleton,
    frames: &FrameChannel,
    torso: Option<(&Skeleton, &TorsoChannel)>,
    bone: usize,
) -> Option<Orientation> {
    let primary = SkeletonPose::new(skeleton, frames.start_frame, frames.end_frame, frames.frac);
    let torso = torso.map(|(skeleton, channel)| TorsoPose {
        pose: SkeletonPose::new(
            skeleton,
            channel.frames.start_frame,
            channel.frames.end_frame,
            channel.frames.frac,
        ),
        axis: channel.axis,
    });
    blended_bone(&primary, torso.as_ref(), bone)
}

fn skeleton_bounds(skeleton: &Skeleton, start_frame: i32, end_frame: i32) -> Option<(Bounds, Bounds)> {
    Some((
        skeleton.frame_wrapped(start_frame)?.bounds,
        skeleton.frame_wrapped(end_frame)?.bounds,
    ))
}
