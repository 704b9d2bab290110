//! Bone transforms for MDS and MDX skeletons
//!
//! Each frame stores one angle-encoded pose per bone. A bone's axes come
//! straight from its angles; its origin is found by walking the parent
//! chain from the root, stepping `parent_dist` along each bone's offset
//! direction.

use glam::{Mat3, Vec3};
use smallvec::SmallVec;
use tagmesh_formats::Skeleton;
use tagmesh_shared::{Orientation, angle_vectors, angles_to_axis};

/// A skeleton sampled between two frames
#[derive(Debug, Clone, Copy)]
pub struct SkeletonPose<'a> {
    pub skeleton: &'a Skeleton,
    pub start_frame: i32,
    pub end_frame: i32,
    pub frac: f32,
}

impl<'a> SkeletonPose<'a> {
    pub fn new(skeleton: &'a Skeleton, start_frame: i32, end_frame: i32, frac: f32) -> Self {
        Self {
            skeleton,
            start_frame,
            end_frame,
            frac,
        }
    }

    /// Bone transform lerped between the two frames
    pub fn bone(&self, bone: usize) -> Option<Orientation> {
        let start = bone_orientation(self.skeleton, self.start_frame, bone)?;
        if self.start_frame == self.end_frame {
            return Some(start);
        }
        let end = bone_orientation(self.skeleton, self.end_frame, bone)?;
        Some(Orientation::lerp(&start, &end, self.frac))
    }
}

/// Secondary pose applied to bones with a torso weight
#[derive(Debug, Clone, Copy)]
pub struct TorsoPose<'a> {
    pub pose: SkeletonPose<'a>,
    /// Extra rotation applied to the torso pose around the torso parent
    pub axis: Option<[[f32; 3]; 3]>,
}

/// Transform of `bone` in a single frame, clamped into the frame range.
///
/// `None` if the bone or frame does not exist, or the parent chain does not
/// reach a root within `num_bones` steps.
pub fn bone_orientation(skeleton: &Skeleton, frame: i32, bone: usize) -> Option<Orientation> {
    let frame = skeleton.frame_clamped(frame)?;
    let num_bones = skeleton.num_bones();

    let mut chain: SmallVec<[usize; 16]> = SmallVec::new();
    let mut current = Some(bone);
    while let Some(b) = current {
        if b >= num_bones || chain.len() >= num_bones {
            return None;
        }
        chain.push(b);
        current = skeleton.bones[b].parent;
    }

    let mut origin = Vec3::from(frame.parent_offset);
    for &b in chain.iter().rev().skip(1) {
        let (dir, _, _) = angle_vectors(frame.bones.get(b)?.offset_angles_degrees());
        origin += Vec3::from(dir) * skeleton.bones[b].parent_dist;
    }

    Some(Orientation {
        origin: origin.into(),
        axis: angles_to_axis(frame.bones.get(bone)?.angles_degrees()),
    })
}

/// Resolve `bone` under the primary pose, blended toward the torso pose by
/// the bone's torso weight.
pub fn blended_bone(primary: &SkeletonPose<'_>, torso: Option<&TorsoPose<'_>>, bone: usize) -> Option<Orientation> {
    let base = primary.bone(bone)?;
    let weight = primary.skeleton.bones[bone].torso_weight;
    let Some(torso) = torso.filter(|_| weight != 0.0) else {
        return Some(base);
    };
    let Some(mut twisted) = torso.pose.bone(bone) else {
        return Some(base);
    };

    if let Some(axis) = &torso.axis {
        let rotation = rows_to_mat3(axis);
        let pivot = torso
            .pose
            .skeleton
            .torso_parent
            .and_then(|parent| torso.pose.bone(parent))
            .map_or(Vec3::ZERO, |p| Vec3::from(p.origin));

        twisted.origin = (pivot + rotation * (Vec3::from(twisted.origin) - pivot)).into();
        for row in twisted.axis.iter_mut() {
            *row = (rotation * Vec3::from(*row)).into();
        }
    }

    Some(Orientation::lerp(&base, &twisted, weight))
}

/// Matrix `m` such that `m * v` is the row vector `v` times the row-major axes
#[inline]
fn rows_to_mat3(rows: &[[f32; 3]; 3]) -> Mat3 {
    Mat3::from_cols(Vec3::from(rows[0]), Vec3::from(rows[1]), Vec3::from(rows[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagmesh_formats::{BoneInfo, CompressedBoneFrame, SkeletalFrame};
    use tagmesh_formats::codec::angle_to_short;
    use tagmesh_shared::Bounds;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    fn bone(parent: Option<usize>, parent_dist: f32, torso_weight: f32) -> BoneInfo {
        BoneInfo {
            name: String::new(),
            parent,
            torso_weight,
            parent_dist,
            flags: 0,
        }
    }

    fn frame(parent_offset: [f32; 3], bones: Vec<CompressedBoneFrame>) -> SkeletalFrame {
        SkeletalFrame {
            bounds: Bounds::default(),
            local_origin: [0.0; 3],
            radius: 1.0,
            parent_offset,
            bones,
        }
    }

    fn pose(pitch: f32, yaw: f32, ofs_pitch: f32, ofs_yaw: f32) -> CompressedBoneFrame {
        CompressedBoneFrame {
            angles: [angle_to_short(pitch), angle_to_short(yaw), 0, 0],
            ofs_angles: [angle_to_short(ofs_pitch), angle_to_short(ofs_yaw)],
        }
    }

    /// Root at `parent_offset`, child 2 units along +y, grandchild 3 units up
    fn three_bones() -> Skeleton {
        Skeleton {
            bones: vec![bone(None, 0.0, 0.0), bone(Some(0), 2.0, 0.0), bone(Some(1), 3.0, 1.0)],
            frames: vec![
                frame(
                    [1.0, 0.0, 0.0],
                    vec![pose(0.0, 0.0, 0.0, 0.0), pose(0.0, 90.0, 0.0, 90.0), pose(0.0, 0.0, -90.0, 0.0)],
                ),
                frame(
                    [3.0, 0.0, 0.0],
                    vec![pose(0.0, 0.0, 0.0, 0.0), pose(0.0, 90.0, 0.0, 90.0), pose(0.0, 0.0, -90.0, 0.0)],
                ),
            ],
            torso_parent: Some(0),
        }
    }

    #[test]
    fn test_root_uses_parent_offset() {
        let sk = three_bones();
        let root = bone_orientation(&sk, 0, 0).unwrap();
        assert_eq!(root.origin, [1.0, 0.0, 0.0]);
        assert!(approx(root.axis[0], [1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_chain_accumulates_offsets() {
        let sk = three_bones();
        let child = bone_orientation(&sk, 0, 1).unwrap();
        assert!(approx(child.origin, [1.0, 2.0, 0.0]));
        assert!(approx(child.axis[0], [0.0, 1.0, 0.0]));

        let grandchild = bone_orientation(&sk, 0, 2).unwrap();
        assert!(approx(grandchild.origin, [1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_frame_is_clamped() {
        let sk = three_bones();
        assert_eq!(bone_orientation(&sk, 9, 0).unwrap().origin, [3.0, 0.0, 0.0]);
        assert_eq!(bone_orientation(&sk, -4, 0).unwrap().origin, [1.0, 0.0, 0.0]);
        assert!(bone_orientation(&sk, 0, 3).is_none());
    }

    #[test]
    fn test_cyclic_parents_stop() {
        let mut sk = three_bones();
        sk.bones[0].parent = Some(2);
        assert!(bone_orientation(&sk, 0, 2).is_none());
    }

    #[test]
    fn test_pose_lerps_between_frames() {
        let sk = three_bones();
        let mid = SkeletonPose::new(&sk, 0, 1, 0.5).bone(0).unwrap();
        assert!(approx(mid.origin, [2.0, 0.0, 0.0]));
    }

    #[test]
    fn test_torso_weight_blends() {
        let sk = three_bones();
        let primary = SkeletonPose::new(&sk, 0, 0, 0.0);
        let torso = TorsoPose {
            pose: SkeletonPose::new(&sk, 1, 1, 0.0),
            axis: None,
        };

        // bone 1 has no torso weight
        let unweighted = blended_bone(&primary, Some(&torso), 1).unwrap();
        assert!(approx(unweighted.origin, [1.0, 2.0, 0.0]));

        // bone 2 follows the torso pose entirely
        let weighted = blended_bone(&primary, Some(&torso), 2).unwrap();
        assert!(approx(weighted.origin, [3.0, 2.0, 3.0]));
    }

    #[test]
    fn test_torso_axis_rotates_about_torso_parent() {
        let sk = three_bones();
        let primary = SkeletonPose::new(&sk, 0, 0, 0.0);
        // yaw by 90 degrees: x -> y, y -> -x
        let torso = TorsoPose {
            pose: SkeletonPose::new(&sk, 0, 0, 0.0),
            axis: Some([[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]),
        };
        let twisted = blended_bone(&primary, Some(&torso), 2).unwrap();
        // offset (0, 2, 3) from the root at (1, 0, 0) becomes (-2, 0, 3)
        assert!(approx(twisted.origin, [-1.0, 0.0, 3.0]));
        assert!(approx(twisted.axis[0], [0.0, 1.0, 0.0]));
    }
}
