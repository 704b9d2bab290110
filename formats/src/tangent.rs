//! Per-vertex tangent space from triangle geometry and texture coordinates

use glam::{Vec2, Vec3};

use crate::formats::mdv::MdvVertex;
use crate::packing::{pack_tangent, unpack_normal};

/// Texture-space direction vectors of one triangle.
///
/// Solves the 2×2 system relating the two edge vectors to their UV deltas.
/// A triangle with no UV area yields zero vectors.
pub fn calc_tex_dirs(v: [Vec3; 3], st: [Vec2; 3]) -> (Vec3, Vec3) {
    let e1 = v[1] - v[0];
    let e2 = v[2] - v[0];
    let d1 = st[1] - st[0];
    let d2 = st[2] - st[0];

    let mut r = d1.x * d2.y - d2.x * d1.y;
    if r != 0.0 {
        r = 1.0 / r;
    }

    let sdir = (e1 * d2.y - e2 * d1.y) * r;
    let tdir = (e2 * d1.x - e1 * d2.x) * r;
    (sdir, tdir)
}

/// Orthogonalize `sdir` against `normal` and derive the handedness sign.
///
/// Returns `[tx, ty, tz, sign]`.
pub fn calc_tangent_space(normal: Vec3, sdir: Vec3, tdir: Vec3) -> [f32; 4] {
    let tangent = (sdir - normal * normal.dot(sdir)).normalize_or_zero();
    let handedness = if normal.cross(tangent).dot(tdir) < 0.0 {
        -1.0
    } else {
        1.0
    };
    [tangent.x, tangent.y, tangent.z, handedness]
}

/// Fill the packed tangents of every (frame, vertex) record of a surface.
///
/// `verts` is frame-major with `num_verts` records per frame and already holds
/// positions and packed normals. `indexes` must reference vertices below
/// `num_verts`; parsers validate this before calling.
pub fn compute_surface_tangents(
    num_frames: usize,
    num_verts: usize,
    verts: &mut [MdvVertex],
    st: &[[f32; 2]],
    indexes: &[u32],
) {
    let total = num_frames * num_verts;
    let mut sdirs = vec![Vec3::ZERO; total];
    let mut tdirs = vec![Vec3::ZERO; total];

    for frame in 0..num_frames {
        let base = frame * num_verts;
        for tri in indexes.chunks_exact(3) {
            let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let v = idx.map(|i| Vec3::from_array(verts[base + i].xyz));
            let uv = idx.map(|i| Vec2::from_array(st[i]));

            let (sdir, tdir) = calc_tex_dirs(v, uv);
            for i in idx {
                sdirs[base + i] += sdir;
                tdirs[base + i] += tdir;
            }
        }
    }

    for ((vert, sdir), tdir) in verts[..total].iter_mut().zip(sdirs).zip(tdirs) {
        let normal = Vec3::from_array(unpack_normal(vert.normal));
        let tangent =
            calc_tangent_space(normal, sdir.normalize_or_zero(), tdir.normalize_or_zero());
        vert.tangent = pack_tangent(tangent);
    }
}
