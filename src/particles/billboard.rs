use cgmath::Rad;

use crate::math::{Axis, Matrix4, Vector3};

use super::pool::Particle;

/// Corners of the unit sprite in the billboard's `x`/`z` plane, strip order.
pub const QUAD_CORNERS: [(f32, f32); 4] = [(-0.5, 0.5), (-0.5, -0.5), (0.5, 0.5), (0.5, -0.5)];

/// Texture coordinates matching [`QUAD_CORNERS`]; v grows downwards in texture space.
pub const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

/// Axes of a sprite facing the camera.
///
/// `y` points back at the viewer, `x` and `z` span the sprite plane. Looking
/// straight up or down collapses `x` and `z` to zero.
pub fn basis(camera_forward: Vector3) -> (Vector3, Vector3, Vector3) {
    let y = -camera_forward;
    let x = Vector3::up().cross(y).normalized();
    let z = y.cross(x).normalized();
    (x, y, z)
}

/// Local to world transform of one particle's sprite.
pub fn transform(particle: &Particle, basis: (Vector3, Vector3, Vector3)) -> Matrix4 {
    let (x, y, z) = basis;
    Matrix4::translation_v(particle.position)
        * Matrix4::basis_change(x, y, z)
        * Matrix4::rotate(Rad(particle.rotation), Axis::Y)
        * Matrix4::scale(particle.scale)
}

/// Regenerates the sprite mesh of all particles.
///
/// `positions` receives four `xyz` corners per particle and `atlas` the
/// particle's atlas index once per corner. Both are cleared first.
pub fn write_mesh(
    particles: &[Particle],
    camera_forward: Vector3,
    positions: &mut Vec<f32>,
    atlas: &mut Vec<f32>,
) {
    positions.clear();
    atlas.clear();
    let basis = basis(camera_forward);
    for particle in particles {
        let m = transform(particle, basis);
        for (u, v) in QUAD_CORNERS {
            let corner = m.transform_point(Vector3::new(u, 0.0, v));
            positions.extend_from_slice(&corner.to_array());
            atlas.push(particle.atlas_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn particle_at(position: Vector3) -> Particle {
        Particle {
            position,
            velocity: Vector3::zero(),
            rotation: 0.0,
            angular_velocity: 0.0,
            scale: 0.2,
            atlas_index: 2.0,
            distance: 0.0,
        }
    }

    fn corners(positions: &[f32]) -> Vec<Vector3> {
        positions
            .chunks(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect()
    }

    #[test]
    fn sprites_face_the_camera() {
        let forward = Vector3::new(-1.0, 0.3, -0.2).normalized();
        let center = Vector3::new(1.0, 2.0, 3.0);
        let (mut positions, mut atlas) = (Vec::new(), Vec::new());
        write_mesh(&[particle_at(center)], forward, &mut positions, &mut atlas);
        assert_eq!(positions.len(), 12);
        for corner in corners(&positions) {
            assert_relative_eq!((corner - center).dot(forward), 0.0, epsilon = 1e-5);
        }
        assert_eq!(atlas, vec![2.0; 4]);
    }

    #[test]
    fn sprite_is_scaled_and_centered() {
        let forward = Vector3::new(1.0, 0.0, 0.0);
        let center = Vector3::new(0.0, 0.0, 5.0);
        let (mut positions, mut atlas) = (Vec::new(), Vec::new());
        write_mesh(&[particle_at(center)], forward, &mut positions, &mut atlas);
        let c = corners(&positions);
        let diagonal = (c[0] - c[3]).norm();
        assert_relative_eq!(diagonal, 0.2 * 2f32.sqrt(), epsilon = 1e-5);
        let mid = (c[0] + c[3]) * 0.5;
        assert_relative_eq!((mid - center).norm(), 0.0, epsilon = 1e-5);
        // upper corners stay above the center when the camera looks horizontally
        assert!(c[0].z > center.z && c[2].z > center.z);
    }

    #[test]
    fn rotation_spins_within_the_sprite_plane() {
        let forward = Vector3::new(0.0, 1.0, 0.0);
        let mut p = particle_at(Vector3::zero());
        p.rotation = std::f32::consts::FRAC_PI_2;
        let (mut positions, mut atlas) = (Vec::new(), Vec::new());
        write_mesh(&[p], forward, &mut positions, &mut atlas);
        for corner in corners(&positions) {
            assert_relative_eq!(corner.dot(forward), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn looking_straight_down_degenerates_without_nan() {
        let (mut positions, mut atlas) = (Vec::new(), Vec::new());
        let center = Vector3::new(1.0, 1.0, 1.0);
        write_mesh(&[particle_at(center)], -Vector3::up(), &mut positions, &mut atlas);
        for corner in corners(&positions) {
            assert!(corner.is_finite());
            assert_eq!(corner, center);
        }
    }
}
