//! Row-major 4x4 transform matrices.

use std::ops::{Index, Mul, MulAssign};

use cgmath::Rad;

use super::vector::{Vector3, Vector4};

/// Principal axis for [`Matrix4::rotate`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A 4x4 `f32` matrix stored in row-major order.
///
/// Elements are addressed as `at(col, row)`. Products compose right to left:
/// in `a * b` the transform `b` is applied first. The matrix acts on column
/// vectors, so translations live in the last column.
///
/// WGSL expects column-major storage; [`to_cols_array_2d`](Self::to_cols_array_2d)
/// produces that layout for uniform uploads.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Matrix4 {
    elements: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix4 {
    /// Remaps OpenGL clip depth `[-1, 1]` to the `[0, 1]` range wgpu clips against.
    #[rustfmt::skip]
    pub const OPENGL_TO_WGPU: Matrix4 = Matrix4::from_rows([
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Builds a matrix from 16 elements given row by row.
    pub const fn from_rows(elements: [f32; 16]) -> Self {
        Self { elements }
    }

    pub const fn identity() -> Self {
        Self::from_rows([
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, //
        ])
    }

    pub fn at(&self, col: usize, row: usize) -> f32 {
        self.elements[row * 4 + col]
    }

    pub fn at_mut(&mut self, col: usize, row: usize) -> &mut f32 {
        &mut self.elements[row * 4 + col]
    }

    /// The raw row-major elements.
    pub fn elements(&self) -> &[f32; 16] {
        &self.elements
    }

    pub fn transpose(&self) -> Self {
        let mut out = *self;
        for row in 0..4 {
            for col in 0..4 {
                *out.at_mut(col, row) = self.at(row, col);
            }
        }
        out
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        Self::from_rows([
            1.0, 0.0, 0.0, x, //
            0.0, 1.0, 0.0, y, //
            0.0, 0.0, 1.0, z, //
            0.0, 0.0, 0.0, 1.0, //
        ])
    }

    pub fn translation_v(v: Vector3) -> Self {
        Self::translation(v.x, v.y, v.z)
    }

    /// Uniform scale by `factor` on all three axes.
    pub fn scale(factor: f32) -> Self {
        Self::scale_non_uniform(factor, factor, factor)
    }

    pub fn scale_non_uniform(x: f32, y: f32, z: f32) -> Self {
        Self::from_rows([
            x, 0.0, 0.0, 0.0, //
            0.0, y, 0.0, 0.0, //
            0.0, 0.0, z, 0.0, //
            0.0, 0.0, 0.0, 1.0, //
        ])
    }

    /// Elementary rotation about one of the principal axes.
    ///
    /// Accepts any `cgmath` angle, so both `Deg(90.0)` and `Rad(FRAC_PI_2)` work.
    pub fn rotate(angle: impl Into<Rad<f32>>, axis: Axis) -> Self {
        let Rad(theta) = angle.into();
        let (s, c) = theta.sin_cos();
        match axis {
            Axis::X => Self::from_rows([
                1.0, 0.0, 0.0, 0.0, //
                0.0, c, -s, 0.0, //
                0.0, s, c, 0.0, //
                0.0, 0.0, 0.0, 1.0, //
            ]),
            Axis::Y => Self::from_rows([
                c, 0.0, s, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                -s, 0.0, c, 0.0, //
                0.0, 0.0, 0.0, 1.0, //
            ]),
            Axis::Z => Self::from_rows([
                c, -s, 0.0, 0.0, //
                s, c, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, //
            ]),
        }
    }

    /// Local to world change of basis: `x`, `y` and `z` become the columns.
    pub fn basis_change(x: Vector3, y: Vector3, z: Vector3) -> Self {
        Self::from_rows([
            x.x, y.x, z.x, 0.0, //
            x.y, y.y, z.y, 0.0, //
            x.z, y.z, z.z, 0.0, //
            0.0, 0.0, 0.0, 1.0, //
        ])
    }

    /// OpenGL style frustum projection, clip space z in `[-1, 1]`.
    pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let e = 2.0 * near / (right - left);
        let f = 2.0 * near / (top - bottom);
        let a = (right + left) / (right - left);
        let b = (top + bottom) / (top - bottom);
        let c = -(far + near) / (far - near);
        let d = -2.0 * far * near / (far - near);
        Self::from_rows([
            e, 0.0, a, 0.0, //
            0.0, f, b, 0.0, //
            0.0, 0.0, c, d, //
            0.0, 0.0, -1.0, 0.0, //
        ])
    }

    /// Symmetric perspective projection.
    ///
    /// `fovy` must lie in `(0, π)`. Values outside are not clamped and give a
    /// degenerate or mirrored projection.
    pub fn perspective(fovy: impl Into<Rad<f32>>, aspect: f32, near: f32, far: f32) -> Self {
        let Rad(fovy) = fovy.into();
        let f = 1.0 / (fovy / 2.0).tan();
        Self::from_rows([
            f / aspect, 0.0, 0.0, 0.0, //
            0.0, f, 0.0, 0.0, //
            0.0, 0.0, (far + near) / (near - far), 2.0 * far * near / (near - far), //
            0.0, 0.0, -1.0, 0.0, //
        ])
    }

    /// View matrix looking from `eye` towards `center`.
    ///
    /// The camera basis goes into the rows (`right`, `view_up`, `-forward`) and
    /// the eye is moved to the origin first.
    pub fn look_at(eye: Vector3, center: Vector3, up: Vector3) -> Self {
        let forward = (center - eye).normalized();
        Self::look_to(eye, forward, up)
    }

    /// Like [`look_at`](Self::look_at) with a direction instead of a target.
    pub fn look_to(eye: Vector3, forward: Vector3, up: Vector3) -> Self {
        let right = forward.cross(up).normalized();
        let view_up = right.cross(forward).normalized();
        let rotation = Self::from_rows([
            right.x, right.y, right.z, 0.0, //
            view_up.x, view_up.y, view_up.z, 0.0, //
            -forward.x, -forward.y, -forward.z, 0.0, //
            0.0, 0.0, 0.0, 1.0, //
        ]);
        rotation * Self::translation_v(-eye)
    }

    /// Applies the transform to a point (`w = 1`) and divides back.
    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        (*self * p.to_projective()).to_spatial()
    }

    pub fn is_finite(&self) -> bool {
        self.elements.iter().all(|e| e.is_finite())
    }

    /// Column-major layout as consumed by `mat4x4<f32>` in WGSL.
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        let mut cols = [[0.0; 4]; 4];
        for (col, out) in cols.iter_mut().enumerate() {
            for (row, v) in out.iter_mut().enumerate() {
                *v = self.at(col, row);
            }
        }
        cols
    }
}

impl Mul for Matrix4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut out = [0.0f32; 16];
        for y in 0..4 {
            for x in 0..4 {
                out[y * 4 + x] = (0..4).map(|i| self.at(i, y) * rhs.at(x, i)).sum();
            }
        }
        Self::from_rows(out)
    }
}

impl MulAssign for Matrix4 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<Vector4> for Matrix4 {
    type Output = Vector4;

    fn mul(self, v: Vector4) -> Vector4 {
        let row = |r: usize| {
            self.at(0, r) * v.x + self.at(1, r) * v.y + self.at(2, r) * v.z + self.at(3, r) * v.w
        };
        Vector4::new(row(0), row(1), row(2), row(3))
    }
}

/// Indexes the row-major element buffer directly.
impl Index<usize> for Matrix4 {
    type Output = f32;

    fn index(&self, i: usize) -> &f32 {
        &self.elements[i]
    }
}

impl From<cgmath::Matrix4<f32>> for Matrix4 {
    fn from(m: cgmath::Matrix4<f32>) -> Self {
        let cols: [[f32; 4]; 4] = m.into();
        let mut out = Self::identity();
        for (col, values) in cols.iter().enumerate() {
            for (row, v) in values.iter().enumerate() {
                *out.at_mut(col, row) = *v;
            }
        }
        out
    }
}

impl From<Matrix4> for cgmath::Matrix4<f32> {
    fn from(m: Matrix4) -> Self {
        m.to_cols_array_2d().into()
    }
}
