//! Exponential and logarithm maps of SE(3).
//!
//! Tangent vectors use the layout $[\omega_x, \omega_y, \omega_z, \rho_x, \rho_y, \rho_z]$:
//! rotation first, translation second.
use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3, Vector6};

/// Below this angle the closed forms are replaced by Taylor expansions.
const SMALL_ANGLE: f64 = 1e-5;

fn so3_exp(omega: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*omega).into_inner()
}

fn so3_log(rotation: &Matrix3<f64>) -> Vector3<f64> {
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*rotation));
    // keep the scalar part non-negative so the angle lands in [0, pi]
    let (w, v) = if q.scalar() < 0.0 {
        (-q.scalar(), -q.imag())
    } else {
        (q.scalar(), q.imag())
    };
    let n = v.norm();
    if n < SMALL_ANGLE {
        v * (2.0 / w)
    } else {
        v * (2.0 * n.atan2(w) / n)
    }
}

/// Left Jacobian $V(\omega)$ of SO(3), maps $\rho$ to the translation of $\exp(\xi)$.
fn left_jacobian(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta = omega.norm();
    let w = omega.cross_matrix();
    let w2 = w * w;
    if theta < SMALL_ANGLE {
        return Matrix3::identity() + w * 0.5 + w2 * (1.0 / 6.0);
    }
    let half = 0.5 * theta;
    let a = 2.0 * half.sin() * half.sin() / (theta * theta);
    let b = (theta - theta.sin()) / (theta * theta * theta);
    Matrix3::identity() + w * a + w2 * b
}

fn left_jacobian_inverse(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta = omega.norm();
    let w = omega.cross_matrix();
    let w2 = w * w;
    if theta < SMALL_ANGLE {
        return Matrix3::identity() - w * 0.5 + w2 * (1.0 / 12.0);
    }
    let half = 0.5 * theta;
    let c = (1.0 - half / half.tan()) / (theta * theta);
    Matrix3::identity() - w * 0.5 + w2 * c
}

/// Logarithm map: rigid transform to 6-vector tangent.
pub fn to_tangent(m: &Matrix4<f64>) -> Vector6<f64> {
    let rotation: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let translation: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
    let omega = so3_log(&rotation);
    let rho = left_jacobian_inverse(&omega) * translation;
    Vector6::new(omega.x, omega.y, omega.z, rho.x, rho.y, rho.z)
}

/// Exponential map: 6-vector tangent to rigid transform.
pub fn from_tangent(v: &Vector6<f64>) -> Matrix4<f64> {
    let omega: Vector3<f64> = v.fixed_rows::<3>(0).into_owned();
    let rho: Vector3<f64> = v.fixed_rows::<3>(3).into_owned();
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&so3_exp(&omega));
    m.fixed_view_mut::<3, 1>(0, 3)
        .copy_from(&(left_jacobian(&omega) * rho));
    m
}

/// Inverse of a rigid transform, $[R^T \mid -R^T t]$.
pub fn inverse(m: &Matrix4<f64>) -> Matrix4<f64> {
    let rotation_t: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).transpose();
    let translation: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
    let mut inv = Matrix4::identity();
    inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation_t);
    inv.fixed_view_mut::<3, 1>(0, 3)
        .copy_from(&(-(rotation_t * translation)));
    inv
}

/// Rigid transform from rotation vector and translation.
pub fn from_rotation_translation(omega: &Vector3<f64>, translation: &Vector3<f64>) -> Matrix4<f64> {
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&so3_exp(omega));
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    m
}
