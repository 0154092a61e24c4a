//! Three- and four-vectors and the particle arrays produced by the generators.
pub mod quantities;

use quantities::{Mass, Momentum};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Deref, DerefMut, Index, IndexMut, Mul, Neg, Sub, SubAssign};

/// A three-vector, used for momenta and boost velocities.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Vector3(pub [f64; 3]);

impl Vector3 {
    /// Constructor.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    /// Scalar product.
    pub fn dot(&self, other: &Self) -> f64 {
        self.0[0] * other.0[0] + self.0[1] * other.0[1] + self.0[2] * other.0[2]
    }

    /// Squared length.
    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }

    /// Length.
    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }
}

impl Index<usize> for Vector3 {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Vector3 {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(self, factor: f64) -> Self {
        Self(self.0.map(|x| x * factor))
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.map(|x| -x))
    }
}

/// A four-vector $(E, p_x, p_y, p_z)$ with metric $(+, -, -, -)$.
///
/// Component `0` is the energy, components `1` to `3` the momentum.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Vector4(pub [f64; 4]);

impl Vector4 {
    /// Constructor from the energy and the momentum components.
    pub const fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self([e, px, py, pz])
    }

    /// A particle of mass `mass` at rest.
    pub const fn at_rest(mass: f64) -> Self {
        Self([mass, 0.0, 0.0, 0.0])
    }

    /// Energy.
    pub const fn e(&self) -> f64 {
        self.0[0]
    }

    /// Momentum.
    pub const fn p(&self) -> Vector3 {
        Vector3([self.0[1], self.0[2], self.0[3]])
    }

    /// Squared invariant mass, $E^2 - \vec{p}^2$.
    pub fn mass2(&self) -> f64 {
        self.0[0] * self.0[0] - self.d3mag2()
    }

    /// Invariant mass. Space-like vectors have mass zero.
    pub fn mass(&self) -> f64 {
        let m2 = self.mass2();
        if m2 > 0.0 {
            m2.sqrt()
        } else {
            0.0
        }
    }

    /// Squared magnitude of the momentum.
    pub fn d3mag2(&self) -> f64 {
        self.0[1] * self.0[1] + self.0[2] * self.0[2] + self.0[3] * self.0[3]
    }

    /// Magnitude of the momentum.
    pub fn d3mag(&self) -> f64 {
        self.d3mag2().sqrt()
    }

    /// Velocity $\vec{\beta} = \vec{p} / E$ of the rest frame of this vector.
    pub fn boost_vector(&self) -> Vector3 {
        self.p() * (1.0 / self.0[0])
    }

    /// Lorentz-boosts this vector with velocity `beta`, $|\vec\beta| < 1$.
    pub fn apply_boost_to(&mut self, beta: Vector3) {
        let b2 = beta.mag2();
        if b2 == 0.0 {
            return;
        }

        let gamma = 1.0 / (1.0 - b2).sqrt();
        let bp = beta.dot(&self.p());
        let gamma2 = (gamma - 1.0) / b2;
        let e = self.0[0];

        self.0[0] = gamma * (e + bp);
        for i in 0..3 {
            self.0[i + 1] += gamma2 * bp * beta[i] + gamma * beta[i] * e;
        }
    }

    /// Returns a copy boosted with velocity `beta`.
    #[must_use]
    pub fn boosted(mut self, beta: Vector3) -> Self {
        self.apply_boost_to(beta);
        self
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }
}

impl Index<usize> for Vector4 {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Vector4 {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl Add for Vector4 {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl AddAssign for Vector4 {
    fn add_assign(&mut self, other: Self) {
        for (a, b) in self.0.iter_mut().zip(other.0) {
            *a += b;
        }
    }
}

impl Sub for Vector4 {
    type Output = Self;

    fn sub(mut self, other: Self) -> Self {
        self -= other;
        self
    }
}

impl SubAssign for Vector4 {
    fn sub_assign(&mut self, other: Self) {
        for (a, b) in self.0.iter_mut().zip(other.0) {
            *a -= b;
        }
    }
}

impl Mul<f64> for Vector4 {
    type Output = Self;

    fn mul(self, factor: f64) -> Self {
        Self(self.0.map(|x| x * factor))
    }
}

impl std::iter::Sum for Vector4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, v| acc + v)
    }
}

/// The daughters of one decay, in the order of the masses given to the generator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particles<const N: usize>(pub [Vector4; N]);

impl<const N: usize> Default for Particles<N> {
    fn default() -> Self {
        Self([Vector4::default(); N])
    }
}

impl<const N: usize> Deref for Particles<N> {
    type Target = [Vector4; N];

    fn deref(&self) -> &[Vector4; N] {
        &self.0
    }
}

impl<const N: usize> DerefMut for Particles<N> {
    fn deref_mut(&mut self) -> &mut [Vector4; N] {
        &mut self.0
    }
}

impl<const N: usize> From<[Vector4; N]> for Particles<N> {
    fn from(particles: [Vector4; N]) -> Self {
        Self(particles)
    }
}

impl<const N: usize> Particles<N> {
    /// Sum of all four-momenta.
    pub fn total(&self) -> Vector4 {
        self.0.iter().copied().sum()
    }

    /// Invariant mass of the subsystem formed by the daughters at `indices`.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    pub fn invariant_mass(&self, indices: &[usize]) -> Mass {
        Mass(indices.iter().map(|&i| self.0[i]).sum::<Vector4>().mass())
    }

    /// Magnitude of the momentum of daughter `index`.
    pub fn momentum(&self, index: usize) -> Momentum {
        Momentum(self.0[index].d3mag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn mass_and_momentum() {
        let v = Vector4::new(5.0, 1.0, 2.0, 2.0);
        assert_approx_eq!(v.mass2(), 16.0);
        assert_approx_eq!(v.mass(), 4.0);
        assert_approx_eq!(v.d3mag(), 3.0);
        assert_eq!(Vector4::new(1.0, 2.0, 0.0, 0.0).mass(), 0.0);
        assert_eq!(v[3], 2.0);
    }

    #[test]
    fn boost_to_rest_frame_and_back() {
        let mother = Vector4::new(5.0, 1.0, -2.0, 2.5);
        let beta = mother.boost_vector();

        let rest = mother.boosted(-beta);
        assert_approx_eq!(rest.e(), mother.mass(), 1e-12);
        assert_approx_eq!(rest.d3mag(), 0.0, 1e-12);

        let back = rest.boosted(beta);
        for i in 0..4 {
            assert_approx_eq!(back[i], mother[i], 1e-12);
        }
    }

    #[test]
    fn boost_preserves_mass() {
        let mut v = Vector4::new(2.0, 0.3, 0.4, -1.2);
        let m = v.mass();
        v.apply_boost_to(Vector3::new(0.1, -0.7, 0.3));
        assert_approx_eq!(v.mass(), m, 1e-12);

        let w = v;
        v.apply_boost_to(Vector3::default());
        assert_eq!(v, w);
    }

    #[test]
    fn particles_sum_and_invariant_mass() {
        let particles = Particles([
            Vector4::new(1.0, 0.0, 0.5, 0.0),
            Vector4::new(1.0, 0.0, -0.5, 0.0),
            Vector4::at_rest(0.2),
        ]);
        assert_eq!(particles.total(), Vector4::new(2.2, 0.0, 0.0, 0.0));
        assert_approx_eq!(particles.invariant_mass(&[0, 1]).value(), 2.0);
        assert_approx_eq!(particles.momentum(0).value(), 0.5);
        assert_eq!(particles.len(), 3);
        assert_eq!(Particles::<2>::default()[1], Vector4::default());
    }
}
