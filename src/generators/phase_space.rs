//! N-body phase-space generator after F. James, "Monte Carlo phase space", CERN 68-15 (GENBOD),
//! following the Raubold–Lynch recursive two-body construction.
//!
//! Each event is decomposed into a chain of two-body decays in the rest frame of the mother:
//! the intermediate invariant masses are drawn from `N - 2` sorted uniform numbers, every
//! two-body system is rotated randomly and boosted into the next one, and finally all daughters
//! are boosted into the frame of the mother. The weight of an event is proportional to the
//! product of the two-body breakup momenta.
//!
//! Event `i` draws its random numbers from a [`CounterEngine`] positioned at `i * stride`, with
//! `stride = (3N - 4) * E::WORDS_PER_F64`, so every event owns a disjoint block of the stream and
//! the result does not depend on which thread generates it, or in which order.

use crate::backend::Backend;
use crate::callbacks::{BatchReport, Callback};
use crate::decays::Decays;
use crate::error::{ConfigError, StorageError};
use crate::estimators::{SampleEstimators, WeightedEstimators};
use crate::kinematics::quantities::{pdk, Energy, Mass};
use crate::kinematics::{Particles, Vector3, Vector4};
use crate::random::{CounterEngine, Squares3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, trace};

/// How generated weights are written into an existing weight column.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Weighting {
    /// Overwrite the weight.
    Replace,
    /// Multiply the existing weight, which combines the weights of cascade decays.
    Multiply,
}

impl Weighting {
    #[inline]
    fn apply(self, slot: &mut f64, weight: f64) {
        match self {
            Self::Replace => *slot = weight,
            Self::Multiply => *slot *= weight,
        }
    }
}

/// Quantities that depend on the mother only.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Frame {
    /// Kinetic energy shared among the daughters in the rest frame of the mother.
    te_cm_tm: f64,
    /// Inverse of the product of the largest possible breakup momenta.
    normalisation: f64,
    /// Velocity of the mother.
    beta: Vector3,
}

impl Frame {
    /// Returns `None` if the mother is below threshold or not a physical four-vector.
    fn new(mother: &Vector4, masses: &[f64], mass_sum: f64) -> Option<Self> {
        let mass = mother.mass();
        if !(mass > mass_sum && mother.e() > 0.0 && mother.is_finite()) {
            return None;
        }

        let te_cm_tm = mass - mass_sum;
        let mut emmax = te_cm_tm + masses[0];
        let mut emmin = 0.0;
        let mut product = 1.0;
        for n in 1..masses.len() {
            emmin += masses[n - 1];
            emmax += masses[n];
            product *= pdk(emmax, emmin, masses[n]);
        }

        Some(Self {
            te_cm_tm,
            normalisation: 1.0 / product,
            beta: mother.boost_vector(),
        })
    }
}

/// Rotates `v` around the z axis, then around the y axis.
#[inline]
fn rotate(v: &mut Vector4, (cos_z, sin_z): (f64, f64), (cos_y, sin_y): (f64, f64)) {
    let (x, y) = (v[1], v[2]);
    v[1] = cos_z * x - sin_z * y;
    v[2] = sin_z * x + cos_z * y;

    let (x, z) = (v[1], v[3]);
    v[1] = cos_y * x - sin_y * z;
    v[3] = sin_y * x + cos_y * z;
}

/// Generator of weighted `N`-body decays driven by the counter-based engine `E`.
///
/// The generator is immutable during generation; every event is a pure function of the
/// configuration, the seed and the event index.
///
/// Weights are normalised such that they never exceed [`PhaseSpace::max_weight`]. The constant
/// $w_\mathrm{max} = 1 / \prod_n \mathrm{pdk}(M_n^\mathrm{max}, M_n^\mathrm{min}, m_n)$ that
/// performs this normalisation is returned by [`PhaseSpace::weight_normalisation`].
#[derive(Clone, Debug)]
pub struct PhaseSpace<const N: usize, E: CounterEngine = Squares3> {
    mother: Vector4,
    masses: [f64; N],
    mass_sum: f64,
    frame: Frame,
    engine: E,
}

impl<const N: usize> PhaseSpace<N, Squares3> {
    /// Generator for decays of `mother` into daughters with `masses`, using a [`Squares3`]
    /// engine seeded with `seed`.
    ///
    /// # Errors
    ///
    /// See [`PhaseSpace::with_engine`].
    pub fn new(mother: Vector4, masses: [f64; N], seed: u64) -> Result<Self, ConfigError> {
        Self::with_engine(mother, masses, Squares3::with_seed(seed))
    }
}

impl<const N: usize, E: CounterEngine> PhaseSpace<N, E> {
    /// Number of uniform numbers consumed per event.
    pub const UNIFORMS_PER_EVENT: u64 = (3 * N as u64).saturating_sub(4);

    /// Generator for decays of `mother` into daughters with `masses`. Event `i` uses `engine`
    /// advanced by `i` strides.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if there are fewer than two daughters, a mass is negative or not
    /// finite, the mother is not time-like with positive energy, or the daughters are at least
    /// as heavy as the mother.
    pub fn with_engine(mother: Vector4, masses: [f64; N], engine: E) -> Result<Self, ConfigError> {
        if N < 2 {
            return Err(ConfigError::TooFewDaughters(N));
        }

        if let Some((index, &mass)) = masses
            .iter()
            .enumerate()
            .find(|(_, m)| !(m.is_finite() && **m >= 0.0))
        {
            return Err(ConfigError::InvalidMass { index, mass });
        }

        if !(mother.is_finite() && mother.e() > 0.0 && mother.mass2() > 0.0) {
            return Err(ConfigError::InvalidMother(
                mother[0], mother[1], mother[2], mother[3],
            ));
        }

        let mass_sum: f64 = masses.iter().sum();
        let frame = Frame::new(&mother, &masses, mass_sum).ok_or_else(|| {
            ConfigError::MassesExceedMother {
                mother: mother.mass(),
                daughters: mass_sum,
            }
        })?;

        debug!(
            daughters = N,
            mother_mass = mother.mass(),
            available_energy = frame.te_cm_tm,
            weight_normalisation = frame.normalisation,
            seed = engine.seed(),
            "configured phase-space generator"
        );

        Ok(Self {
            mother,
            masses,
            mass_sum,
            frame,
            engine,
        })
    }

    /// The four-momentum of the mother.
    pub const fn mother(&self) -> &Vector4 {
        &self.mother
    }

    /// The daughter masses.
    pub const fn masses(&self) -> &[f64; N] {
        &self.masses
    }

    /// Sum of the daughter masses.
    pub fn mass_sum(&self) -> Mass {
        Mass(self.mass_sum)
    }

    /// Kinetic energy shared among the daughters in the rest frame of the mother.
    pub fn available_energy(&self) -> Energy {
        Energy(self.frame.te_cm_tm)
    }

    /// The normalisation constant $w_\mathrm{max}$ of the weights for the configured mother.
    pub const fn weight_normalisation(&self) -> f64 {
        self.frame.normalisation
    }

    /// Upper bound of all generated weights, to be used for accept-reject unweighting.
    pub const fn max_weight(&self) -> f64 {
        1.0
    }

    /// The engine in its initial position.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Number of engine words consumed per event.
    pub const fn stride(&self) -> u64 {
        Self::UNIFORMS_PER_EVENT * E::WORDS_PER_F64
    }

    /// The engine positioned at the first word of event `index`.
    pub fn engine_for_event(&self, index: u64) -> E {
        let mut engine = self.engine.clone();
        engine.discard(index.wrapping_mul(self.stride()));
        engine
    }

    /// Generates event `index` for the configured mother.
    pub fn event(&self, index: u64) -> (f64, Particles<N>) {
        self.decay(&self.frame, &mut self.engine_for_event(index))
    }

    /// Generates event `index` for the mother `mother`. Mothers below the threshold
    /// $\sum_n m_n$ give weight zero and default daughters.
    pub fn event_from(&self, mother: &Vector4, index: u64) -> (f64, Particles<N>) {
        Frame::new(mother, &self.masses, self.mass_sum).map_or_else(
            || (0.0, Particles::default()),
            |frame| self.decay(&frame, &mut self.engine_for_event(index)),
        )
    }

    fn decay(&self, frame: &Frame, engine: &mut E) -> (f64, Particles<N>) {
        let masses = &self.masses;

        let mut rno = [0.0; N];
        rno[N - 1] = 1.0;
        if N > 2 {
            engine.fill_uniform(&mut rno[1..N - 1]);
            rno[1..N - 1].sort_unstable_by(f64::total_cmp);
        }

        let mut inv_mas = [0.0; N];
        let mut sum = 0.0;
        for n in 0..N {
            sum += masses[n];
            inv_mas[n] = rno[n].mul_add(frame.te_cm_tm, sum);
        }

        let mut pd = [0.0; N];
        let mut weight = frame.normalisation;
        for n in 0..N - 1 {
            pd[n] = pdk(inv_mas[n + 1], inv_mas[n], masses[n + 1]);
            weight *= pd[n];
        }

        let mut daughters = [Vector4::default(); N];
        daughters[0] = Vector4::new(pd[0].hypot(masses[0]), 0.0, pd[0], 0.0);

        for i in 1..N {
            daughters[i] = Vector4::new(pd[i - 1].hypot(masses[i]), 0.0, -pd[i - 1], 0.0);

            let cos_z = 2.0 * engine.uniform_f64() - 1.0;
            let sin_z = (1.0 - cos_z * cos_z).sqrt();
            let (sin_y, cos_y) = (2.0 * PI * engine.uniform_f64()).sin_cos();

            for daughter in &mut daughters[..=i] {
                rotate(daughter, (cos_z, sin_z), (cos_y, sin_y));
            }

            if i == N - 1 {
                break;
            }

            let beta = pd[i] / pd[i].hypot(inv_mas[i]);
            for daughter in &mut daughters[..=i] {
                daughter.apply_boost_to(Vector3::new(0.0, beta, 0.0));
            }
        }

        for daughter in &mut daughters {
            daughter.apply_boost_to(frame.beta);
        }

        (weight, Particles(daughters))
    }

    fn fill_range<B: Backend>(
        &self,
        backend: &B,
        first_event: usize,
        weights: &mut [f64],
        particles: &mut [Particles<N>],
        weighting: Weighting,
    ) {
        debug_assert_eq!(weights.len(), particles.len());

        backend.for_each_row((weights, particles), |index, (weight, daughters)| {
            let (w, d) = self.event((first_event + index) as u64);
            weighting.apply(weight, w);
            *daughters = d;
        });
    }

    /// Fills the columns `weights` and `particles` with events `0..weights.len()` on
    /// `backend`.
    ///
    /// # Panics
    ///
    /// Panics if the columns have different lengths.
    pub fn fill<B: Backend>(
        &self,
        backend: &B,
        weights: &mut [f64],
        particles: &mut [Particles<N>],
        weighting: Weighting,
    ) {
        assert_eq!(weights.len(), particles.len(), "columns differ in length");
        self.fill_range(backend, 0, weights, particles, weighting);
    }

    /// Fills the columns with decays of `mothers`, event `i` decaying `mothers[i]`. This is how
    /// the daughters of one chain are decayed further in a cascade.
    ///
    /// # Panics
    ///
    /// Panics if the three slices have different lengths.
    pub fn fill_from<B: Backend>(
        &self,
        backend: &B,
        mothers: &[Vector4],
        weights: &mut [f64],
        particles: &mut [Particles<N>],
        weighting: Weighting,
    ) {
        assert_eq!(mothers.len(), weights.len(), "columns differ in length");
        assert_eq!(mothers.len(), particles.len(), "columns differ in length");

        backend.for_each_row(
            (mothers, weights, particles),
            |index, (mother, weight, daughters)| {
                let (w, d) = self.event_from(mother, index as u64);
                weighting.apply(weight, w);
                *daughters = d;
            },
        );
    }

    /// Generates events `0..decays.len()` into `decays`, on the backend of the storage.
    pub fn generate<B: Backend>(&self, decays: &mut Decays<N, B>) {
        let (backend, weights, particles) = decays.parts_mut();
        self.fill_range(backend, 0, weights, particles, Weighting::Replace);
    }

    /// Resizes `decays` to the number of `mothers` and generates one decay of every mother.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if `decays` cannot be resized.
    pub fn generate_from<B: Backend>(
        &self,
        mothers: &[Vector4],
        decays: &mut Decays<N, B>,
    ) -> Result<(), StorageError> {
        decays.resize(mothers.len())?;
        let (backend, weights, particles) = decays.parts_mut();
        self.fill_from(backend, mothers, weights, particles, Weighting::Replace);
        Ok(())
    }

    /// Generates `events` events into `decays` in batches of `batch` events, calling `callback`
    /// after every batch. If the callback breaks, the storage is truncated to the events
    /// generated so far. The generated events are identical to those of [`PhaseSpace::generate`].
    /// Returns the number of generated events.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if `decays` cannot be resized.
    pub fn generate_batches<B: Backend>(
        &self,
        decays: &mut Decays<N, B>,
        events: usize,
        batch: usize,
        callback: &impl Callback,
    ) -> Result<usize, StorageError> {
        decays.resize(events)?;

        let batch = batch.max(1);
        let mut cumulative = SampleEstimators::<f64>::default();
        let mut generated = 0;

        for (number, start) in (0..events).step_by(batch).enumerate() {
            let end = (start + batch).min(events);
            let (backend, weights, particles) = decays.parts_mut();
            let (weights, particles) = (&mut weights[start..end], &mut particles[start..end]);

            self.fill_range(backend, start, weights, particles, Weighting::Replace);

            let estimators = backend.fold_rows(
                &weights[..],
                SampleEstimators::default,
                |mut acc, _, &weight| {
                    acc.push(weight);
                    acc
                },
                |a, b| a + b,
            );
            cumulative = cumulative + estimators.clone();
            generated = end;

            trace!(batch = number, start, end, "generated batch");

            let report = BatchReport {
                batch: number,
                events: start..end,
                estimators,
                cumulative: cumulative.clone(),
            };

            if callback.after_batch(&report).is_break() {
                debug!(generated, requested = events, "generation stopped by callback");
                decays.resize(generated)?;
                break;
            }
        }

        Ok(generated)
    }

    /// Weighted mean and variance of `functor` over events `0..events`, generated on `backend`
    /// without storing them.
    pub fn average_on<B, F>(&self, backend: &B, events: usize, functor: F) -> WeightedEstimators<f64>
    where
        B: Backend,
        F: Fn(&Particles<N>) -> f64 + Sync,
    {
        backend.fold_rows(
            0..events,
            WeightedEstimators::default,
            |mut acc, _, index| {
                let (weight, particles) = self.event(index as u64);
                acc.push(weight, functor(&particles));
                acc
            },
            |a, b| a + b,
        )
    }
}

/// Serialisable description of a decay.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecayConfig {
    /// Four-momentum of the mother, $(E, p_x, p_y, p_z)$.
    pub mother: [f64; 4],
    /// Daughter masses.
    pub masses: Vec<f64>,
    /// Seed of the engine.
    #[serde(default)]
    pub seed: u64,
}

impl<const N: usize, E: CounterEngine> TryFrom<&DecayConfig> for PhaseSpace<N, E> {
    type Error = ConfigError;

    fn try_from(config: &DecayConfig) -> Result<Self, ConfigError> {
        let masses: [f64; N] =
            config
                .masses
                .as_slice()
                .try_into()
                .map_err(|_| ConfigError::DaughterCount {
                    expected: N,
                    found: config.masses.len(),
                })?;

        Self::with_engine(Vector4(config.mother), masses, E::with_seed(config.seed))
    }
}

impl<const N: usize, E: CounterEngine> From<&PhaseSpace<N, E>> for DecayConfig {
    fn from(generator: &PhaseSpace<N, E>) -> Self {
        Self {
            mother: generator.mother.0,
            masses: generator.masses.to_vec(),
            seed: generator.engine.seed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Rayon, Sequential, Threads};
    use crate::estimators::{BasicEstimators, Estimators};
    use crate::kinematics::quantities::breakup_momentum;
    use crate::random::{Ranluxpp, Squares4};
    use assert_approx_eq::assert_approx_eq;
    use std::cell::Cell;
    use std::ops::ControlFlow;

    const TOLERANCE: f64 = 1e-12;

    fn three_body() -> PhaseSpace<3> {
        PhaseSpace::new(Vector4::at_rest(1.0), [0.2, 0.2, 0.2], 12345).unwrap()
    }

    fn check_event<const N: usize>(mother: &Vector4, masses: &[f64; N], event: &Particles<N>) {
        let total = event.total();
        for i in 0..4 {
            assert_approx_eq!(total[i], mother[i], 1e-12 * mother.e());
        }
        for (daughter, &mass) in event.iter().zip(masses) {
            assert_approx_eq!(daughter.mass2(), mass * mass, 1e-10);
        }
    }

    #[test]
    fn configuration_errors() {
        let mother = Vector4::at_rest(1.0);

        assert_eq!(
            PhaseSpace::<1>::new(mother, [0.1], 0).unwrap_err(),
            ConfigError::TooFewDaughters(1)
        );
        assert_eq!(
            PhaseSpace::new(mother, [0.1, -0.1], 0).unwrap_err(),
            ConfigError::InvalidMass {
                index: 1,
                mass: -0.1
            }
        );
        assert!(matches!(
            PhaseSpace::new(mother, [f64::NAN, 0.1], 0).unwrap_err(),
            ConfigError::InvalidMass { index: 0, .. }
        ));
        assert_eq!(
            PhaseSpace::new(Vector4::new(1.0, 2.0, 0.0, 0.0), [0.1, 0.1], 0).unwrap_err(),
            ConfigError::InvalidMother(1.0, 2.0, 0.0, 0.0)
        );
        assert_eq!(
            PhaseSpace::new(Vector4::at_rest(-1.0), [0.1, 0.1], 0).unwrap_err(),
            ConfigError::InvalidMother(-1.0, 0.0, 0.0, 0.0)
        );
        assert!(matches!(
            PhaseSpace::new(mother, [0.25, 0.875], 0).unwrap_err(),
            ConfigError::MassesExceedMother { mother, daughters } if mother == 1.0 && daughters == 1.125
        ));
        assert!(matches!(
            PhaseSpace::new(mother, [0.5, 0.5], 0).unwrap_err(),
            ConfigError::MassesExceedMother { .. }
        ));
    }

    #[test]
    fn derived_quantities() {
        let generator = three_body();
        assert_approx_eq!(generator.available_energy().value(), 0.4, TOLERANCE);
        assert_approx_eq!(generator.mass_sum().value(), 0.6, TOLERANCE);
        assert_approx_eq!(generator.weight_normalisation(), 7.365_695_637_359_874, TOLERANCE);
        assert_eq!(generator.max_weight(), 1.0);
        assert_eq!(generator.stride(), 10);
        assert_eq!(PhaseSpace::<3, Ranluxpp>::UNIFORMS_PER_EVENT, 5);
        assert_eq!(generator.masses(), &[0.2, 0.2, 0.2]);
        assert_eq!(generator.mother(), &Vector4::at_rest(1.0));
        assert_eq!(generator.engine().position(), 0);
        assert_eq!(generator.engine_for_event(3).position(), 30);
    }

    #[test]
    fn reference_weights() {
        let generator = three_body();
        assert_approx_eq!(generator.event(0).0, 0.350_420_295_698_823_2, TOLERANCE);
        assert_approx_eq!(generator.event(1).0, 0.453_481_877_959_162_06, TOLERANCE);
        assert_approx_eq!(generator.event(42).0, 0.369_926_829_163_531_5, TOLERANCE);

        let generator = PhaseSpace::new(
            Vector4::new(5.5, 0.3, -1.2, 2.0),
            [0.139, 0.494, 0.938, 0.1],
            12345,
        )
        .unwrap();
        assert_approx_eq!(generator.weight_normalisation(), 0.100_490_377_727_562_54, TOLERANCE);
        assert_approx_eq!(generator.event(0).0, 0.041_525_115_691_656_82, TOLERANCE);
        assert_approx_eq!(generator.event(42).0, 0.000_639_254_931_108_998_8, TOLERANCE);
    }

    #[test]
    fn conservation_and_mass_shell() {
        let mother = Vector4::new(5.5, 0.3, -1.2, 2.0);
        let masses = [0.139, 0.494, 0.938, 0.1];
        let generator = PhaseSpace::new(mother, masses, 7).unwrap();

        for index in 0..500 {
            let (weight, event) = generator.event(index);
            assert!(weight > 0.0 && weight <= generator.max_weight());
            check_event(&mother, &masses, &event);
        }
    }

    #[test]
    fn two_body_closed_form() {
        let generator = PhaseSpace::new(Vector4::at_rest(5.279), [1.865, 0.139], 1).unwrap();
        let p = breakup_momentum(Mass::new(5.279), Mass::new(1.865), Mass::new(0.139)).value();

        for index in 0..100 {
            let (weight, event) = generator.event(index);
            assert_approx_eq!(weight, 1.0, TOLERANCE);
            assert_approx_eq!(event.momentum(0).value(), p, 1e-12);
            assert_approx_eq!(event.momentum(1).value(), p, 1e-12);
        }
    }

    #[test]
    fn events_are_pure_functions_of_the_index() {
        let generator = three_body();
        let late = generator.event(1000);
        for index in 0..10 {
            let _ = generator.event(index);
        }
        assert_eq!(generator.event(1000), late);
        assert_ne!(generator.event(999), late);

        // events draw from disjoint, consecutive blocks of a single stream
        let mut engine = Squares3::with_seed(12345);
        engine.discard(42 * 10);
        let u = engine.uniform_f64();
        assert_eq!(generator.engine_for_event(42).uniform_f64(), u);
    }

    #[test]
    fn event_from_matches_event_for_the_configured_mother() {
        let generator = three_body();
        assert_eq!(generator.event_from(&Vector4::at_rest(1.0), 5), generator.event(5));

        let moving = Vector4::new(3.0, 1.0, 0.5, -0.5);
        let (weight, event) = generator.event_from(&moving, 5);
        assert!(weight > 0.0);
        check_event(&moving, generator.masses(), &event);

        // below threshold
        let (weight, event) = generator.event_from(&Vector4::at_rest(0.5), 5);
        assert_eq!(weight, 0.0);
        assert_eq!(event, Particles::default());
    }

    #[test]
    fn other_engines() {
        let mother = Vector4::new(2.0, 0.0, 0.0, 1.0);
        let masses = [0.1, 0.2, 0.3, 0.4, 0.5];

        let squares4 = PhaseSpace::with_engine(mother, masses, Squares4::with_seed(3)).unwrap();
        let ranluxpp = PhaseSpace::with_engine(mother, masses, Ranluxpp::with_seed(3)).unwrap();
        assert_eq!(ranluxpp.stride(), 11);

        for index in [0, 1, 77] {
            check_event(&mother, &masses, &squares4.event(index).1);
            check_event(&mother, &masses, &ranluxpp.event(index).1);
        }
    }

    #[test]
    fn backends_generate_identical_events() {
        let generator = three_body();

        let mut sequential = Decays::with_len(Sequential, 1000).unwrap();
        let mut threads = Decays::with_len(Threads::new(3), 1000).unwrap();
        let mut rayon = Decays::with_len(Rayon::new(64), 1000).unwrap();

        generator.generate(&mut sequential);
        generator.generate(&mut threads);
        generator.generate(&mut rayon);

        assert_eq!(sequential.weights(), threads.weights());
        assert_eq!(sequential.weights(), rayon.weights());
        assert_eq!(sequential.particles(), threads.particles());
        assert_eq!(sequential.particles(), rayon.particles());
        assert_eq!(sequential.event(42), (&generator.event(42).0, &generator.event(42).1));
    }

    #[test]
    fn multiplied_weights() {
        let generator = three_body();
        let mut weights = vec![2.0; 4];
        let mut particles = vec![Particles::default(); 4];

        generator.fill(&Sequential, &mut weights, &mut particles, Weighting::Multiply);
        for (index, weight) in weights.iter().enumerate() {
            assert_eq!(*weight, 2.0 * generator.event(index as u64).0);
        }

        generator.fill(&Sequential, &mut weights, &mut particles, Weighting::Replace);
        assert_eq!(weights[3], generator.event(3).0);
    }

    #[test]
    fn generate_from_mothers() {
        let generator = three_body();
        let mothers = vec![
            Vector4::at_rest(1.0),
            Vector4::new(2.0, 0.0, 1.0, 0.0),
            Vector4::at_rest(0.1),
        ];
        let mut decays = Decays::new(Threads::new(2));
        generator.generate_from(&mothers, &mut decays).unwrap();

        assert_eq!(decays.len(), 3);
        assert_eq!(decays.event(0), (&generator.event(0).0, &generator.event(0).1));
        check_event(&mothers[1], generator.masses(), decays.event(1).1);
        assert_eq!(*decays.event(2).0, 0.0);
    }

    #[test]
    fn batches_equal_one_shot_generation() {
        let generator = three_body();
        let mut one_shot = Decays::with_len(Sequential, 1003).unwrap();
        generator.generate(&mut one_shot);

        let batches = Cell::new(0);
        let callback = |report: &BatchReport| {
            batches.set(batches.get() + 1);
            assert_eq!(report.batch + 1, batches.get());
            assert_eq!(report.cumulative.events(), report.events.end);
            ControlFlow::Continue(())
        };

        let mut batched = Decays::new(Threads::new(4));
        let generated = generator
            .generate_batches(&mut batched, 1003, 100, &callback)
            .unwrap();

        assert_eq!(generated, 1003);
        assert_eq!(batches.get(), 11);
        assert_eq!(batched.weights(), one_shot.weights());
        assert_eq!(batched.particles(), one_shot.particles());
    }

    #[test]
    fn batches_can_be_cancelled() {
        let generator = three_body();
        let callback = |report: &BatchReport| {
            if report.batch == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let mut decays = Decays::new(Sequential);
        let generated = generator
            .generate_batches(&mut decays, 1000, 50, &callback)
            .unwrap();

        assert_eq!(generated, 150);
        assert_eq!(decays.len(), 150);
        assert_eq!(decays.event(149).0, &generator.event(149).0);
    }

    #[test]
    fn average_on_without_storage() {
        let generator = three_body();

        let mut decays = Decays::with_len(Sequential, 2000).unwrap();
        generator.generate(&mut decays);

        let energy = |p: &Particles<3>| p[0].e();
        let stored = decays.average_on(energy);
        let streamed = generator.average_on(&Rayon::new(128), 2000, energy);

        assert_eq!(streamed.events(), 2000);
        assert_approx_eq!(streamed.mean(), stored.mean(), 1e-12);
        assert_approx_eq!(streamed.var(), stored.var(), 1e-12);
        // symmetric decay: every daughter carries a third of the energy on average
        assert_approx_eq!(streamed.mean(), 1.0 / 3.0, 5e-3);
    }

    #[test]
    fn decay_config_round_trip() {
        let json = r#"{ "mother": [1.0, 0.0, 0.0, 0.0], "masses": [0.2, 0.2, 0.2], "seed": 12345 }"#;
        let config: DecayConfig = serde_json::from_str(json).unwrap();

        let generator = PhaseSpace::<3>::try_from(&config).unwrap();
        assert_eq!(generator.event(42), three_body().event(42));
        assert_eq!(DecayConfig::from(&generator), config);

        assert_eq!(
            PhaseSpace::<2>::try_from(&config).unwrap_err(),
            ConfigError::DaughterCount {
                expected: 2,
                found: 3
            }
        );

        let config: DecayConfig =
            serde_json::from_str(r#"{ "mother": [1.0, 0.0, 0.0, 0.0], "masses": [0.7, 0.7] }"#)
                .unwrap();
        assert_eq!(config.seed, 0);
        assert!(PhaseSpace::<2, Ranluxpp>::try_from(&config).is_err());
    }
}
