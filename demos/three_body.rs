use genbod::callbacks::LogCallback;
use genbod::estimators::{BasicEstimators, Estimators};
use genbod::histograms::HistogramSpecification;
use genbod::{Decays, PhaseSpace, Threads, Vector4};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // D+ -> K- pi+ pi+ with a boosted D+
    let mother = Vector4::new(4.0, 0.0, 0.0, (4.0_f64 * 4.0 - 1.869 * 1.869).sqrt());
    let generator = PhaseSpace::new(mother, [0.494, 0.139, 0.139], 0xcafe_f00d)?;

    let mut decays = Decays::new(Threads::default());
    generator.generate_batches(&mut decays, 400_000, 100_000, &LogCallback)?;

    let estimators = decays.weight_estimators();
    println!(
        "events: {}, mean weight: {} \u{b1} {}, efficiency: {}",
        estimators.events(),
        estimators.mean(),
        estimators.std(),
        estimators.efficiency()
    );

    // Dalitz plot: m^2(K pi_1) vs. m^2(K pi_2)
    let specification = HistogramSpecification::new(
        vec![0.3, 0.3],
        vec![3.1, 3.1],
        vec![8, 8],
        vec!["m2_12".to_owned(), "m2_13".to_owned()],
        "dalitz".to_owned(),
    );
    let dalitz = decays.histogram(&specification, |p| {
        [
            p.invariant_mass(&[0, 1]).value().powi(2),
            p.invariant_mass(&[0, 2]).value().powi(2),
        ]
    });

    for (bin, estimator) in dalitz.bins().iter().enumerate() {
        println!("{bin:>3} {:.6e} \u{b1} {:.6e}", estimator.mean(), estimator.std());
    }

    let accepted = decays.unweight::<genbod::Squares4>(1, Some(generator.max_weight()));
    println!("unweighted events: {accepted}");

    Ok(())
}
