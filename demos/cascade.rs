use genbod::estimators::BasicEstimators;
use genbod::{Chains, Particles, PhaseSpace, Rayon, Vector4, Weighting};

// B0 -> J/psi K*0, J/psi -> mu+ mu-, K*0 -> K+ pi-
type Cascade = (Particles<2>, Particles<2>, Particles<2>);

const EVENTS: usize = 200_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let b0 = PhaseSpace::new(Vector4::at_rest(5.279), [3.097, 0.892], 1)?;
    let jpsi = PhaseSpace::new(Vector4::at_rest(3.097), [0.106, 0.106], 2)?;
    let kstar = PhaseSpace::new(Vector4::at_rest(0.892), [0.494, 0.139], 3)?;

    let mut chains: Chains<Cascade, Rayon> = Chains::with_len(Rayon::default(), EVENTS)?;

    {
        let (backend, weights, (b0_daughters, jpsi_daughters, kstar_daughters)) =
            chains.parts_mut();

        b0.fill(backend, weights, b0_daughters, Weighting::Replace);

        let mothers: Vec<_> = b0_daughters.iter().map(|p| p[0]).collect();
        jpsi.fill_from(backend, &mothers, weights, jpsi_daughters, Weighting::Multiply);

        let mothers: Vec<_> = b0_daughters.iter().map(|p| p[1]).collect();
        kstar.fill_from(backend, &mothers, weights, kstar_daughters, Weighting::Multiply);
    }

    let estimators = chains.weight_estimators();
    println!("mean weight: {} \u{b1} {}", estimators.mean(), estimators.std());

    let four_body_mass = chains.average_on(
        |(_, mumu, kpi): (&Particles<2>, &Particles<2>, &Particles<2>)| {
            (mumu.total() + kpi.total()).mass()
        },
    );
    println!(
        "m(mu mu K pi) = {} \u{b1} {}",
        four_body_mass.mean(),
        four_body_mass.std()
    );

    let muon_energy = chains.average_on(
        |(_, mumu, _): (&Particles<2>, &Particles<2>, &Particles<2>)| mumu[0].e(),
    );
    println!(
        "<E(mu+)> = {} \u{b1} {}",
        muon_energy.mean(),
        muon_energy.std()
    );

    Ok(())
}
