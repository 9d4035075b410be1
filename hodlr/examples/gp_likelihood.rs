use faer::Mat;
use hodlr::{
    progress::{closure_sink, ProgressMsg},
    HodlrSolver, SolverParams,
};
use hodlr_kernels::{KernelSpec, KernelType};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Noisy samples of a smooth signal at sorted random times
    let n = 20_000usize;
    let mut rng = StdRng::seed_from_u64(42);
    let mut t: Vec<f64> = (0..n).map(|_| 100.0 * rng.random::<f64>()).collect();
    t.sort_by(|a, b| a.total_cmp(b));

    let x = Mat::from_fn(n, 1, |i, _| t[i]);
    let yerr = vec![0.1; n];
    let y: Vec<f64> = t
        .iter()
        .map(|ti| (0.3 * ti).sin() + 0.1 * (rng.random::<f64>() - 0.5))
        .collect();

    let (sink, _listener) = closure_sink(256, |msg| {
        if let ProgressMsg::TreeBuilt { num_leaves, depth, .. } = msg {
            println!("tree: {num_leaves} leaves, depth {depth}");
        }
    });

    let params = SolverParams::builder()
        .min_size(128)
        .tol(1e-8)
        .progress_callback(sink)
        .build();

    // Scan the length scale of a Matern 3/2 kernel
    for length_scale in [0.5, 1.0, 2.0, 4.0, 8.0] {
        let kernel = KernelSpec::builder(KernelType::Matern32)
            .length_scale(length_scale)
            .build()?;

        let mut solver = HodlrSolver::new(kernel, params.clone())?;
        solver.compute(x.as_ref(), &yerr)?;

        let log_likelihood = -0.5
            * (solver.dot_solve(&y)? + solver.log_determinant()? + n as f64 * (2.0 * PI).ln());

        println!("length scale {length_scale:>4}: ln L = {log_likelihood:.3}");
    }

    Ok(())
}
