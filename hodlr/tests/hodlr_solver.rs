/////////////////////////////////////////////////////////////////////////////////////////////
//
// Integration tests for the user-facing HODLR solver.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use equator::assert;
use faer::{prelude::Solve, Mat, Side};
use hodlr::{
    progress::{closure_sink, ProgressMsg},
    HodlrError, HodlrSolver, SolverParams, StateIOError,
};
use hodlr_core::SolverError;
use hodlr_kernels::{get_covariance_matrix, KernelSpec, KernelType};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::{Arc, Mutex};

fn sorted_points(n: usize, seed: u64) -> Mat<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x: Vec<f64> = (0..n).map(|_| 10.0 * rng.random::<f64>()).collect();
    x.sort_by(|a, b| a.total_cmp(b));
    Mat::from_fn(n, 1, |i, _| x[i])
}

fn dense_covariance(spec: &KernelSpec, x: &Mat<f64>, yerr: &[f64]) -> Mat<f64> {
    let mut k = get_covariance_matrix(x, x, spec);
    for (i, e) in yerr.iter().enumerate() {
        k[(i, i)] += e * e;
    }
    k
}

#[test]
fn likelihood_terms_match_dense() {
    let n = 600;
    let x = sorted_points(n, 21);
    let yerr: Vec<f64> = (0..n).map(|i| 0.1 + 0.05 * ((i % 7) as f64)).collect();
    let mut rng = StdRng::seed_from_u64(22);
    let y: Vec<f64> = (0..n).map(|_| rng.random::<f64>() - 0.5).collect();

    for &kernel_type in &[
        KernelType::SquaredExponential,
        KernelType::Matern32,
        KernelType::Matern52,
        KernelType::RationalQuadratic,
    ] {
        let spec = KernelSpec::builder(kernel_type)
            .amplitude(1.3)
            .length_scale(0.9)
            .alpha(1.5)
            .build()
            .unwrap();
        let params = SolverParams::builder().min_size(40).tol(1e-12).build();

        let mut solver = HodlrSolver::new(spec, params).unwrap();
        solver.compute(x.as_ref(), &yerr).unwrap();
        assert!(solver.computed());
        assert!(solver.size() == n);

        let k = dense_covariance(&spec, &x, &yerr);
        let llt = k.llt(Side::Lower).unwrap();
        let y_mat = Mat::from_fn(n, 1, |i, _| y[i]);
        let alpha = llt.solve(&y_mat);
        let expected_quad: f64 = (0..n).map(|i| y[i] * alpha[(i, 0)]).sum();
        let l = llt.L();
        let expected_log_det = 2.0 * (0..n).map(|i| l[(i, i)].ln()).sum::<f64>();

        let quad = solver.dot_solve(&y).unwrap();
        let log_det = solver.log_determinant().unwrap();

        assert!((quad - expected_quad).abs() < 1e-6 * expected_quad.abs());
        assert!((log_det - expected_log_det).abs() < 1e-6 * expected_log_det.abs().max(1.0));
    }
}

#[test]
fn in_place_and_copying_solves_agree() {
    let n = 300;
    let x = sorted_points(n, 23);
    let yerr = vec![0.2; n];
    let spec = KernelSpec::builder(KernelType::Exponential)
        .length_scale(2.0)
        .build()
        .unwrap();
    let params = SolverParams::builder().min_size(32).tol(1e-10).build();

    let mut solver = HodlrSolver::new(spec, params).unwrap();
    solver.compute(x.as_ref(), &yerr).unwrap();

    let b = Mat::from_fn(n, 3, |i, j| ((i * (j + 1)) as f64 * 0.01).cos());
    let copied = solver.apply_inverse_copy(b.as_ref()).unwrap();

    let mut in_place = b.clone();
    solver.apply_inverse(&mut in_place).unwrap();

    assert!(copied == in_place);
    assert!(copied != b);

    let k = dense_covariance(&spec, &x, &yerr);
    let residual = &k * &copied - &b;
    assert!(residual.norm_l2() / b.norm_l2() < 1e-7);
}

#[test]
fn inverse_has_solver_size() {
    let n = 50;
    let x = sorted_points(n, 24);
    let yerr = vec![0.3; n];
    let spec = KernelSpec::builder(KernelType::Matern52).build().unwrap();
    let params = SolverParams::builder().min_size(8).tol(1e-12).build();

    let mut solver = HodlrSolver::new(spec, params).unwrap();
    solver.compute(x.as_ref(), &yerr).unwrap();

    let inverse = solver.get_inverse().unwrap();
    let k = dense_covariance(&spec, &x, &yerr);

    assert!(inverse.nrows() == n);
    assert!((&k * &inverse - Mat::<f64>::identity(n, n)).norm_l2() < 1e-8);
}

#[test]
fn queries_before_compute_fail() {
    let spec = KernelSpec::builder(KernelType::SquaredExponential)
        .build()
        .unwrap();
    let solver = HodlrSolver::new(spec, SolverParams::default()).unwrap();

    assert!(!solver.computed());
    assert!(matches!(
        solver.log_determinant(),
        Err(HodlrError::Solver(SolverError::NotComputed))
    ));
    assert!(matches!(
        solver.dot_solve(&[1.0, 2.0]),
        Err(HodlrError::Solver(SolverError::NotComputed))
    ));
    assert!(matches!(
        solver.get_inverse(),
        Err(HodlrError::Solver(SolverError::NotComputed))
    ));
}

#[test]
fn mismatched_shapes_are_rejected() {
    let spec = KernelSpec::builder(KernelType::SquaredExponential)
        .ndim(2)
        .build()
        .unwrap();
    let mut solver = HodlrSolver::new(spec, SolverParams::default()).unwrap();

    let wrong_dim = Mat::<f64>::zeros(5, 1);
    assert!(matches!(
        solver.compute(wrong_dim.as_ref(), &[0.1; 5]),
        Err(HodlrError::Solver(SolverError::DimensionMismatch { expected: 2, found: 1, .. }))
    ));

    let x = Mat::from_fn(5, 2, |i, j| (i + j) as f64);
    solver.compute(x.as_ref(), &[0.1; 5]).unwrap();

    assert!(matches!(
        solver.dot_solve(&[1.0; 4]),
        Err(HodlrError::Solver(SolverError::DimensionMismatch { expected: 5, found: 4, .. }))
    ));
}

#[test]
fn progress_reports_tree_and_log_det() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::clone(&received);
    let (sink, listener) = closure_sink(1024, move |msg| store.lock().unwrap().push(msg));

    let n = 200;
    let x = sorted_points(n, 25);
    let spec = KernelSpec::builder(KernelType::SquaredExponential)
        .build()
        .unwrap();
    let params = SolverParams::builder()
        .min_size(50)
        .tol(1e-8)
        .progress_callback(sink)
        .build();

    let mut solver = HodlrSolver::new(spec, params).unwrap();
    solver.compute(x.as_ref(), &vec![0.1; n]).unwrap();
    let log_det = solver.log_determinant().unwrap();

    // Dropping the solver drops the last sink, which ends the listener.
    drop(solver);
    listener.join().unwrap();

    let received = received.lock().unwrap();
    assert!(matches!(received[0], ProgressMsg::Message { .. }));

    // Compression events arrive during the build, children before the root.
    let compressed: Vec<_> = received[1..4].to_vec();
    assert!(compressed
        .iter()
        .all(|m| matches!(m, ProgressMsg::NodeCompressed { .. })));
    assert!(matches!(compressed[2], ProgressMsg::NodeCompressed { level: 0, .. }));

    assert_eq!(
        received[4],
        ProgressMsg::TreeBuilt {
            num_leaves: 4,
            num_internal: 3,
            depth: 2
        }
    );
    assert!(received.len() == 6);
    assert_eq!(received.last(), Some(&ProgressMsg::Computed { log_det }));
}

#[test]
fn state_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solver.json");

    let spec = KernelSpec::builder(KernelType::Matern32)
        .amplitude(0.7)
        .length_scale(1.7)
        .build()
        .unwrap();
    let params = SolverParams::builder().min_size(16).tol(1e-9).seed(12).build();

    let n = 120;
    let x = sorted_points(n, 26);
    let yerr = vec![0.1; n];

    let mut solver = HodlrSolver::new(spec, params).unwrap();
    solver.compute(x.as_ref(), &yerr).unwrap();
    solver.save_state(&path).unwrap();

    let mut restored = HodlrSolver::load_state(&path, None).unwrap();
    assert!(restored.serialize() == solver.serialize());

    // The factorisation itself is never persisted.
    assert!(!restored.computed());

    restored.compute(x.as_ref(), &yerr).unwrap();
    assert!(restored.log_determinant().unwrap() == solver.log_determinant().unwrap());
}

#[test]
fn state_file_with_wrong_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.json");
    std::fs::write(
        &path,
        r#"{"format":"something_else","version":1,"state":{"kernel":{"kernel_type":"White","amplitude":1.0,"length_scale":1.0,"alpha":1.0,"ndim":1},"min_size":10,"tol":0.1,"seed":0}}"#,
    )
    .unwrap();

    let err = HodlrSolver::load_state(&path, None).unwrap_err();
    assert!(matches!(
        err,
        HodlrError::StateIO(StateIOError::FormatMismatch { .. })
    ));

    let missing = HodlrSolver::load_state(dir.path().join("missing.json"), None).unwrap_err();
    assert!(matches!(missing, HodlrError::StateIO(StateIOError::Open { .. })));
}
