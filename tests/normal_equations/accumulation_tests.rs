use approx::assert_relative_eq;
use ndarray::{array, Array1, Array2};
use normeq_rs::design::build_contributions;
use normeq_rs::{DesignMatrix, ErrorKind, GenericNormalEquations, NormalEqError, NormalEquations};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use crate::test_helpers::{assert_normal_equations_eq, matrix_approx_eq, random_design};

fn two_value_design() -> DesignMatrix {
    let mut dm = DesignMatrix::new();
    dm.add_derivative("Value0", Array2::from_elem((10, 1), 1.0))
        .unwrap();
    dm.add_derivative("Value1", Array2::from_elem((10, 1), 2.0))
        .unwrap();
    dm.add_residual(Array1::from_elem(10, -1.0), Array1::ones(10))
        .unwrap();
    dm
}

#[test]
fn test_scalar_parameters_from_design_matrix() {
    let ne = GenericNormalEquations::from_design_matrix(&two_value_design()).unwrap();

    assert_relative_eq!(
        ne.normal_matrix("Value0", "Value0").unwrap()[[0, 0]],
        10.0,
        epsilon = 1e-7
    );
    assert_relative_eq!(
        ne.normal_matrix("Value1", "Value1").unwrap()[[0, 0]],
        40.0,
        epsilon = 1e-7
    );
    assert_relative_eq!(
        ne.normal_matrix("Value0", "Value1").unwrap()[[0, 0]],
        20.0,
        epsilon = 1e-7
    );
    assert_relative_eq!(
        ne.normal_matrix("Value1", "Value0").unwrap()[[0, 0]],
        20.0,
        epsilon = 1e-7
    );
    assert_relative_eq!(ne.data_vector("Value0").unwrap()[0], -10.0, epsilon = 1e-7);
    assert_relative_eq!(ne.data_vector("Value1").unwrap()[0], -20.0, epsilon = 1e-7);
}

#[test]
fn test_data_points_split_over_data_sets() {
    // Ten single-point data sets give the same result as one set of ten.
    let mut dm = DesignMatrix::new();
    for _ in 0..10 {
        dm.add_derivative("Value0", array![[1.0]]).unwrap();
        dm.add_derivative("Value1", array![[2.0]]).unwrap();
        dm.add_residual(array![-1.0], array![1.0]).unwrap();
    }

    let split = GenericNormalEquations::from_design_matrix(&dm).unwrap();
    let whole = GenericNormalEquations::from_design_matrix(&two_value_design()).unwrap();
    assert_normal_equations_eq(&split, &whole, 1e-7);
}

#[test]
fn test_symmetry_of_cross_terms() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let params = [("gain.x", 2), ("gain.y", 2), ("leakage", 3), ("offset", 1)];
    let mut ne = GenericNormalEquations::new();
    ne.add_design_matrix(&random_design(&mut rng, &params[..2], 4, 6))
        .unwrap();
    ne.add_design_matrix(&random_design(&mut rng, &params[1..], 4, 6))
        .unwrap();
    ne.add_design_matrix(&random_design(&mut rng, &params, 4, 6))
        .unwrap();

    for p in ne.unknowns() {
        for q in ne.unknowns() {
            if p == q {
                continue;
            }
            let pq = ne.normal_matrix(&p, &q).unwrap();
            let qp = ne.normal_matrix(&q, &p).unwrap();
            assert!(
                matrix_approx_eq(pq, &qp.t().to_owned(), 1e-10),
                "({}, {}) is not the transpose of ({}, {})",
                p,
                q,
                q,
                p
            );
        }
    }
    assert!(ne.validate().is_ok());
}

#[test]
fn test_independent_parameters_are_zero_filled() {
    let mut ne = GenericNormalEquations::new();
    ne.add("A", array![[2.0, 0.5], [0.5, 1.0]], &array![1.0, 1.0])
        .unwrap();
    ne.add("B", array![[3.0]], &array![-1.0]).unwrap();

    assert_eq!(ne.normal_matrix("A", "B").unwrap(), &Array2::<f64>::zeros((2, 1)));
    assert_eq!(ne.normal_matrix("B", "A").unwrap(), &Array2::<f64>::zeros((1, 2)));
}

#[test]
fn test_batches_with_disjoint_parameters_are_zero_filled() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut ne = GenericNormalEquations::new();
    ne.add_design_matrix(&random_design(&mut rng, &[("a", 2)], 3, 4))
        .unwrap();
    ne.add_design_matrix(&random_design(&mut rng, &[("b", 3)], 3, 4))
        .unwrap();

    assert_eq!(ne.normal_matrix("a", "b").unwrap(), &Array2::<f64>::zeros((2, 3)));
    assert_eq!(ne.normal_matrix("b", "a").unwrap(), &Array2::<f64>::zeros((3, 2)));
}

#[test]
fn test_partial_batch_keeps_earlier_cross_terms() {
    let mut ne = GenericNormalEquations::from_design_matrix(&two_value_design()).unwrap();
    let before = ne.normal_matrix("Value0", "Value1").unwrap().clone();

    let mut only_value0 = DesignMatrix::new();
    only_value0
        .add_derivative("Value0", Array2::from_elem((5, 1), 1.0))
        .unwrap();
    only_value0
        .add_residual(Array1::from_elem(5, 1.0), Array1::ones(5))
        .unwrap();
    ne.add_design_matrix(&only_value0).unwrap();

    assert_eq!(ne.normal_matrix("Value0", "Value1").unwrap(), &before);
    assert_relative_eq!(
        ne.normal_matrix("Value0", "Value0").unwrap()[[0, 0]],
        15.0,
        epsilon = 1e-7
    );
    assert_relative_eq!(ne.data_vector("Value0").unwrap()[0], -5.0, epsilon = 1e-7);
}

#[test]
fn test_batch_mixing_known_and_new_parameters() {
    // "a" is new and sorts before the known "b": the cross term must be counted once.
    let mut ne = GenericNormalEquations::new();
    let mut first = DesignMatrix::new();
    first.add_derivative("b", array![[1.0], [1.0]]).unwrap();
    first.add_residual(array![0.0, 0.0], array![1.0, 1.0]).unwrap();
    ne.add_design_matrix(&first).unwrap();

    let mut second = DesignMatrix::new();
    second.add_derivative("a", array![[1.0], [2.0]]).unwrap();
    second.add_derivative("b", array![[3.0], [1.0]]).unwrap();
    second.add_residual(array![1.0, 1.0], array![1.0, 1.0]).unwrap();
    ne.add_design_matrix(&second).unwrap();

    assert_relative_eq!(ne.normal_matrix("a", "b").unwrap()[[0, 0]], 5.0, epsilon = 1e-12);
    assert_relative_eq!(ne.normal_matrix("b", "a").unwrap()[[0, 0]], 5.0, epsilon = 1e-12);
    assert_relative_eq!(ne.normal_matrix("b", "b").unwrap()[[0, 0]], 12.0, epsilon = 1e-12);
    assert_relative_eq!(ne.data_vector("b").unwrap()[0], 4.0, epsilon = 1e-12);
}

#[test]
fn test_contributions_match_design_matrix_path() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let dm = random_design(&mut rng, &[("p", 2), ("q", 1), ("r", 3)], 5, 8);

    let mut from_rows = GenericNormalEquations::new();
    let mut rows = build_contributions(&dm).unwrap();
    rows.reverse();
    from_rows.add_contributions(&rows).unwrap();

    let direct = GenericNormalEquations::from_design_matrix(&dm).unwrap();
    assert_normal_equations_eq(&from_rows, &direct, 1e-12);
}

#[test]
fn test_concatenated_contribution_batches() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let params = [("p", 2), ("q", 1), ("r", 3)];
    let first = random_design(&mut rng, &params, 3, 6);
    let second = random_design(&mut rng, &params, 3, 6);

    let mut expected = GenericNormalEquations::new();
    expected.add_design_matrix(&first).unwrap();
    expected.add_design_matrix(&second).unwrap();

    let a = build_contributions(&first).unwrap();
    let b = build_contributions(&second).unwrap();
    let concatenated: Vec<_> = a.iter().chain(&b).cloned().collect();
    let interleaved: Vec<_> = a
        .iter()
        .zip(&b)
        .flat_map(|(x, y)| [x.clone(), y.clone()])
        .collect();

    for rows in [concatenated, interleaved] {
        let mut ne = GenericNormalEquations::new();
        ne.add_contributions(&rows).unwrap();
        assert_normal_equations_eq(&ne, &expected, 1e-12);
        assert!(ne.validate().is_ok());
    }
}

#[test]
fn test_rejected_batch_leaves_normal_equations_untouched() {
    let mut ne = GenericNormalEquations::from_design_matrix(&two_value_design()).unwrap();
    let before = ne.clone();

    let mut wider = DesignMatrix::new();
    wider
        .add_derivative("Value1", Array2::ones((4, 2)))
        .unwrap();
    wider
        .add_derivative("Value2", Array2::ones((4, 1)))
        .unwrap();
    wider.add_residual(Array1::zeros(4), Array1::ones(4)).unwrap();

    let err = ne.add_design_matrix(&wider).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    assert_eq!(ne, before);
}

#[test]
fn test_unknown_parameter_lookup() {
    let ne = GenericNormalEquations::from_design_matrix(&two_value_design()).unwrap();

    assert!(matches!(
        ne.normal_matrix("Value0", "Value9"),
        Err(NormalEqError::ParameterNotFound(_))
    ));
    assert!(matches!(
        ne.data_vector("Value9"),
        Err(NormalEqError::ParameterNotFound(_))
    ));
}

#[test]
fn test_reset_clears_everything() {
    let mut ne = GenericNormalEquations::from_design_matrix(&two_value_design()).unwrap();
    let solver_view: &mut dyn NormalEquations = &mut ne;
    solver_view.reset();

    assert!(solver_view.unknowns().is_empty());
    assert_eq!(
        solver_view.normal_matrix("Value0", "Value0").unwrap_err().kind(),
        ErrorKind::Lookup
    );
    assert_eq!(
        solver_view.data_vector("Value1").unwrap_err().kind(),
        ErrorKind::Lookup
    );
}

#[test]
fn test_add_parameter_copies_input() {
    let mut blocks = BTreeMap::new();
    blocks.insert("x".to_string(), array![[1.0]]);
    let mut dv = array![2.0];

    let mut ne = GenericNormalEquations::new();
    ne.add_parameter("x", &blocks, &dv).unwrap();
    blocks.get_mut("x").unwrap()[[0, 0]] = 100.0;
    dv[0] = 100.0;

    assert_eq!(ne.normal_matrix("x", "x").unwrap(), &array![[1.0]]);
    assert_eq!(ne.data_vector("x").unwrap(), &array![2.0]);
}

#[test]
fn test_assembled_system_is_symmetric() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let ne = GenericNormalEquations::from_design_matrix(&random_design(
        &mut rng,
        &[("a", 2), ("b", 1), ("c", 2)],
        3,
        10,
    ))
    .unwrap();

    let dense = ne.assemble();
    assert_eq!(dense.matrix.shape(), &[5, 5]);
    assert_eq!(dense.vector.len(), 5);
    assert!(matrix_approx_eq(&dense.matrix, &dense.matrix.t().to_owned(), 1e-10));
    assert_eq!(dense.vector.slice(ndarray::s![2..3]), ne.data_vector("b").unwrap().view());
}
