#![allow(dead_code)]

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use odpost::observations::collection::ObservationCollection;
use odpost::observations::{LinkEndId, LinkEndType, LinkEnds, ObservableType, ObservationBlock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn ground_link(station: &str) -> LinkEnds {
    LinkEnds::new()
        .with(LinkEndType::Transmitter, LinkEndId::new("Earth", station))
        .with(LinkEndType::Receiver, LinkEndId::body("Vehicle"))
}

/// Single one-way range record with zero-valued observations at `times`.
pub fn scalar_collection(times: &[f64]) -> ObservationCollection {
    let mut collection = ObservationCollection::new();
    collection
        .insert(
            ObservableType::OneWayRange,
            ground_link("DSS-14"),
            ObservationBlock::new(
                DVector::zeros(times.len()),
                times.to_vec(),
                LinkEndType::Receiver,
            )
            .unwrap(),
        )
        .unwrap();
    collection
}

/// Mixed scalar and vector observables over several links, with interleaved and tied
/// time tags. Observation values encode `1000 * insertion index + component`.
pub fn mixed_collection() -> ObservationCollection {
    let specs: [(ObservableType, &str, &[f64]); 4] = [
        (ObservableType::TwoWayDoppler, "DSS-63", &[10.0, 30.0, 50.0]),
        (ObservableType::OneWayRange, "DSS-14", &[0.0, 20.0, 40.0, 60.0]),
        (ObservableType::Position, "DSS-43", &[20.0, 45.0]),
        (ObservableType::OneWayRange, "DSS-63", &[5.0, 20.0]),
    ];

    let mut collection = ObservationCollection::new();
    for (record, (observable, station, times)) in specs.into_iter().enumerate() {
        let n = times.len() * observable.size();
        let values = DVector::from_fn(n, |i, _| (1000 * record + i) as f64);
        collection
            .insert(
                observable,
                ground_link(station),
                ObservationBlock::new(values, times.to_vec(), LinkEndType::Receiver).unwrap(),
            )
            .unwrap();
    }
    collection
}

/// Random information matrix, entries uniform in [-1, 1).
pub fn random_information_matrix(rows: usize, cols: usize, seed: u64) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DMatrix::from_fn(rows, cols, |_, _| rng.random_range(-1.0..1.0))
}

pub fn random_weights(rows: usize, seed: u64) -> DVector<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DVector::from_fn(rows, |_, _| rng.random_range(0.5..2.0))
}

/// Entry-wise relative comparison, with an absolute floor scaled on the largest entry so
/// that entries close to zero after cancellation do not fail spuriously.
pub fn assert_matrix_close(actual: &DMatrix<f64>, expected: &DMatrix<f64>, max_relative: f64) {
    assert_eq!(actual.shape(), expected.shape());
    let floor = max_relative * expected.amax();
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *e, max_relative = max_relative, epsilon = floor);
    }
}
