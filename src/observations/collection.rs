//! # Observation collection and collation
//!
//! [`ObservationCollection`] is the explicit, ordered list of
//! `(observable type, link ends, observation block)` records produced by an estimation run.
//!
//! ## Canonical type-and-link ordering
//!
//! Records are always kept sorted by:
//!
//! 1. [`ObservableType`], in declaration order,
//! 2. [`LinkEnds`], lexicographically over their `(LinkEndType, LinkEndId)` entries.
//!
//! The order in which records are inserted does not matter. The rows of the information
//! matrix and the weight diagonal delivered by the estimator are expected in this same
//! order, one row per scalar observation.
//!
//! ## Collation
//!
//! [`ObservationCollection::collate`] flattens the records into a single time vector and a
//! single observation vector of equal length. Samples of an observable of dimension `N`
//! contribute `N` consecutive entries, all sharing the sample time tag.

use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::constants::{Time, Vector};
use crate::observations::{LinkEnds, ObservableType, ObservationBlock, ObservationRecord};
use crate::odpost_errors::OdPostError;

/// Time and observation vectors flattened in type-and-link order.
#[derive(Debug, Clone, PartialEq)]
pub struct CollatedObservations {
    /// One time tag per scalar observation.
    pub times: Vec<Time>,
    /// Scalar observation values, aligned with `times`.
    pub observations: Vector,
}

/// Ordered set of observation records, see the module documentation for the ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationCollection {
    records: Vec<ObservationRecord>,
}

impl ObservationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from records given in any order.
    pub fn from_records<I>(records: I) -> Result<Self, OdPostError>
    where
        I: IntoIterator<Item = ObservationRecord>,
    {
        let mut collection = Self::new();
        for record in records {
            collection.insert(record.observable, record.link_ends, record.block)?;
        }
        Ok(collection)
    }

    /// Build a collection from the nested `observable → link ends → block` map.
    pub fn from_nested(
        nested: BTreeMap<ObservableType, BTreeMap<LinkEnds, ObservationBlock>>,
    ) -> Result<Self, OdPostError> {
        Self::from_records(nested.into_iter().flat_map(|(observable, per_link)| {
            per_link
                .into_iter()
                .map(move |(link_ends, block)| ObservationRecord {
                    observable,
                    link_ends,
                    block,
                })
        }))
    }

    /// Insert a block at its canonical position.
    ///
    /// Return
    /// ----------
    /// * `Err(OdPostError::ShapeMismatch)` if the block length is not
    ///   `observable.size() × sample count`.
    /// * `Err(OdPostError::DuplicateObservationRecord)` if a block is already stored for the
    ///   same observable and link ends.
    pub fn insert(
        &mut self,
        observable: ObservableType,
        link_ends: LinkEnds,
        block: ObservationBlock,
    ) -> Result<(), OdPostError> {
        let expected = block.sample_count() * observable.size();
        let found = block.observations().len();
        if expected != found {
            return Err(OdPostError::ShapeMismatch {
                context: "observation block length",
                expected,
                found,
            });
        }

        let position = self
            .records
            .binary_search_by(|r| (r.observable, &r.link_ends).cmp(&(observable, &link_ends)));
        match position {
            Ok(_) => Err(OdPostError::DuplicateObservationRecord(format!(
                "{observable} over {link_ends}"
            ))),
            Err(index) => {
                self.records.insert(
                    index,
                    ObservationRecord {
                        observable,
                        link_ends,
                        block,
                    },
                );
                Ok(())
            }
        }
    }

    /// Records in canonical type-and-link order.
    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObservationRecord> {
        self.records.iter()
    }

    /// Number of records (observable / link-ends pairs).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of scalar observations, i.e. the expected number of rows of the
    /// information matrix.
    pub fn total_observation_count(&self) -> usize {
        self.records.iter().map(ObservationRecord::scalar_count).sum()
    }

    /// Number of scalar observations per observable type, summed over all link ends.
    pub fn observations_per_observable(&self) -> BTreeMap<ObservableType, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.observable).or_insert(0) += record.scalar_count();
        }
        counts
    }

    /// Time tags of all scalar observations, in type-and-link order.
    ///
    /// Samples of an observable of dimension `N > 1` have their time tag repeated `N`
    /// times contiguously.
    pub fn concatenated_times(&self) -> Vec<Time> {
        self.records
            .iter()
            .flat_map(|record| {
                let size = record.observable.size();
                record
                    .block
                    .times()
                    .iter()
                    .flat_map(move |&t| std::iter::repeat(t).take(size))
            })
            .collect()
    }

    /// All scalar observations, in type-and-link order.
    pub fn concatenated_observations(&self) -> Vector {
        DVector::from_iterator(
            self.total_observation_count(),
            self.records
                .iter()
                .flat_map(|record| record.block.observations().iter().copied()),
        )
    }

    /// Flatten the collection into aligned time and observation vectors.
    pub fn collate(&self) -> CollatedObservations {
        CollatedObservations {
            times: self.concatenated_times(),
            observations: self.concatenated_observations(),
        }
    }
}

impl<'a> IntoIterator for &'a ObservationCollection {
    type Item = &'a ObservationRecord;
    type IntoIter = std::slice::Iter<'a, ObservationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod collection_test {
    use super::*;
    use crate::observations::{LinkEndId, LinkEndType};

    fn link(station: &str) -> LinkEnds {
        LinkEnds::new()
            .with(LinkEndType::Transmitter, LinkEndId::new("Earth", station))
            .with(LinkEndType::Receiver, LinkEndId::body("Vehicle"))
    }

    fn block(values: &[f64], times: &[f64]) -> ObservationBlock {
        ObservationBlock::new(
            DVector::from_column_slice(values),
            times.to_vec(),
            LinkEndType::Receiver,
        )
        .unwrap()
    }

    #[test]
    fn test_scalar_observables_keep_times_verbatim() {
        let mut collection = ObservationCollection::new();
        collection
            .insert(
                ObservableType::OneWayRange,
                link("B"),
                block(&[10.0, 11.0], &[5.0, 6.0]),
            )
            .unwrap();
        collection
            .insert(
                ObservableType::OneWayRange,
                link("A"),
                block(&[20.0, 21.0, 22.0], &[1.0, 2.0, 3.0]),
            )
            .unwrap();
        collection
            .insert(
                ObservableType::OneWayDoppler,
                link("A"),
                block(&[30.0], &[0.5]),
            )
            .unwrap();

        let collated = collection.collate();
        assert_eq!(collated.times, vec![1.0, 2.0, 3.0, 5.0, 6.0, 0.5]);
        assert_eq!(
            collated.observations.as_slice(),
            &[20.0, 21.0, 22.0, 10.0, 11.0, 30.0]
        );
        assert_eq!(collection.total_observation_count(), 6);
    }

    #[test]
    fn test_multi_dimensional_times_are_repeated() {
        let mut collection = ObservationCollection::new();
        collection
            .insert(
                ObservableType::Position,
                link("A"),
                block(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[100.0, 200.0]),
            )
            .unwrap();

        let collated = collection.collate();
        assert_eq!(
            collated.times,
            vec![100.0, 100.0, 100.0, 200.0, 200.0, 200.0]
        );
        assert_eq!(
            collated.observations.as_slice(),
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_block_length_mismatch() {
        let mut collection = ObservationCollection::new();
        let err = collection
            .insert(
                ObservableType::AngularPosition,
                link("A"),
                block(&[1.0, 2.0, 3.0], &[0.0, 1.0]),
            )
            .unwrap_err();
        assert_eq!(
            err,
            OdPostError::ShapeMismatch {
                context: "observation block length",
                expected: 4,
                found: 3,
            }
        );
    }

    #[test]
    fn test_duplicate_record() {
        let mut collection = ObservationCollection::new();
        collection
            .insert(ObservableType::NWayRange, link("A"), block(&[1.0], &[0.0]))
            .unwrap();
        let err = collection
            .insert(ObservableType::NWayRange, link("A"), block(&[2.0], &[1.0]))
            .unwrap_err();
        assert!(matches!(err, OdPostError::DuplicateObservationRecord(_)));
    }

    #[test]
    fn test_from_nested_matches_insertion() {
        let mut per_link = BTreeMap::new();
        per_link.insert(link("B"), block(&[1.0], &[3.0]));
        per_link.insert(link("A"), block(&[2.0], &[4.0]));
        let mut nested = BTreeMap::new();
        nested.insert(ObservableType::TwoWayDoppler, per_link);
        nested.insert(
            ObservableType::AngularPosition,
            BTreeMap::from([(link("C"), block(&[7.0, 8.0], &[9.0]))]),
        );

        let collection = ObservationCollection::from_nested(nested).unwrap();
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.concatenated_times(), vec![9.0, 9.0, 4.0, 3.0]);

        let counts = collection.observations_per_observable();
        assert_eq!(counts[&ObservableType::AngularPosition], 2);
        assert_eq!(counts[&ObservableType::TwoWayDoppler], 2);
    }

    #[test]
    fn test_empty_collection() {
        let collection = ObservationCollection::new();
        let collated = collection.collate();
        assert!(collated.times.is_empty());
        assert_eq!(collated.observations.len(), 0);
    }
}
