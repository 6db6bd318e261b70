//! # odpost
//!
//! Post-processing of a batch orbit-determination solution: time-resolved covariance
//! estimates built from the normal equations of an already converged estimation.
//!
//! The pipeline:
//!
//! 1. [`observations::collection::ObservationCollection`] holds the raw observations in
//!    canonical type-and-link order and flattens them into concatenated time and
//!    observation vectors.
//! 2. [`time_ordering`] stably sorts the concatenated times and permutes the information
//!    matrix and weights into chronological order.
//! 3. [`lookup`] maps output query times to the last observation at or before them.
//! 4. [`covariance::normal_equations`] accumulates and inverts the normal equations of a
//!    growing observation prefix.
//! 5. [`covariance::history`] drives the output loop and assembles the
//!    [`CovarianceHistory`](covariance::history::CovarianceHistory).
//!
//! ```rust
//! use nalgebra::{dmatrix, DVector};
//! use odpost::covariance::history::covariance_matrix_as_function_of_time;
//! use odpost::covariance::CovarianceHistoryParams;
//! use odpost::observations::collection::ObservationCollection;
//! use odpost::observations::{LinkEndId, LinkEndType, LinkEnds, ObservableType, ObservationBlock};
//!
//! let mut measurements = ObservationCollection::new();
//! measurements.insert(
//!     ObservableType::OneWayRange,
//!     LinkEnds::new().with(LinkEndType::Receiver, LinkEndId::new("Earth", "DSS-14")),
//!     ObservationBlock::new(
//!         DVector::zeros(4),
//!         vec![0.0, 1.0, 1.0, 3.0],
//!         LinkEndType::Receiver,
//!     )?,
//! )?;
//!
//! let information_matrix = dmatrix![1.0, 0.0; 0.0, 1.0; 1.0, 1.0; 1.0, -1.0];
//! let history = covariance_matrix_as_function_of_time(
//!     &measurements,
//!     &information_matrix,
//!     &DVector::from_element(2, 1.0),
//!     &DVector::from_element(4, 1.0),
//!     &dmatrix![1.0, 0.0; 0.0, 1.0],
//!     &CovarianceHistoryParams::builder().output_time_step(2.0).build()?,
//! )?;
//! assert_eq!(history.epochs(), vec![1.0, 3.0]);
//! # Ok::<(), odpost::odpost_errors::OdPostError>(())
//! ```

pub mod constants;
pub mod covariance;
pub mod estimation;
pub mod lookup;
pub mod observations;
pub mod odpost_errors;
pub mod time_ordering;
