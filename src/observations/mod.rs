//! # Observation data model
//!
//! Types describing the raw measurement data handed over by the estimator once an
//! orbit determination run is finished:
//!
//! - [`ObservableType`] – the kind of measurement, with its fixed scalar dimension,
//! - [`LinkEnds`] – the stations/spacecraft taking part in one link, keyed by [`LinkEndType`],
//! - [`ObservationBlock`] – the observation vector and per-sample time tags of one link,
//! - [`ObservationRecord`] – one `(observable, link ends, block)` triple.
//!
//! Records are gathered in an [`ObservationCollection`](crate::observations::collection::ObservationCollection),
//! which defines the canonical *type-and-link* ordering used to build the concatenated
//! time and observation vectors.
//!
//! ## Units & Conventions
//!
//! - **Time**: TDB seconds past J2000, the unit of the information matrix rows.
//! - **Layout**: for an observable of dimension `N`, the observation vector holds the `N`
//!   components of sample 0, then the `N` components of sample 1, and so on.

use std::collections::BTreeMap;
use std::fmt;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::constants::{Time, Vector};
use crate::odpost_errors::OdPostError;

pub mod collection;

/// Category of measurement.
///
/// The declaration order is the natural ordering of observable types, and therefore the
/// outer key of the canonical type-and-link ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObservableType {
    OneWayRange,
    AngularPosition,
    Position,
    OneWayDoppler,
    OneWayDifferencedRange,
    NWayRange,
    TwoWayDoppler,
    EulerAngle313,
    Velocity,
}

impl ObservableType {
    /// Number of scalar components of a single sample of this observable.
    pub fn size(&self) -> usize {
        match self {
            ObservableType::OneWayRange
            | ObservableType::OneWayDoppler
            | ObservableType::OneWayDifferencedRange
            | ObservableType::NWayRange
            | ObservableType::TwoWayDoppler => 1,
            ObservableType::AngularPosition => 2,
            ObservableType::Position
            | ObservableType::EulerAngle313
            | ObservableType::Velocity => 3,
        }
    }
}

impl fmt::Display for ObservableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObservableType::OneWayRange => "one-way range",
            ObservableType::AngularPosition => "angular position",
            ObservableType::Position => "position",
            ObservableType::OneWayDoppler => "one-way Doppler",
            ObservableType::OneWayDifferencedRange => "one-way differenced range",
            ObservableType::NWayRange => "n-way range",
            ObservableType::TwoWayDoppler => "two-way Doppler",
            ObservableType::EulerAngle313 => "Euler angles (3-1-3)",
            ObservableType::Velocity => "velocity",
        };
        f.write_str(name)
    }
}

/// Role of a participant in an observation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkEndType {
    Transmitter,
    Reflector1,
    Reflector2,
    Reflector3,
    Reflector4,
    Receiver,
    ObservedBody,
}

/// Identifier of a link participant: a body, optionally refined by a station on it.
///
/// An empty `station` denotes the body's center of mass.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkEndId {
    pub body: String,
    pub station: String,
}

impl LinkEndId {
    pub fn new(body: impl Into<String>, station: impl Into<String>) -> Self {
        LinkEndId {
            body: body.into(),
            station: station.into(),
        }
    }

    /// Link end located at the center of mass of `body`.
    pub fn body(body: impl Into<String>) -> Self {
        Self::new(body, "")
    }
}

impl fmt::Display for LinkEndId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.station.is_empty() {
            write!(f, "{}", self.body)
        } else {
            write!(f, "{}/{}", self.body, self.station)
        }
    }
}

/// Set of participants of one observation link.
///
/// Link ends are ordered lexicographically over their `(LinkEndType, LinkEndId)` entries,
/// taken in ascending [`LinkEndType`] order. This is the inner key of the canonical
/// type-and-link ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkEnds(BTreeMap<LinkEndType, LinkEndId>);

impl LinkEnds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a participant.
    pub fn with(mut self, role: LinkEndType, id: LinkEndId) -> Self {
        self.0.insert(role, id);
        self
    }

    pub fn insert(&mut self, role: LinkEndType, id: LinkEndId) -> Option<LinkEndId> {
        self.0.insert(role, id)
    }

    pub fn get(&self, role: LinkEndType) -> Option<&LinkEndId> {
        self.0.get(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkEndType, &LinkEndId)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(LinkEndType, LinkEndId)> for LinkEnds {
    fn from_iter<I: IntoIterator<Item = (LinkEndType, LinkEndId)>>(iter: I) -> Self {
        LinkEnds(iter.into_iter().collect())
    }
}

impl fmt::Display for LinkEnds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (role, id)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{role:?}: {id}")?;
        }
        write!(f, "]")
    }
}

/// Observations of a single observable over a single link.
///
/// `observations` holds `size × times.len()` scalars, sample-major (see module docs).
/// The dimension check against the observable happens when the block is inserted in an
/// [`ObservationCollection`](crate::observations::collection::ObservationCollection),
/// since the block itself does not know its observable type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationBlock {
    observations: Vector,
    times: Vec<Time>,
    reference_link_end: LinkEndType,
}

impl ObservationBlock {
    /// Create a new block of observations.
    ///
    /// Arguments
    /// -----------------
    /// * `observations` – scalar observation values, sample-major.
    /// * `times` – one time tag per sample, in TDB seconds past J2000.
    /// * `reference_link_end` – link end to which the time tags refer.
    ///
    /// Return
    /// ----------
    /// * `Err(OdPostError::NonFiniteTime)` if any time tag is NaN or infinite.
    pub fn new(
        observations: Vector,
        times: Vec<Time>,
        reference_link_end: LinkEndType,
    ) -> Result<Self, OdPostError> {
        if let Some(index) = times.iter().position(|t| !t.is_finite()) {
            return Err(OdPostError::NonFiniteTime { index });
        }
        Ok(ObservationBlock {
            observations,
            times,
            reference_link_end,
        })
    }

    /// Same as [`ObservationBlock::new`], with time tags given as [`hifitime::Epoch`]s.
    pub fn from_epochs(
        observations: Vector,
        epochs: &[Epoch],
        reference_link_end: LinkEndType,
    ) -> Result<Self, OdPostError> {
        let times = epochs.iter().map(|e| e.to_tdb_seconds()).collect();
        Self::new(observations, times, reference_link_end)
    }

    pub fn observations(&self) -> &Vector {
        &self.observations
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn reference_link_end(&self) -> LinkEndType {
        self.reference_link_end
    }

    /// Number of samples (time tags) in the block.
    pub fn sample_count(&self) -> usize {
        self.times.len()
    }
}

/// One entry of the canonical type-and-link list.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub observable: ObservableType,
    pub link_ends: LinkEnds,
    pub block: ObservationBlock,
}

impl ObservationRecord {
    /// Number of scalar observations contributed by this record.
    pub fn scalar_count(&self) -> usize {
        self.block.sample_count() * self.observable.size()
    }
}
