//! A typed attribute table with change notification.
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// The attributes a feature may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeKind {
    Mz,
    Rt,
    Height,
    Area,
    MzRange,
    RtRange,
    IntensityRange,
    Mobility,
    MobilityRange,
    Fwhm,
    TailingFactor,
    AsymmetryFactor,
    Charge,
}

const NUM_KINDS: usize = 13;

impl AttributeKind {
    pub const ALL: [AttributeKind; NUM_KINDS] = [
        Self::Mz,
        Self::Rt,
        Self::Height,
        Self::Area,
        Self::MzRange,
        Self::RtRange,
        Self::IntensityRange,
        Self::Mobility,
        Self::MobilityRange,
        Self::Fwhm,
        Self::TailingFactor,
        Self::AsymmetryFactor,
        Self::Charge,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mz => "m/z",
            Self::Rt => "RT",
            Self::Height => "Height",
            Self::Area => "Area",
            Self::MzRange => "m/z range",
            Self::RtRange => "RT range",
            Self::IntensityRange => "Intensity range",
            Self::Mobility => "Mobility",
            Self::MobilityRange => "Mobility range",
            Self::Fwhm => "FWHM",
            Self::TailingFactor => "Tailing factor",
            Self::AsymmetryFactor => "Asymmetry factor",
            Self::Charge => "Charge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Float(f32),
    Double(f64),
    Int(i32),
    FloatRange(Interval<f32>),
    DoubleRange(Interval<f64>),
}

impl AttributeValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Float(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float_range(&self) -> Option<Interval<f32>> {
        match self {
            Self::FloatRange(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double_range(&self) -> Option<Interval<f64>> {
        match self {
            Self::DoubleRange(v) => Some(*v),
            Self::FloatRange(v) => Some((*v).into()),
            _ => None,
        }
    }
}

/// A notification delivered to observers after an attribute changes.
/// `new` is `None` when the attribute was removed.
#[derive(Debug, Clone, Copy)]
pub struct AttributeChange<'a> {
    pub kind: AttributeKind,
    pub old: Option<&'a AttributeValue>,
    pub new: Option<&'a AttributeValue>,
}

pub type AttributeObserver = Arc<dyn Fn(&AttributeChange<'_>) + Send + Sync>;

/// Values keyed by [`AttributeKind`] with per-kind observers.
///
/// Observers belong to the table they were registered on and are not carried
/// over by [`Clone`].
#[derive(Default)]
pub struct AttributeTable {
    values: [Option<AttributeValue>; NUM_KINDS],
    observers: [Vec<AttributeObserver>; NUM_KINDS],
}

impl Clone for AttributeTable {
    fn clone(&self) -> Self {
        Self {
            values: self.values,
            observers: Default::default(),
        }
    }
}

impl Debug for AttributeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for AttributeTable {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: AttributeKind) -> Option<&AttributeValue> {
        self.values[kind.slot()].as_ref()
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.values[kind.slot()].is_some()
    }

    /// Store `value` under `kind`, notifying observers only when the stored
    /// value actually changed. Returns whether a change happened.
    pub fn set(&mut self, kind: AttributeKind, value: AttributeValue) -> bool {
        let slot = kind.slot();
        if self.values[slot].as_ref() == Some(&value) {
            return false;
        }
        let old = self.values[slot].replace(value);
        self.notify(kind, old.as_ref());
        true
    }

    pub fn remove(&mut self, kind: AttributeKind) -> Option<AttributeValue> {
        let old = self.values[kind.slot()].take();
        if old.is_some() {
            self.notify(kind, old.as_ref());
        }
        old
    }

    pub fn observe(&mut self, kind: AttributeKind, observer: AttributeObserver) {
        self.observers[kind.slot()].push(observer);
    }

    pub fn clear_observers(&mut self) {
        self.observers.iter_mut().for_each(|o| o.clear());
    }

    fn notify(&self, kind: AttributeKind, old: Option<&AttributeValue>) {
        let observers = &self.observers[kind.slot()];
        if observers.is_empty() {
            return;
        }
        let change = AttributeChange {
            kind,
            old,
            new: self.values[kind.slot()].as_ref(),
        };
        for observer in observers {
            observer(&change);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeKind, &AttributeValue)> + '_ {
        AttributeKind::ALL
            .iter()
            .zip(self.values.iter())
            .filter_map(|(k, v)| v.as_ref().map(|v| (*k, v)))
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_set_notifies_on_change_only() {
        let mut table = AttributeTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        table.observe(
            AttributeKind::Height,
            Arc::new(move |change: &AttributeChange<'_>| {
                assert_eq!(change.kind, AttributeKind::Height);
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(table.set(AttributeKind::Height, AttributeValue::Float(5.0)));
        assert!(!table.set(AttributeKind::Height, AttributeValue::Float(5.0)));
        assert!(table.set(AttributeKind::Height, AttributeValue::Float(6.0)));
        table.set(AttributeKind::Area, AttributeValue::Float(1.0));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        assert_eq!(
            table.remove(AttributeKind::Height),
            Some(AttributeValue::Float(6.0))
        );
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(table.remove(AttributeKind::Height).is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_removal_reports_none() {
        let mut table = AttributeTable::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        table.set(AttributeKind::Mz, AttributeValue::Double(100.0));
        table.observe(
            AttributeKind::Mz,
            Arc::new(move |change: &AttributeChange<'_>| {
                assert!(change.new.is_none());
                assert_eq!(change.old, Some(&AttributeValue::Double(100.0)));
                s.fetch_add(1, Ordering::SeqCst);
            }),
        );
        table.remove(AttributeKind::Mz);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clone_drops_observers() {
        let mut table = AttributeTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        table.observe(
            AttributeKind::Rt,
            Arc::new(move |_: &AttributeChange<'_>| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        table.set(AttributeKind::Rt, AttributeValue::Float(1.0));
        let mut dup = table.clone();
        assert_eq!(dup, table);
        dup.set(AttributeKind::Rt, AttributeValue::Float(2.0));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(dup.iter().count(), 1);
    }
}
