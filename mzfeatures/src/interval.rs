use std::fmt::Display;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

/** An inclusive interval over a single dimension
*/
pub trait Span1D {
    type DimType: PartialOrd;

    fn start(&self) -> &Self::DimType;
    fn end(&self) -> &Self::DimType;

    fn contains(&self, i: &Self::DimType) -> bool {
        self.start() <= i && i <= self.end()
    }

    /// Whether the two intervals share at least one point. Equivalent to
    /// Guava-style connectedness for closed intervals.
    fn overlaps<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() <= interval.end() && interval.start() <= self.end()
    }

    fn is_contained_in_interval<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() >= interval.start() && self.end() <= interval.end()
    }

    fn contains_interval<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() <= interval.start() && self.end() >= interval.end()
    }
}

impl<T> Span1D for &T
where
    T: Span1D,
{
    type DimType = T::DimType;

    fn start(&self) -> &Self::DimType {
        (*self).start()
    }

    fn end(&self) -> &Self::DimType {
        (*self).end()
    }
}

#[inline]
fn is_unordered<V: PartialOrd>(value: &V) -> bool {
    value.partial_cmp(value).is_none()
}

/// A closed interval `[start, end]`.
///
/// No ordering is enforced on construction. An interval built from an empty
/// series carries its sentinel bounds verbatim so callers can tell it apart.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval<V: PartialOrd> {
    pub start: V,
    pub end: V,
}

impl<V: PartialOrd + Copy> Interval<V> {
    pub fn new(start: V, end: V) -> Interval<V> {
        Interval { start, end }
    }

    pub fn singleton(value: V) -> Interval<V> {
        Interval {
            start: value,
            end: value,
        }
    }

    pub fn lower(&self) -> V {
        self.start
    }

    pub fn upper(&self) -> V {
        self.end
    }

    /// The smallest interval enclosing both `self` and `other`.
    ///
    /// Comparisons against NaN are false, so a NaN bound survives only when
    /// both operands carry it.
    pub fn span(&self, other: &Self) -> Self {
        let start = if other.start < self.start || is_unordered(&self.start) {
            other.start
        } else {
            self.start
        };
        let end = if other.end > self.end || is_unordered(&self.end) {
            other.end
        } else {
            self.end
        };
        Interval { start, end }
    }

    /// Extend the interval to cover `value`
    pub fn include(&mut self, value: V) {
        if value < self.start {
            self.start = value;
        }
        if value > self.end {
            self.end = value;
        }
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let start = if self.start > other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end < other.end {
            self.end
        } else {
            other.end
        };
        Some(Interval { start, end })
    }
}

impl<V: PartialOrd + Copy + Sub<Output = V>> Interval<V> {
    pub fn width(&self) -> V {
        self.end - self.start
    }
}

impl<V: PartialOrd> Span1D for Interval<V> {
    type DimType = V;

    fn start(&self) -> &Self::DimType {
        &self.start
    }

    fn end(&self) -> &Self::DimType {
        &self.end
    }
}

impl<V: PartialOrd + Display> Display for Interval<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl From<Interval<f32>> for Interval<f64> {
    fn from(value: Interval<f32>) -> Self {
        Interval::new(value.start as f64, value.end as f64)
    }
}
