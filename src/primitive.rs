/* ---------------------------------------------------------------------------------------------- */
/*                                             TRAITS                                             */
/* ---------------------------------------------------------------------------------------------- */

use std::cmp::Ordering;

macro_rules! trait_alias {
	($vis:vis trait $name:ident {}, $($args:tt)*) => {
		$vis trait $name: $($args)+ {}
		impl<T> $name for T where T: $($args)+ {}
	};
}
trait_alias!(
    pub trait Number {},
    Copy + PartialOrd + NumberCommon
);

pub trait NumberCommon {
    const MINVALUE: Self;
    const MAXVALUE: Self;

    fn to_f64(&self) -> f64;
    fn from_f64(value: f64) -> Self;
}

pub type AxisIndex = usize;

/// Per-axis ordering function. Plain function pointers keep the comparer
/// array `Copy` and let captureless closures coerce in place.
pub type Compare<T> = fn(&T, &T) -> Ordering;

/// Natural ordering of the scalar type. Incomparable values (e.g. NaN)
/// collapse to `Equal`.
pub fn default_compare<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

#[doc(hidden)]
mod _impl_numbers {
    use super::NumberCommon;

    macro_rules! define_minmax {
    ($($ty:ty), *) => {
        $(impl NumberCommon for $ty {
            const MINVALUE: Self = Self::MIN;
            const MAXVALUE: Self = Self::MAX;

            fn to_f64(&self) -> f64 {
                *self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as Self
            }
        })*
    };
}

    define_minmax!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

    #[cfg(feature = "fixed")]
    mod _impl_fixed {
        use super::NumberCommon;

        macro_rules! define_minmax_fixed {
            ($ty:ident <$t:ident>, $tr:ident) => {
                impl<$t: fixed::types::extra::$tr> NumberCommon for fixed::$ty<$t> {
                    const MINVALUE: Self = Self::MIN;
                    const MAXVALUE: Self = Self::MAX;

                    fn to_f64(&self) -> f64 {
                        (*self).to_num()
                    }

                    fn from_f64(value: f64) -> Self {
                        Self::from_num(value)
                    }
                }
            };
        }
        define_minmax_fixed!(FixedI8<T>, LeEqU8);
        define_minmax_fixed!(FixedU8<T>, LeEqU8);
        define_minmax_fixed!(FixedI16<T>, LeEqU16);
        define_minmax_fixed!(FixedU16<T>, LeEqU16);
        define_minmax_fixed!(FixedI32<T>, LeEqU32);
        define_minmax_fixed!(FixedU32<T>, LeEqU32);
        define_minmax_fixed!(FixedI64<T>, LeEqU64);
        define_minmax_fixed!(FixedU64<T>, LeEqU64);
        define_minmax_fixed!(FixedI128<T>, LeEqU128);
        define_minmax_fixed!(FixedU128<T>, LeEqU128);
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                              BOUND                                             */
/* ---------------------------------------------------------------------------------------------- */

/// One side of a possibly open range on a single axis.
///
/// `None` means the side is unbounded: it behaves as `-∞` when it sits on the
/// min side of a range and as `+∞` on the max side, so a comparison against an
/// absent bound always succeeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Bound<T> {
    #[default]
    None,
    Value(T),
}

impl<T> Bound<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::None => None,
            Self::Value(v) => Some(v),
        }
    }

    pub fn is_some(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl<T> From<Option<T>> for Bound<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::None,
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                             BOUNDS                                             */
/* ---------------------------------------------------------------------------------------------- */

/// An axis-aligned box over `D` axes where either side of any axis may be
/// open. `Bounds::none()` is the identity region that matches everything.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds<T, const D: usize> {
    min: [Bound<T>; D],
    max: [Bound<T>; D],
}

impl<T: Copy, const D: usize> Bounds<T, D> {
    /// Creates a new `Bounds` from per-axis side values.
    ///
    /// Where both sides of an axis are present, `min <= max` is a caller
    /// contract; it is not validated here, and an inverted pair simply
    /// behaves as an empty range under the geometry predicates.
    pub fn new(min: [Bound<T>; D], max: [Bound<T>; D]) -> Self {
        Self { min, max }
    }

    /// The fully open region: every side of every axis is unbounded.
    pub fn none() -> Self {
        Self {
            min: [Bound::None; D],
            max: [Bound::None; D],
        }
    }

    /// A closed box from plain min/max coordinates.
    pub fn from_min_max(min: [T; D], max: [T; D]) -> Self {
        Self {
            min: min.map(Bound::Value),
            max: max.map(Bound::Value),
        }
    }

    /// The degenerate box covering exactly one point.
    pub fn at_point(point: [T; D]) -> Self {
        Self::from_min_max(point, point)
    }

    pub fn min(&self) -> &[Bound<T>; D] {
        &self.min
    }

    pub fn max(&self) -> &[Bound<T>; D] {
        &self.max
    }

    /// Derives the sub-region for the child addressed by the bit-packed
    /// `index`: bit `axis` set means the half at or above `division[axis]`.
    pub fn child(&self, division: &[T; D], index: usize) -> Self {
        let mut min = self.min;
        let mut max = self.max;

        for axis in 0..D {
            if index >> axis & 1 == 1 {
                min[axis] = Bound::Value(division[axis]);
            } else {
                max[axis] = Bound::Value(division[axis]);
            }
        }

        Self { min, max }
    }

    /// Is `point` inside this region? Open sides never disqualify; closed
    /// sides are inclusive.
    pub fn contains(&self, point: &[T; D], compare: &[Compare<T>; D]) -> bool {
        for axis in 0..D {
            if let Bound::Value(min) = &self.min[axis] {
                if compare[axis](&point[axis], min) == Ordering::Less {
                    return false;
                }
            }
            if let Bound::Value(max) = &self.max[axis] {
                if compare[axis](&point[axis], max) == Ordering::Greater {
                    return false;
                }
            }
        }
        true
    }

    /// Side-for-side equality under the per-axis comparers. Unlike the
    /// derived `PartialEq`, this respects caller-overridden orderings.
    pub fn same_as(&self, other: &Self, compare: &[Compare<T>; D]) -> bool {
        for axis in 0..D {
            let sides = [
                (&self.min[axis], &other.min[axis]),
                (&self.max[axis], &other.max[axis]),
            ];

            for (a, b) in sides {
                match (a, b) {
                    (Bound::None, Bound::None) => {}
                    (Bound::Value(a), Bound::Value(b))
                        if compare[axis](a, b) == Ordering::Equal => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                       GEOMETRY PREDICATES                                      */
/* ---------------------------------------------------------------------------------------------- */

/// Do boxes `a` and `b` overlap? The standard axis-aligned bounding box test
/// generalized to `D` axes and possibly-open sides: an axis only disqualifies
/// the overlap when both of the compared sides are actually bounded.
pub fn inclusion_check<T, const D: usize>(
    a: &Bounds<T, D>,
    b: &Bounds<T, D>,
    compare: &[Compare<T>; D],
) -> bool
where
    T: Copy,
{
    for axis in 0..D {
        if let (Bound::Value(a_max), Bound::Value(b_min)) = (&a.max[axis], &b.min[axis]) {
            if compare[axis](a_max, b_min) == Ordering::Less {
                return false;
            }
        }
        if let (Bound::Value(a_min), Bound::Value(b_max)) = (&a.min[axis], &b.max[axis]) {
            if compare[axis](a_min, b_max) == Ordering::Greater {
                return false;
            }
        }
    }
    true
}

/// Does `b` fully contain `a`?
///
/// Any openness mismatch fails the check: a bounded side of `a` cannot be
/// certified inside an open side of `b`, and an open side of `a` reaches past
/// any bounded side of `b`. Where both sides are bounded, `b` must reach at
/// least as far as `a` in that direction.
pub fn encapsulation_check<T, const D: usize>(
    a: &Bounds<T, D>,
    b: &Bounds<T, D>,
    compare: &[Compare<T>; D],
) -> bool
where
    T: Copy,
{
    for axis in 0..D {
        match (&a.min[axis], &b.min[axis]) {
            (Bound::None, Bound::None) => {}
            (Bound::Value(a_min), Bound::Value(b_min)) => {
                if compare[axis](b_min, a_min) == Ordering::Greater {
                    return false;
                }
            }
            _ => return false,
        }

        match (&a.max[axis], &b.max[axis]) {
            (Bound::None, Bound::None) => {}
            (Bound::Value(a_max), Bound::Value(b_max)) => {
                if compare[axis](b_max, a_max) == Ordering::Less {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

/// Are two points equal on every axis under the per-axis comparers?
pub fn equals_check<T, const D: usize>(
    a: &[T; D],
    b: &[T; D],
    compare: &[Compare<T>; D],
) -> bool {
    (0..D).all(|axis| compare[axis](&a[axis], &b[axis]) == Ordering::Equal)
}

/// Does box `a` straddle any of the axis-aligned hyperplanes through the
/// point `b`?
///
/// An axis straddles when the box's range on that axis (open sides counting
/// as infinite) contains `b`'s coordinate. A box for which this returns
/// `false` lies strictly on one side of the division point on every axis and
/// can therefore be routed into exactly one child; otherwise it must stay at
/// the branch level.
pub fn straddles_lines<T, const D: usize>(
    a: &Bounds<T, D>,
    b: &[T; D],
    compare: &[Compare<T>; D],
) -> bool
where
    T: Copy,
{
    for axis in 0..D {
        let over_min = match &a.min[axis] {
            Bound::None => true,
            Bound::Value(min) => compare[axis](min, &b[axis]) != Ordering::Greater,
        };
        let under_max = match &a.max[axis] {
            Bound::None => true,
            Bound::Value(max) => compare[axis](max, &b[axis]) != Ordering::Less,
        };

        if over_min && under_max {
            return true;
        }
    }
    false
}

/* ---------------------------------------------------------------------------------------------- */
/*                                              TESTS                                             */
/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod __test;
