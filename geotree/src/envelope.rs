//! N-dimensional axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

use crate::error::{SpatialError, SpatialResult};

/// An n-dimensional axis-aligned bounding box.
///
/// `Envelope` defines a rectangular region in n-dimensional space (typically
/// n = 2) using per-dimension minimum and maximum coordinates. It is the
/// currency of the spatial index: tree nodes cache one, record decoders
/// produce one, and search filters prune against one.
///
/// An envelope with no dimensions is the *invalid* (empty) state. It does not
/// intersect anything, covers nothing, and has zero area. Mutation happens
/// only through [`Envelope::expand_to_include`] and
/// [`Envelope::expand_to_include_point`].
///
/// # Examples
///
/// ```rust
/// use geotree::Envelope;
///
/// let bbox = Envelope::rect(0.0, 0.0, 100.0, 100.0).unwrap();
/// let probe = Envelope::from_point(&[50.0, 50.0]);
///
/// assert!(bbox.intersects(&probe));
/// assert!(bbox.covers(&probe));
/// ```
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize)]
pub struct Envelope {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Envelope({:?} .. {:?})", self.min, self.max)
    }
}

impl Envelope {
    /// Creates an envelope from per-dimension minimum and maximum coordinates.
    ///
    /// Fails with [`SpatialError::InvalidEnvelope`] if the slices differ in
    /// length or any `min[i] > max[i]`.
    pub fn new(min: &[f64], max: &[f64]) -> SpatialResult<Envelope> {
        if min.len() != max.len() {
            return Err(SpatialError::InvalidEnvelope(format!(
                "dimension mismatch: {} != {}",
                min.len(),
                max.len()
            )));
        }
        for i in 0..min.len() {
            if min[i] > max[i] {
                return Err(SpatialError::InvalidEnvelope(format!(
                    "min {} > max {} on dimension {}",
                    min[i], max[i], i
                )));
            }
        }
        Ok(Envelope {
            min: min.to_vec(),
            max: max.to_vec(),
        })
    }

    /// Creates a degenerate envelope covering a single point.
    pub fn from_point(point: &[f64]) -> Envelope {
        Envelope {
            min: point.to_vec(),
            max: point.to_vec(),
        }
    }

    /// Creates the envelope spanned by two points, normalizing each
    /// dimension so that min <= max.
    pub fn between_points(a: &[f64], b: &[f64]) -> SpatialResult<Envelope> {
        if a.len() != b.len() {
            return Err(SpatialError::InvalidEnvelope(format!(
                "dimension mismatch: {} != {}",
                a.len(),
                b.len()
            )));
        }
        let min: Vec<f64> = a.iter().zip(b).map(|(x, y)| x.min(*y)).collect();
        let max: Vec<f64> = a.iter().zip(b).map(|(x, y)| x.max(*y)).collect();
        Ok(Envelope { min, max })
    }

    /// 2D convenience constructor.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> SpatialResult<Envelope> {
        Envelope::new(&[min_x, min_y], &[max_x, max_y])
    }

    /// The invalid (zero-dimension) envelope.
    pub fn empty() -> Envelope {
        Envelope {
            min: Vec::new(),
            max: Vec::new(),
        }
    }

    /// Number of dimensions; 0 for the invalid envelope.
    pub fn dimension(&self) -> usize {
        self.min.len()
    }

    /// An envelope is valid when it has at least one dimension. Construction
    /// guarantees min <= max on every dimension.
    pub fn is_valid(&self) -> bool {
        !self.min.is_empty()
    }

    /// Minimum coordinates, one per dimension.
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    /// Maximum coordinates, one per dimension.
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Extent along the given dimension.
    pub fn width(&self, dimension: usize) -> f64 {
        self.max[dimension] - self.min[dimension]
    }

    /// Midpoint along the given dimension.
    pub fn centre(&self, dimension: usize) -> f64 {
        (self.min[dimension] + self.max[dimension]) / 2.0
    }

    /// Product of widths over all dimensions; 0 for the invalid envelope.
    pub fn area(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        (0..self.dimension()).map(|i| self.width(i)).product()
    }

    /// Checks per-dimension range overlap. Touching boundaries count as
    /// intersecting. Invalid envelopes and dimension mismatches never
    /// intersect.
    pub fn intersects(&self, other: &Envelope) -> bool {
        if !self.is_valid() || self.dimension() != other.dimension() {
            return false;
        }
        for i in 0..self.dimension() {
            if other.min[i] > self.max[i] || other.max[i] < self.min[i] {
                return false;
            }
        }
        true
    }

    /// True iff `other` lies entirely within this envelope, boundaries
    /// included. Invalid envelopes and dimension mismatches cover nothing.
    pub fn covers(&self, other: &Envelope) -> bool {
        if !self.is_valid() || self.dimension() != other.dimension() {
            return false;
        }
        for i in 0..self.dimension() {
            if other.min[i] < self.min[i] || other.max[i] > self.max[i] {
                return false;
            }
        }
        true
    }

    /// Alias of [`Envelope::covers`]. There is a single boundary-inclusive
    /// containment semantic; this name exists for call-site compatibility.
    pub fn contains(&self, other: &Envelope) -> bool {
        self.covers(other)
    }

    /// Grows this envelope to the union with `other`. An invalid envelope
    /// adopts the other's bounds verbatim.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        if !other.is_valid() {
            return;
        }
        if !self.is_valid() {
            self.min = other.min.clone();
            self.max = other.max.clone();
            return;
        }
        for i in 0..self.dimension().min(other.dimension()) {
            if other.min[i] < self.min[i] {
                self.min[i] = other.min[i];
            }
            if other.max[i] > self.max[i] {
                self.max[i] = other.max[i];
            }
        }
    }

    /// Grows this envelope to include a single point.
    pub fn expand_to_include_point(&mut self, point: &[f64]) {
        self.expand_to_include(&Envelope::from_point(point));
    }

    /// Non-mutating union of two envelopes.
    pub fn union(&self, other: &Envelope) -> Envelope {
        let mut result = self.clone();
        result.expand_to_include(other);
        result
    }

    /// Minimum distance between the envelopes: 0 when they intersect,
    /// otherwise the Euclidean norm over the dimensions with a positive gap.
    pub fn distance(&self, other: &Envelope) -> f64 {
        if self.intersects(other) {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..self.dimension().min(other.dimension()) {
            let gap = if other.min[i] > self.max[i] {
                other.min[i] - self.max[i]
            } else if other.max[i] < self.min[i] {
                self.min[i] - other.max[i]
            } else {
                0.0
            };
            if gap > 0.0 {
                sum += gap * gap;
            }
        }
        sum.sqrt()
    }

    /// Dead space between two envelopes: the area of their union minus both
    /// individual areas. Used to pick quadratic-split seeds.
    pub fn separation(&self, other: &Envelope) -> f64 {
        self.union(other).area() - self.area() - other.area()
    }

    /// Flattens to the persisted doubles layout: all mins followed by all
    /// maxes (for 2D exactly `[xmin, ymin, xmax, ymax]`).
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = self.min.clone();
        flat.extend_from_slice(&self.max);
        flat
    }

    /// Rebuilds an envelope from the flat layout produced by
    /// [`Envelope::to_flat`].
    pub fn from_flat(flat: &[f64]) -> SpatialResult<Envelope> {
        if flat.len() % 2 != 0 {
            return Err(SpatialError::InvalidEnvelope(format!(
                "flat envelope has odd length {}",
                flat.len()
            )));
        }
        let d = flat.len() / 2;
        Envelope::new(&flat[..d], &flat[d..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let env = Envelope::rect(1.0, 2.0, 3.0, 4.0).unwrap();
        assert_eq!(env.min(), &[1.0, 2.0]);
        assert_eq!(env.max(), &[3.0, 4.0]);
        assert_eq!(env.dimension(), 2);
        assert!(env.is_valid());
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        assert!(Envelope::rect(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(Envelope::new(&[0.0, 5.0], &[1.0, 4.0]).is_err());
        assert!(Envelope::new(&[0.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_empty_is_invalid() {
        let empty = Envelope::empty();
        assert!(!empty.is_valid());
        assert_eq!(empty.dimension(), 0);
        assert_eq!(empty.area(), 0.0);

        let env = Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap();
        assert!(!empty.intersects(&env));
        assert!(!empty.covers(&env));
        assert!(!env.intersects(&empty));
        assert!(!env.covers(&empty));
    }

    #[test]
    fn test_from_point() {
        let point = Envelope::from_point(&[5.0, 7.0]);
        assert!(point.is_valid());
        assert_eq!(point.area(), 0.0);
        assert_eq!(point.centre(0), 5.0);
        assert_eq!(point.centre(1), 7.0);
    }

    #[test]
    fn test_between_points_normalizes() {
        let env = Envelope::between_points(&[3.0, 0.0], &[1.0, 2.0]).unwrap();
        assert_eq!(env.min(), &[1.0, 0.0]);
        assert_eq!(env.max(), &[3.0, 2.0]);
    }

    #[test]
    fn test_area() {
        let env = Envelope::rect(0.0, 0.0, 10.0, 5.0).unwrap();
        assert_eq!(env.width(0), 10.0);
        assert_eq!(env.width(1), 5.0);
        assert_eq!(env.area(), 50.0);
    }

    #[test]
    fn test_intersects() {
        let a = Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = Envelope::rect(5.0, 5.0, 15.0, 15.0).unwrap();
        let c = Envelope::rect(20.0, 20.0, 30.0, 30.0).unwrap();
        let touching = Envelope::rect(10.0, 10.0, 20.0, 20.0).unwrap();

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&touching));
    }

    #[test]
    fn test_covers() {
        let outer = Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap();
        let inner = Envelope::rect(2.0, 2.0, 8.0, 8.0).unwrap();
        let partial = Envelope::rect(5.0, 5.0, 15.0, 15.0).unwrap();

        assert!(outer.covers(&inner));
        assert!(outer.covers(&outer));
        assert!(!outer.covers(&partial));
        assert!(!inner.covers(&outer));
    }

    #[test]
    fn test_contains_is_covers() {
        let a = Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = Envelope::rect(2.0, 2.0, 8.0, 8.0).unwrap();
        let c = Envelope::rect(5.0, 5.0, 15.0, 15.0).unwrap();

        for (x, y) in [(&a, &b), (&a, &c), (&b, &a), (&b, &c), (&c, &a)] {
            assert_eq!(x.contains(y), x.covers(y));
        }
    }

    #[test]
    fn test_expand_to_include() {
        let mut env = Envelope::rect(0.0, 0.0, 5.0, 5.0).unwrap();
        env.expand_to_include(&Envelope::rect(3.0, 3.0, 10.0, 10.0).unwrap());
        assert_eq!(env.min(), &[0.0, 0.0]);
        assert_eq!(env.max(), &[10.0, 10.0]);

        // expanding by a contained envelope changes nothing
        let before = env.clone();
        env.expand_to_include(&Envelope::rect(1.0, 1.0, 2.0, 2.0).unwrap());
        assert_eq!(env, before);
    }

    #[test]
    fn test_expand_invalid_adopts_other() {
        let mut env = Envelope::empty();
        let other = Envelope::rect(1.0, 2.0, 3.0, 4.0).unwrap();
        env.expand_to_include(&other);
        assert_eq!(env, other);
    }

    #[test]
    fn test_expand_to_include_point() {
        let mut env = Envelope::from_point(&[5.0, 5.0]);
        env.expand_to_include_point(&[0.0, 10.0]);
        assert_eq!(env.min(), &[0.0, 5.0]);
        assert_eq!(env.max(), &[5.0, 10.0]);
    }

    #[test]
    fn test_distance_disjoint() {
        let a = Envelope::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        let b = Envelope::rect(2.0, 0.0, 3.0, 1.0).unwrap();
        assert_eq!(a.distance(&b), 1.0);
        assert_eq!(b.distance(&a), 1.0);
    }

    #[test]
    fn test_distance_diagonal() {
        let a = Envelope::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        let b = Envelope::rect(4.0, 5.0, 6.0, 7.0).unwrap();
        // gaps of 3 and 4 combine as the Euclidean norm
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_distance_intersecting_is_zero() {
        let a = Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = Envelope::rect(5.0, 5.0, 15.0, 15.0).unwrap();
        assert_eq!(a.distance(&b), 0.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_separation() {
        let a = Envelope::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        let b = Envelope::rect(3.0, 3.0, 4.0, 4.0).unwrap();
        // union is 4x4 = 16, each unit square contributes 1
        assert_eq!(a.separation(&b), 14.0);

        // overlapping boxes have negative dead space
        let c = Envelope::rect(0.0, 0.0, 2.0, 2.0).unwrap();
        let d = Envelope::rect(1.0, 1.0, 3.0, 3.0).unwrap();
        assert!(c.separation(&d) < 0.0);
    }

    #[test]
    fn test_union_does_not_mutate() {
        let a = Envelope::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        let b = Envelope::rect(2.0, 2.0, 3.0, 3.0).unwrap();
        let u = a.union(&b);
        assert_eq!(u, Envelope::rect(0.0, 0.0, 3.0, 3.0).unwrap());
        assert_eq!(a, Envelope::rect(0.0, 0.0, 1.0, 1.0).unwrap());
    }

    #[test]
    fn test_flat_round_trip() {
        let env = Envelope::rect(1.0, 2.0, 3.0, 4.0).unwrap();
        let flat = env.to_flat();
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(Envelope::from_flat(&flat).unwrap(), env);

        assert!(Envelope::from_flat(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_serialization() {
        let env = Envelope::rect(1.5, 2.5, 3.5, 4.5).unwrap();
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, back);
    }
}
