//! Sparse, Z-sorted point volumes consumed by the renderers.
//!
//! Upstream labeling and expansion stages produce point clouds in a
//! transposed layout: parallel `z`, `x`, `y` coordinate vectors plus a
//! payload aligned with them. Keeping `z` sorted lets each output slice find
//! its points with two binary searches.
//!
//! - [`FluorVolume`]: payload is a fluorophore-type × point multiplicity matrix
//! - [`LabelVolume`]: payload is one label id per point

use std::ops::Range;

use ndarray::{Array2, Axis};
use thiserror::Error;

/// Errors building sparse volumes
#[derive(Debug, Error, PartialEq)]
pub enum VolumeError {
    #[error("Coordinate and payload lengths differ: z={z}, x={x}, y={y}, payload={payload}")]
    LengthMismatch {
        z: usize,
        x: usize,
        y: usize,
        payload: usize,
    },

    #[error("Z coordinates must be sorted ascending (violated at index {index})")]
    NotSorted { index: usize },
}

/// Z-sorted point coordinates in voxel units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparsePoints {
    z: Vec<usize>,
    x: Vec<usize>,
    y: Vec<usize>,
}

impl SparsePoints {
    /// Wrap already-sorted coordinates.
    pub fn new(z: Vec<usize>, x: Vec<usize>, y: Vec<usize>) -> Result<Self, VolumeError> {
        check_lengths(&z, &x, &y, z.len())?;
        if let Some(index) = z.windows(2).position(|w| w[1] < w[0]) {
            return Err(VolumeError::NotSorted { index: index + 1 });
        }
        Ok(Self { z, x, y })
    }

    /// Sort coordinates by z (stable) and return the permutation applied,
    /// so callers can reorder payloads to match.
    fn sorted(z: Vec<usize>, x: Vec<usize>, y: Vec<usize>) -> (Self, Vec<usize>) {
        let mut order: Vec<usize> = (0..z.len()).collect();
        order.sort_by_key(|&i| z[i]);

        let points = Self {
            z: order.iter().map(|&i| z[i]).collect(),
            x: order.iter().map(|&i| x[i]).collect(),
            y: order.iter().map(|&i| y[i]).collect(),
        };
        (points, order)
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    pub fn z(&self) -> &[usize] {
        &self.z
    }

    pub fn x(&self) -> &[usize] {
        &self.x
    }

    pub fn y(&self) -> &[usize] {
        &self.y
    }

    /// Indices of points with `lo <= z < hi`, found by binary search.
    pub fn z_range(&self, lo: usize, hi: usize) -> Range<usize> {
        let start = self.z.partition_point(|&z| z < lo);
        let end = self.z.partition_point(|&z| z < hi).max(start);
        start..end
    }

    /// Whether point `index` lies inside `[0, width) × [0, height)`
    pub fn is_inside(&self, index: usize, width: usize, height: usize) -> bool {
        self.x[index] < width && self.y[index] < height
    }

    /// Number of points whose x or y falls outside `[0, width) × [0, height)`
    pub fn count_outside(&self, width: usize, height: usize) -> usize {
        (0..self.len())
            .filter(|&i| !self.is_inside(i, width, height))
            .count()
    }
}

fn check_lengths(z: &[usize], x: &[usize], y: &[usize], payload: usize) -> Result<(), VolumeError> {
    if z.len() != x.len() || z.len() != y.len() || z.len() != payload {
        return Err(VolumeError::LengthMismatch {
            z: z.len(),
            x: x.len(),
            y: y.len(),
            payload,
        });
    }
    Ok(())
}

/// Fluorophore point cloud with per-type multiplicities
#[derive(Debug, Clone, PartialEq)]
pub struct FluorVolume {
    points: SparsePoints,
    /// `[fluor_type, point]` fluorophore counts
    multiplicities: Array2<u32>,
}

impl FluorVolume {
    pub fn new(points: SparsePoints, multiplicities: Array2<u32>) -> Result<Self, VolumeError> {
        check_lengths(
            points.z(),
            points.x(),
            points.y(),
            multiplicities.len_of(Axis(1)),
        )?;
        Ok(Self {
            points,
            multiplicities,
        })
    }

    /// Build from unsorted coordinates, sorting points and multiplicity
    /// columns together.
    pub fn from_unsorted(
        z: Vec<usize>,
        x: Vec<usize>,
        y: Vec<usize>,
        multiplicities: Array2<u32>,
    ) -> Result<Self, VolumeError> {
        check_lengths(&z, &x, &y, multiplicities.len_of(Axis(1)))?;
        let (points, order) = SparsePoints::sorted(z, x, y);
        let multiplicities = multiplicities.select(Axis(1), &order);
        Ok(Self {
            points,
            multiplicities,
        })
    }

    pub fn points(&self) -> &SparsePoints {
        &self.points
    }

    pub fn multiplicities(&self) -> &Array2<u32> {
        &self.multiplicities
    }

    pub fn num_fluor_types(&self) -> usize {
        self.multiplicities.len_of(Axis(0))
    }
}

/// Ground-truth label point cloud
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    points: SparsePoints,
    labels: Vec<u32>,
}

impl LabelVolume {
    pub fn new(points: SparsePoints, labels: Vec<u32>) -> Result<Self, VolumeError> {
        check_lengths(points.z(), points.x(), points.y(), labels.len())?;
        Ok(Self { points, labels })
    }

    /// Build from unsorted coordinates, sorting labels alongside
    pub fn from_unsorted(
        z: Vec<usize>,
        x: Vec<usize>,
        y: Vec<usize>,
        labels: Vec<u32>,
    ) -> Result<Self, VolumeError> {
        check_lengths(&z, &x, &y, labels.len())?;
        let (points, order) = SparsePoints::sorted(z, x, y);
        let labels = order.iter().map(|&i| labels[i]).collect();
        Ok(Self { points, labels })
    }

    pub fn points(&self) -> &SparsePoints {
        &self.points
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rejects_unsorted() {
        let err = SparsePoints::new(vec![0, 2, 1], vec![0; 3], vec![0; 3]).unwrap_err();
        assert_eq!(err, VolumeError::NotSorted { index: 2 });
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(matches!(
            SparsePoints::new(vec![0, 1], vec![0], vec![0, 0]),
            Err(VolumeError::LengthMismatch { .. })
        ));

        let points = SparsePoints::new(vec![0, 1], vec![0, 0], vec![0, 0]).unwrap();
        assert!(LabelVolume::new(points.clone(), vec![1]).is_err());
        assert!(FluorVolume::new(points, Array2::zeros((2, 3))).is_err());
    }

    #[test]
    fn test_z_range_binary_search() {
        let points =
            SparsePoints::new(vec![1, 3, 3, 3, 7, 9], vec![0; 6], vec![0; 6]).unwrap();

        assert_eq!(points.z_range(3, 4), 1..4);
        assert_eq!(points.z_range(0, 100), 0..6);
        assert_eq!(points.z_range(4, 7), 4..4);
        assert_eq!(points.z_range(8, 2), 5..5);
        assert_eq!(points.z_range(10, 20), 6..6);
    }

    #[test]
    fn test_fluor_from_unsorted_permutes_columns() {
        let volume = FluorVolume::from_unsorted(
            vec![5, 1, 3],
            vec![10, 11, 12],
            vec![20, 21, 22],
            array![[1u32, 2, 3], [4, 5, 6]],
        )
        .unwrap();

        assert_eq!(volume.points().z(), &[1, 3, 5]);
        assert_eq!(volume.points().x(), &[11, 12, 10]);
        assert_eq!(volume.points().y(), &[21, 22, 20]);
        assert_eq!(volume.multiplicities(), &array![[2u32, 3, 1], [5, 6, 4]]);
        assert_eq!(volume.num_fluor_types(), 2);
    }

    #[test]
    fn test_label_from_unsorted_is_stable() {
        let volume =
            LabelVolume::from_unsorted(vec![2, 0, 2, 1], vec![0, 1, 2, 3], vec![0; 4], vec![7, 8, 9, 10])
                .unwrap();
        assert_eq!(volume.points().z(), &[0, 1, 2, 2]);
        assert_eq!(volume.labels(), &[8, 10, 7, 9]);
    }

    #[test]
    fn test_count_outside() {
        let points = SparsePoints::new(vec![0, 0, 0], vec![1, 5, 2], vec![1, 1, 9]).unwrap();
        assert_eq!(points.count_outside(5, 5), 2);
        assert!(points.is_inside(0, 5, 5));
        assert!(!points.is_inside(1, 5, 5));
        assert!(!points.is_inside(2, 5, 5));
    }
}
