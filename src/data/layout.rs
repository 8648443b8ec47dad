//! Externally computed 2-D node coordinates

use ndarray::{Array2, ArrayView1};
use std::collections::HashMap;

/// Mapping from user id to a 2-D coordinate.
///
/// Only used to score partitions, never to derive them.
#[derive(Debug, Clone)]
pub struct SpatialLayout {
    ids: Vec<String>,
    coords: Array2<f64>,
    index: HashMap<String, usize>,
}

impl SpatialLayout {
    /// Build a layout from `(user_id, x, y)` points.
    ///
    /// A repeated user id keeps its first coordinate.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (String, f64, f64)>,
    {
        let mut ids = Vec::new();
        let mut flat = Vec::new();
        let mut index = HashMap::new();

        for (id, x, y) in points {
            if index.contains_key(&id) {
                log::warn!("Duplicate layout entry for {}, keeping the first", id);
                continue;
            }
            index.insert(id.clone(), ids.len());
            ids.push(id);
            flat.push(x);
            flat.push(y);
        }

        let coords = Array2::from_shape_vec((ids.len(), 2), flat)
            .unwrap_or_else(|_| Array2::zeros((0, 2)));

        Self { ids, coords, index }
    }

    /// Number of distinct nodes with a coordinate
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Row of `coords` holding this user's coordinate
    pub fn position(&self, user_id: &str) -> Option<usize> {
        self.index.get(user_id).copied()
    }

    /// Coordinate of one row
    pub fn point(&self, row: usize) -> ArrayView1<'_, f64> {
        self.coords.row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_keep_first_point() {
        let layout = SpatialLayout::from_points(vec![
            ("a".to_string(), 0.0, 1.0),
            ("b".to_string(), 2.0, 3.0),
            ("a".to_string(), 9.0, 9.0),
        ]);
        assert_eq!(layout.len(), 2);
        let row = layout.position("a").unwrap();
        assert_eq!(layout.point(row).to_vec(), vec![0.0, 1.0]);
        assert_eq!(layout.position("z"), None);
    }
}
