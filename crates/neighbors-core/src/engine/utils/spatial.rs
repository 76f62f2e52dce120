use kiddo::{KdTree, SquaredEuclidean};
use std::cmp::Ordering;
use tracing::debug;

/// One hit of a bounded nearest-neighbor query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the hit in the point set the index was built from.
    pub index: usize,
    /// Euclidean distance to the query point.
    pub distance: f64,
}

/// Capacity of one leaf of the k-d tree.
const BUCKET_SIZE: usize = 32;

enum Backend {
    Empty,
    Tree(KdTree<f64, 3>),
    /// Linear scan, used when more than [`BUCKET_SIZE`] points share a
    /// coordinate on one axis and the tree cannot split them.
    Scan(Vec<[f64; 3]>),
}

/// Static nearest-neighbor index over a fixed point set.
///
/// Built once per entry and model from the target atom pool, then queried once
/// per ligand atom. An empty point set yields no hits for any query.
pub struct SpatialIndex {
    backend: Backend,
    len: usize,
}

impl SpatialIndex {
    pub fn build(points: &[[f64; 3]]) -> Self {
        let backend = if points.is_empty() {
            Backend::Empty
        } else if has_crowded_axis(points) {
            debug!(
                points = points.len(),
                "Too many coincident coordinates for the k-d tree; using a linear scan."
            );
            Backend::Scan(points.to_vec())
        } else {
            let positions: Vec<[f64; 3]> = points.to_vec();
            Backend::Tree((&positions).into())
        };
        Self {
            backend,
            len: points.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Up to `k` points within `cutoff` of `query`, nearest first.
    ///
    /// Hits at equal distance are ordered by index so results do not depend on
    /// tree traversal order.
    pub fn nearest_within(&self, query: &[f64; 3], k: usize, cutoff: f64) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let cutoff_sq = cutoff * cutoff;

        let mut hits: Vec<Neighbor> = match &self.backend {
            Backend::Empty => return Vec::new(),
            Backend::Tree(tree) => tree
                .nearest_n::<SquaredEuclidean>(query, k.min(self.len))
                .into_iter()
                .filter(|nn| nn.distance <= cutoff_sq)
                .map(|nn| Neighbor {
                    index: nn.item as usize,
                    distance: nn.distance.sqrt(),
                })
                .collect(),
            Backend::Scan(points) => points
                .iter()
                .enumerate()
                .filter_map(|(index, p)| {
                    let d_sq = (0..3).map(|axis| (p[axis] - query[axis]).powi(2)).sum::<f64>();
                    (d_sq <= cutoff_sq).then(|| Neighbor {
                        index,
                        distance: d_sq.sqrt(),
                    })
                })
                .collect(),
        };

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        hits.truncate(k);
        hits
    }
}

/// Whether some coordinate value is shared by more than [`BUCKET_SIZE`]
/// points on one axis.
fn has_crowded_axis(points: &[[f64; 3]]) -> bool {
    if points.len() <= BUCKET_SIZE {
        return false;
    }
    (0..3).any(|axis| {
        let mut values: Vec<f64> = points.iter().map(|p| p[axis]).collect();
        values.sort_by(f64::total_cmp);
        values
            .chunk_by(|a, b| a == b)
            .any(|run| run.len() > BUCKET_SIZE)
    })
}
