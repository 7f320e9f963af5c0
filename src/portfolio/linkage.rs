//! # Linkage
//!
//! $$
//! d(k, i \cup j) = \sqrt{\frac{(n_k+n_i)\,d_{ki}^2 + (n_k+n_j)\,d_{kj}^2 - n_k\, d_{ij}^2}{n_i+n_j+n_k}}
//! $$
//!
//! Agglomerative Ward clustering stored as an index arena, and the
//! quasi-diagonal leaf ordering derived from it.

use ndarray::Array2;
use ndarray::ArrayView1;

use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// A merge of two clusters. Ids below the leaf count are leaves; merge `k`
/// creates cluster id `leaves + k`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterNode {
  pub left: usize,
  pub right: usize,
  /// Ward distance at which the merge happened.
  pub height: f64,
  /// Number of leaves under this node.
  pub size: usize,
}

/// Binary merge tree over `leaves` observations.
#[derive(Clone, Debug, PartialEq)]
pub struct Linkage {
  leaves: usize,
  nodes: Vec<ClusterNode>,
}

fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
  a.iter()
    .zip(b.iter())
    .map(|(x, y)| (x - y).powi(2))
    .sum::<f64>()
    .sqrt()
}

impl Linkage {
  /// Ward clustering of the rows of `features`, each row one observation.
  ///
  /// Merges always join the globally closest pair, with ties resolved in
  /// row-major scan order.
  pub fn ward(features: &Array2<f64>) -> AnalyticsResult<Self> {
    let n = features.nrows();
    if n == 0 {
      return Err(AnalyticsError::input("cannot cluster zero observations"));
    }
    if features.iter().any(|v| !v.is_finite()) {
      return Err(AnalyticsError::input("clustering input holds non-finite values"));
    }

    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
      for j in (i + 1)..n {
        let v = euclidean(features.row(i), features.row(j));
        d[[i, j]] = v;
        d[[j, i]] = v;
      }
    }

    let mut active = vec![true; n];
    let mut size = vec![1usize; n];
    let mut node_id: Vec<usize> = (0..n).collect();
    let mut nodes = Vec::with_capacity(n.saturating_sub(1));

    for step in 0..n.saturating_sub(1) {
      let mut best = f64::INFINITY;
      let (mut mi, mut mj) = (0, 0);
      for i in 0..n {
        if !active[i] {
          continue;
        }
        for j in (i + 1)..n {
          if active[j] && d[[i, j]] < best {
            best = d[[i, j]];
            mi = i;
            mj = j;
          }
        }
      }

      let (ni, nj) = (size[mi] as f64, size[mj] as f64);
      for k in 0..n {
        if !active[k] || k == mi || k == mj {
          continue;
        }
        let nk = size[k] as f64;
        let sq = ((nk + ni) * d[[k, mi]].powi(2) + (nk + nj) * d[[k, mj]].powi(2)
          - nk * best.powi(2))
          / (ni + nj + nk);
        let merged = sq.max(0.0).sqrt();
        d[[mi, k]] = merged;
        d[[k, mi]] = merged;
      }

      let (a, b) = (node_id[mi], node_id[mj]);
      nodes.push(ClusterNode {
        left: a.min(b),
        right: a.max(b),
        height: best,
        size: size[mi] + size[mj],
      });
      size[mi] += size[mj];
      node_id[mi] = n + step;
      active[mj] = false;
    }

    Ok(Self { leaves: n, nodes })
  }

  pub fn leaves(&self) -> usize {
    self.leaves
  }

  pub fn nodes(&self) -> &[ClusterNode] {
    &self.nodes
  }

  /// Id of the root cluster.
  pub fn root(&self) -> usize {
    if self.nodes.is_empty() {
      0
    } else {
      self.leaves + self.nodes.len() - 1
    }
  }

  /// Leaves in left-first pre-order, so that members of each cluster are
  /// contiguous.
  pub fn quasi_diagonal(&self) -> Vec<usize> {
    let mut order = Vec::with_capacity(self.leaves);
    if self.leaves == 0 {
      return order;
    }

    let mut stack = vec![self.root()];
    while let Some(id) = stack.pop() {
      if id < self.leaves {
        order.push(id);
      } else {
        let node = self.nodes[id - self.leaves];
        stack.push(node.right);
        stack.push(node.left);
      }
    }
    order
  }
}
