/// Gauss-Hermite nodes and weights, packed the way the shader consumes them.
use constants::quadrature::{MAX_GH_ORDER, table_len, table_offset};

const NEWTON_EPS: f64 = 3e-14;
const NEWTON_MAX_ITERATIONS: usize = 30;

/// Nodes and weights of the n-point Gauss-Hermite rule (physicists'
/// convention, weight function e^{-x²}; the weights sum to √π).
///
/// Roots of H_n are located by Newton iteration on the orthonormal
/// three-term recurrence, seeded with the classic asymptotic guesses and
/// refined inward root by root. Nodes come out in descending order.
pub fn hermgauss(order: usize) -> (Vec<f64>, Vec<f64>) {
    assert!(order >= 1, "quadrature order must be at least 1");

    let n = order;
    let m = (n + 1) / 2;
    let mut nodes = vec![0.0f64; n];
    let mut weights = vec![0.0f64; n];

    // π^{-1/4}, the normalization of the zeroth orthonormal Hermite function.
    let pim4 = std::f64::consts::PI.powf(-0.25);

    let mut z = 0.0f64;
    for i in 0..m {
        z = match i {
            0 => {
                let anu = (2 * n + 1) as f64;
                anu.sqrt() - 1.85575 * anu.powf(-1.0 / 6.0)
            }
            1 => z - 1.14 * (n as f64).powf(0.426) / z,
            2 => 1.86 * z - 0.86 * nodes[0],
            3 => 1.91 * z - 0.91 * nodes[1],
            _ => 2.0 * z - nodes[i - 2],
        };

        let mut pp = 0.0;
        for _ in 0..NEWTON_MAX_ITERATIONS {
            let mut p1 = pim4;
            let mut p2 = 0.0;
            for j in 0..n {
                let p3 = p2;
                p2 = p1;
                let j1 = (j + 1) as f64;
                p1 = z * (2.0 / j1).sqrt() * p2 - (j as f64 / j1).sqrt() * p3;
            }
            pp = (2.0 * n as f64).sqrt() * p2;
            let z1 = z;
            z = z1 - p1 / pp;
            if (z - z1).abs() <= NEWTON_EPS {
                break;
            }
        }

        nodes[i] = z;
        nodes[n - 1 - i] = -z;
        weights[i] = 2.0 / (pp * pp);
        weights[n - 1 - i] = weights[i];
    }

    (nodes, weights)
}

/// Packed triangular table of scaled rules for orders 1..=max_order.
///
/// Each entry is `(node, weight · e^{node²})`: the exponential factor folds
/// the weight function back out so the integrand can be evaluated directly.
/// Rows within one order are sorted by descending raw weight, so truncating
/// a row keeps the most significant nodes.
pub struct GhTable {
    max_order: usize,
    entries: Vec<[f64; 2]>,
}

impl GhTable {
    pub fn build(max_order: usize) -> Self {
        assert!(max_order <= MAX_GH_ORDER);

        let mut entries = Vec::with_capacity(table_len(max_order));
        for order in 1..=max_order {
            let (nodes, weights) = hermgauss(order);
            let mut rule: Vec<(f64, f64)> = nodes.into_iter().zip(weights).collect();
            rule.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (node, weight) in rule {
                entries.push([node, weight * (node * node).exp()]);
            }
        }

        Self { max_order, entries }
    }

    /// The `(node, scaled weight)` rows of one order.
    pub fn row(&self, order: usize) -> &[[f64; 2]] {
        assert!(order >= 1 && order <= self.max_order);
        let offset = table_offset(order);
        &self.entries[offset..offset + order]
    }
}
