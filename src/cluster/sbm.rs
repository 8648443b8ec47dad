//! Bayesian Poisson block model for directed weighted multigraphs.
//!
//! Block rates are integrated out against a Gamma prior, so the objective
//! is a description length (negative log marginal likelihood plus the
//! partition prior), in nats:
//!
//! ```text
//! DL = - sum_rs score(e_rs, total_rs)        block-pair counts
//!      + sum_r K_r^out ln K_r^out + K_r^in ln K_r^in   (degree-corrected only)
//!      + ln C(N-1, B-1) + ln N! - sum_r ln n_r! + ln N  partition prior
//!
//! score(e, t) = a0 ln b0 + lgamma(a0 + e) - lgamma(a0) - (a0 + e) ln(b0 + t)
//! ```
//!
//! For each admissible block count the partition is searched with annealed
//! Gibbs sweeps followed by greedy sweeps; the block count with the lowest
//! description length wins.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use statrs::function::gamma::ln_gamma;

use crate::cluster::solver::{BlockBounds, BlockFit, BlockModelSolver};
use crate::config::{BlockModel, InferenceConfig};
use crate::error::SolverError;
use crate::graph::CompressedGraph;

/// Inverse temperature of the first annealing sweep
const BETA_START: f64 = 0.1;

/// Moves must improve the objective by more than this in greedy sweeps
const GREEDY_TOLERANCE: f64 = 1e-9;

/// Gamma-Poisson log marginal likelihood of `edge` counts over `total` exposure
#[inline]
fn poisson_score(a0: f64, b0: f64, edge: f64, total: f64) -> f64 {
    a0 * b0.ln() + ln_gamma(a0 + edge) - ln_gamma(a0) - (a0 + edge) * (b0 + total).ln()
}

#[inline]
fn xlogx(x: f64) -> f64 {
    if x > 0.0 {
        x * x.ln()
    } else {
        0.0
    }
}

#[inline]
fn ln_factorial(n: usize) -> f64 {
    ln_gamma(n as f64 + 1.0)
}

/// Built-in block-model solver
#[derive(Debug, Clone)]
pub struct BayesianBlockModel {
    pub model: BlockModel,
    pub degree_corrected: bool,
    pub anneal_sweeps: usize,
    pub greedy_sweeps: usize,
}

impl Default for BayesianBlockModel {
    fn default() -> Self {
        Self::from_config(&InferenceConfig::default())
    }
}

impl BayesianBlockModel {
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self {
            model: config.model,
            degree_corrected: config.degree_corrected,
            anneal_sweeps: config.anneal_sweeps,
            greedy_sweeps: config.greedy_sweeps,
        }
    }
}

/// Weighted adjacency without self-loops, in both directions
struct Adjacency {
    out_lists: Vec<Vec<(usize, f64)>>,
    in_lists: Vec<Vec<(usize, f64)>>,
    out_strength: Vec<f64>,
    in_strength: Vec<f64>,
    total_weight: f64,
}

impl Adjacency {
    fn new(graph: &CompressedGraph) -> Self {
        let n = graph.node_count;
        let mut out_lists = vec![Vec::new(); n];
        let mut in_lists = vec![Vec::new(); n];
        let mut out_strength = vec![0.0; n];
        let mut in_strength = vec![0.0; n];
        let mut total_weight = 0.0;

        for (src, dst, w) in graph.iter_edges() {
            let (src, dst, w) = (src as usize, dst as usize, w as f64);
            if src == dst {
                continue;
            }
            out_lists[src].push((dst, w));
            in_lists[dst].push((src, w));
            out_strength[src] += w;
            in_strength[dst] += w;
            total_weight += w;
        }

        Self {
            out_lists,
            in_lists,
            out_strength,
            in_strength,
            total_weight,
        }
    }
}

/// Sufficient statistics of one partition with a fixed block count
struct BlockState<'a> {
    adj: &'a Adjacency,
    model: BlockModel,
    degree_corrected: bool,
    a0: f64,
    b0: f64,
    k: usize,
    membership: Vec<usize>,
    /// Row-major k x k block-pair edge weights
    counts: Vec<f64>,
    sizes: Vec<usize>,
    block_out: Vec<f64>,
    block_in: Vec<f64>,
}

impl<'a> BlockState<'a> {
    fn new(adj: &'a Adjacency, solver: &BayesianBlockModel, membership: Vec<usize>, k: usize) -> Self {
        let n = membership.len();
        let total = adj.total_weight.max(1.0);
        // Prior mean of a block rate matches the overall scale of the data
        let b0 = if solver.degree_corrected {
            1.0 / total
        } else {
            (n as f64) * (n as f64) / total
        };

        let mut state = Self {
            adj,
            model: solver.model,
            degree_corrected: solver.degree_corrected,
            a0: 1.0,
            b0,
            k,
            membership,
            counts: vec![0.0; k * k],
            sizes: vec![0; k],
            block_out: vec![0.0; k],
            block_in: vec![0.0; k],
        };

        for v in 0..n {
            let r = state.membership[v];
            state.sizes[r] += 1;
            state.block_out[r] += adj.out_strength[v];
            state.block_in[r] += adj.in_strength[v];
            for &(u, w) in &adj.out_lists[v] {
                let s = state.membership[u];
                state.counts[r * k + s] += w;
            }
        }

        state
    }

    fn exposure(&self, r: usize, s: usize) -> f64 {
        if self.degree_corrected {
            1.0
        } else if r == s {
            (self.sizes[r] * self.sizes[r].saturating_sub(1)) as f64
        } else {
            (self.sizes[r] * self.sizes[s]) as f64
        }
    }

    fn pair_cost(&self, r: usize, s: usize) -> f64 {
        -poisson_score(self.a0, self.b0, self.counts[r * self.k + s], self.exposure(r, s))
    }

    /// Terms of the objective that depend on a single block
    fn block_cost(&self, r: usize) -> f64 {
        let dc = if self.degree_corrected {
            xlogx(self.block_out[r]) + xlogx(self.block_in[r])
        } else {
            0.0
        };
        dc - ln_factorial(self.sizes[r])
    }

    /// Planted partition: one within-block and one between-block rate
    fn planted_cost(&self) -> f64 {
        let e_in: f64 = (0..self.k).map(|r| self.counts[r * self.k + r]).sum();
        let e_out = self.adj.total_weight - e_in;

        let (t_in, t_out) = if self.degree_corrected {
            (self.k as f64, (self.k * (self.k - 1)) as f64)
        } else {
            let n = self.membership.len();
            let t_in: f64 = (0..self.k).map(|r| self.exposure(r, r)).sum();
            (t_in, (n * n.saturating_sub(1)) as f64 - t_in)
        };

        -poisson_score(self.a0, self.b0, e_in, t_in) - poisson_score(self.a0, self.b0, e_out.max(0.0), t_out)
    }

    /// Cost of every term touched by a move between blocks `r` and `s`
    fn affected_cost(&self, r: usize, s: usize) -> f64 {
        let mut cost = self.block_cost(r) + self.block_cost(s);
        match self.model {
            BlockModel::Standard => {
                for t in 0..self.k {
                    cost += self.pair_cost(r, t) + self.pair_cost(s, t);
                    if t != r && t != s {
                        cost += self.pair_cost(t, r) + self.pair_cost(t, s);
                    }
                }
            }
            BlockModel::PlantedPartition => cost += self.planted_cost(),
        }
        cost
    }

    fn move_node(&mut self, v: usize, to: usize) {
        let from = self.membership[v];
        if from == to {
            return;
        }
        let k = self.k;
        for &(u, w) in &self.adj.out_lists[v] {
            let t = self.membership[u];
            self.counts[from * k + t] -= w;
            self.counts[to * k + t] += w;
        }
        for &(u, w) in &self.adj.in_lists[v] {
            let t = self.membership[u];
            self.counts[t * k + from] -= w;
            self.counts[t * k + to] += w;
        }
        self.sizes[from] -= 1;
        self.sizes[to] += 1;
        self.block_out[from] -= self.adj.out_strength[v];
        self.block_out[to] += self.adj.out_strength[v];
        self.block_in[from] -= self.adj.in_strength[v];
        self.block_in[to] += self.adj.in_strength[v];
        self.membership[v] = to;
    }

    /// Change in description length if `v` moved to `to`
    fn move_delta(&mut self, v: usize, to: usize) -> f64 {
        let from = self.membership[v];
        if from == to {
            return 0.0;
        }
        let before = self.affected_cost(from, to);
        self.move_node(v, to);
        let after = self.affected_cost(from, to);
        self.move_node(v, from);
        after - before
    }

    fn description_length(&self) -> f64 {
        let n = self.membership.len();
        let k = self.k;

        let edges = match self.model {
            BlockModel::Standard => (0..k)
                .flat_map(|r| (0..k).map(move |s| (r, s)))
                .map(|(r, s)| self.pair_cost(r, s))
                .sum::<f64>(),
            BlockModel::PlantedPartition => self.planted_cost(),
        };
        let blocks: f64 = (0..k).map(|r| self.block_cost(r)).sum();

        // ln C(N-1, B-1) + ln N! + ln N; the -ln n_r! part sits in block_cost
        let partition = ln_gamma(n as f64) - ln_gamma(k as f64) - ln_gamma((n - k + 1) as f64)
            + ln_factorial(n)
            + (n as f64).ln();

        edges + blocks + partition
    }

    /// One sweep over all nodes. With `beta = None` every node takes its best
    /// improving move; otherwise moves are sampled at inverse temperature beta.
    fn sweep(&mut self, order: &[usize], beta: Option<f64>, rng: &mut StdRng, log_probs: &mut [f64]) -> usize {
        let mut moves = 0;
        for &v in order {
            let from = self.membership[v];
            if self.sizes[from] == 1 {
                continue;
            }

            for t in 0..self.k {
                log_probs[t] = -self.move_delta(v, t);
            }

            let to = match beta {
                Some(beta) => {
                    for lp in log_probs.iter_mut() {
                        *lp *= beta;
                    }
                    sample_categorical_log(log_probs, rng)
                }
                None => {
                    let best = argmax(log_probs);
                    if log_probs[best] > GREEDY_TOLERANCE {
                        best
                    } else {
                        from
                    }
                }
            };

            if to != from {
                self.move_node(v, to);
                moves += 1;
            }
        }
        moves
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Sample from a categorical distribution given log-probabilities.
///
/// Uses the log-sum-exp trick for numerical stability.
fn sample_categorical_log(log_probs: &[f64], rng: &mut StdRng) -> usize {
    let max = log_probs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let weights: Vec<f64> = log_probs.iter().map(|lp| (lp - max).exp()).collect();
    let total: f64 = weights.iter().sum();

    if total <= 0.0 || !total.is_finite() {
        return rng.random_range(0..log_probs.len());
    }

    let u: f64 = rng.random::<f64>() * total;
    let mut cum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cum += w;
        if cum >= u {
            return i;
        }
    }

    weights.len() - 1
}

/// Random assignment with every one of the `k` blocks non-empty
fn initial_membership(n: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut membership = vec![0; n];
    for (i, &v) in order.iter().enumerate() {
        membership[v] = if i < k { i } else { rng.random_range(0..k) };
    }
    membership
}

impl BayesianBlockModel {
    /// Search partitions with exactly `k` blocks; returns (membership, DL)
    fn fit_fixed_k(&self, adj: &Adjacency, k: usize, rng: &mut StdRng) -> Result<(Vec<usize>, f64), SolverError> {
        let n = adj.out_lists.len();
        let membership = initial_membership(n, k, rng);
        let mut state = BlockState::new(adj, self, membership, k);

        if k > 1 {
            let mut order: Vec<usize> = (0..n).collect();
            let mut log_probs = vec![0.0; k];

            for sweep in 0..self.anneal_sweeps {
                let frac = if self.anneal_sweeps > 1 {
                    sweep as f64 / (self.anneal_sweeps - 1) as f64
                } else {
                    1.0
                };
                let beta = BETA_START + (1.0 - BETA_START) * frac;
                order.shuffle(rng);
                state.sweep(&order, Some(beta), rng, &mut log_probs);
            }

            for _ in 0..self.greedy_sweeps {
                order.shuffle(rng);
                if state.sweep(&order, None, rng, &mut log_probs) == 0 {
                    break;
                }
            }
        }

        let dl = state.description_length();
        if !dl.is_finite() {
            return Err(SolverError::NonFiniteObjective {
                sweeps: self.anneal_sweeps + self.greedy_sweeps,
            });
        }

        log::debug!("k={} description length {:.3}", k, dl);
        Ok((state.membership, dl))
    }
}

impl BlockModelSolver for BayesianBlockModel {
    fn fit(&self, graph: &CompressedGraph, bounds: BlockBounds, seed: u64) -> Result<BlockFit, SolverError> {
        let range = bounds.resolve(graph.node_count)?;
        log::debug!("{}: searching {:?} blocks over {} nodes", self.name(), range, graph.node_count);
        let adj = Adjacency::new(graph);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut best: Option<(Vec<usize>, f64)> = None;
        for k in range {
            let (membership, dl) = self.fit_fixed_k(&adj, k, &mut rng)?;
            let improves = best.as_ref().map_or(true, |(_, best_dl)| dl < *best_dl);
            if improves {
                best = Some((membership, dl));
            }
        }

        let (membership, description_length) = best.ok_or(SolverError::EmptyGraph)?;
        Ok(BlockFit {
            labels: membership.into_iter().map(|b| Some(b as u32)).collect(),
            description_length,
        })
    }

    fn name(&self) -> &str {
        match self.model {
            BlockModel::Standard => "bayesian-sbm",
            BlockModel::PlantedPartition => "bayesian-pp-sbm",
        }
    }
}
