use nalgebra::Matrix4;

use super::between_factor::BetweenFactor;

/// Switchable-constraint weights of loop-closure factors.
///
/// Every loop factor owns one switch value $w \in (0, 1]$; sequential factors
/// always have weight one. The weights are refreshed after each pose update and
/// read back by the next linearization.
#[derive(Debug, Clone)]
pub struct LineProcess {
    /// factor index -> slot in `weights`, `None` for sequential factors
    slots: Vec<Option<usize>>,
    weights: Vec<f64>,
}

impl LineProcess {
    pub fn new(factors: &[BetweenFactor]) -> Self {
        let mut slots = Vec::<Option<usize>>::with_capacity(factors.len());
        let mut count = 0_usize;
        for f in factors {
            if f.is_loop {
                slots.push(Some(count));
                count += 1;
            } else {
                slots.push(None);
            }
        }
        LineProcess {
            slots,
            weights: vec![1.0; count],
        }
    }
    /// Switch value for $s = d^T \Omega d$: $(1 / (1 + s))^2$.
    pub fn switch_value(squared_mahalanobis: f64) -> f64 {
        let t = 1.0 / (1.0 + squared_mahalanobis);
        t * t
    }
    /// Weight of factor by its index.
    pub fn weight(&self, factor_index: usize) -> f64 {
        match self.slots.get(factor_index) {
            Some(Some(slot)) => self.weights[*slot],
            _ => 1.0,
        }
    }
    /// Weights of loop factors in factor order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
    pub fn len(&self) -> usize {
        self.weights.len()
    }
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
    /// Recompute loop factor weights at `poses`.
    pub fn refresh(&mut self, factors: &[BetweenFactor], poses: &[Matrix4<f64>]) {
        for (factor, slot) in factors.iter().zip(self.slots.iter()) {
            if let Some(slot) = slot {
                let d = factor.error(poses);
                self.weights[*slot] = Self::switch_value(factor.squared_mahalanobis(&d));
            }
        }
    }
}
#[cfg(test)]
mod tests {
    use nalgebra::{Matrix4, Matrix6, Vector3};

    use crate::{
        core::pose_graph::PoseEdge,
        slam::{between_factor::BetweenFactor, se3},
    };

    use super::LineProcess;

    fn translation(x: f64) -> Matrix4<f64> {
        se3::from_rotation_translation(&Vector3::zeros(), &Vector3::new(x, 0.0, 0.0))
    }

    fn factors() -> Vec<BetweenFactor> {
        let edges = vec![
            PoseEdge::new(0, 1, translation(-1.0), Matrix6::identity(), false),
            PoseEdge::new(1, 2, translation(-1.0), Matrix6::identity(), false),
            PoseEdge::new(2, 0, translation(1.5), Matrix6::identity(), true),
        ];
        BetweenFactor::from_edges(&edges)
    }

    #[test]
    fn starts_at_one() {
        let lp = LineProcess::new(&factors());
        assert_eq!(lp.len(), 1);
        assert_eq!(lp.weights(), &[1.0]);
        for i in 0..4 {
            assert_eq!(lp.weight(i), 1.0);
        }
    }
    #[test]
    fn refresh_only_loops() {
        let factors = factors();
        let mut lp = LineProcess::new(&factors);
        let poses = [translation(0.0), translation(1.0), translation(2.0)];
        lp.refresh(&factors, &poses);
        // loop error: 2 - 0 - 1.5 = 0.5, s = 0.25
        let expected = (1.0_f64 / 1.25).powi(2);
        assert!((lp.weight(2) - expected).abs() < 1e-12);
        assert_eq!(lp.weight(0), 1.0);
        assert_eq!(lp.weight(1), 1.0);
    }
    #[test]
    fn switch_value() {
        assert_eq!(LineProcess::switch_value(0.0), 1.0);
        assert!((LineProcess::switch_value(1.0) - 0.25).abs() < 1e-15);
        assert!(LineProcess::switch_value(1e6) < 1e-11);
    }
    #[test]
    fn no_loops() {
        let lp = LineProcess::new(&factors()[..2]);
        assert!(lp.is_empty());
    }
}
