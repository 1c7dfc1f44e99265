/// Snapshot handed to a [`StoppingCriterion`] after every iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationState {
    /// zero-based iteration index
    pub iteration: usize,
    /// weighted cost at the linearization point
    pub cost_before: f64,
    /// cost at the updated poses, same weights as `cost_before`
    pub cost_after: f64,
    /// norm of the applied tangent correction
    pub step_norm: f64,
}

/// Decides whether the optimizer terminates early.
/// Checked once per iteration boundary, after the poses were updated.
pub trait StoppingCriterion {
    fn should_stop(&mut self, state: &IterationState) -> bool;
}

impl<F> StoppingCriterion for F
where
    F: FnMut(&IterationState) -> bool,
{
    fn should_stop(&mut self, state: &IterationState) -> bool {
        self(state)
    }
}

/// Always run the full iteration budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverStop;
impl StoppingCriterion for NeverStop {
    fn should_stop(&mut self, _state: &IterationState) -> bool {
        false
    }
}

/// Stop when the cost no longer decreases enough, absolutely or relatively.
#[derive(Debug, Clone, Copy)]
pub struct ErrorDecrease {
    pub min_abs_decrease: f64,
    pub min_rel_decrease: f64,
}
impl ErrorDecrease {
    pub fn new(threshold: f64) -> Self {
        ErrorDecrease {
            min_abs_decrease: threshold,
            min_rel_decrease: threshold,
        }
    }
}
impl StoppingCriterion for ErrorDecrease {
    fn should_stop(&mut self, state: &IterationState) -> bool {
        let decrease = state.cost_before - state.cost_after;
        decrease < self.min_abs_decrease || decrease / state.cost_before < self.min_rel_decrease
    }
}

/// Stop when the tangent correction becomes small.
#[derive(Debug, Clone, Copy)]
pub struct StepNorm {
    pub threshold: f64,
}
impl StoppingCriterion for StepNorm {
    fn should_stop(&mut self, state: &IterationState) -> bool {
        state.step_norm < self.threshold
    }
}

/// Built-in criteria selectable from params.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StoppingCriterionType {
    #[default]
    ErrorDecrease,
    StepNorm,
}
impl StoppingCriterionType {
    /// Criterion for `threshold`; without a threshold the optimizer never stops early.
    pub fn build(self, threshold: Option<f64>) -> Box<dyn StoppingCriterion> {
        match (self, threshold) {
            (_, None) => Box::new(NeverStop),
            (StoppingCriterionType::ErrorDecrease, Some(t)) => Box::new(ErrorDecrease::new(t)),
            (StoppingCriterionType::StepNorm, Some(t)) => Box::new(StepNorm { threshold: t }),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;

    fn state(cost_before: f64, cost_after: f64, step_norm: f64) -> IterationState {
        IterationState {
            iteration: 0,
            cost_before,
            cost_after,
            step_norm,
        }
    }

    #[test]
    fn error_decrease() {
        let mut c = ErrorDecrease::new(1e-6);
        assert!(!c.should_stop(&state(1.0, 0.5, 1.0)));
        assert!(c.should_stop(&state(1.0, 1.0 - 1e-9, 1.0)));
        // increase
        assert!(c.should_stop(&state(1.0, 1.5, 1.0)));
        // zero cost
        assert!(c.should_stop(&state(0.0, 0.0, 0.0)));
        // large cost, small relative decrease
        assert!(c.should_stop(&state(1e9, 1e9 - 1.0, 1.0)));
    }
    #[test]
    fn step_norm() {
        let mut c = StepNorm { threshold: 1e-8 };
        assert!(!c.should_stop(&state(1.0, 0.5, 1e-3)));
        assert!(c.should_stop(&state(1.0, 0.5, 1e-9)));
    }
    #[test]
    fn build() {
        let s = state(1.0, 1.0, 0.0);
        assert!(!StoppingCriterionType::ErrorDecrease.build(None).should_stop(&s));
        assert!(!StoppingCriterionType::StepNorm.build(None).should_stop(&s));
        assert!(StoppingCriterionType::ErrorDecrease.build(Some(1e-6)).should_stop(&s));
        assert!(StoppingCriterionType::StepNorm.build(Some(1e-6)).should_stop(&s));
    }
    #[test]
    fn closure() {
        let mut calls = 0;
        let mut c = |s: &IterationState| {
            calls += 1;
            s.iteration >= 2
        };
        let mut st = state(1.0, 0.5, 1.0);
        assert!(!c.should_stop(&st));
        st.iteration = 2;
        assert!(c.should_stop(&st));
        assert_eq!(calls, 2);
    }
}
