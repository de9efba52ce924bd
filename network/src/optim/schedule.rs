/// Learning rate that decays continuously by `decay_rate` every
/// `decay_steps` optimizer steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    pub initial_learning_rate: f64,
    pub decay_steps: usize,
    pub decay_rate: f64,
}

impl ExponentialDecay {
    pub fn learning_rate_at(&self, step: usize) -> f64 {
        let exponent = step as f64 / self.decay_steps.max(1) as f64;
        self.initial_learning_rate * self.decay_rate.powf(exponent)
    }
}
