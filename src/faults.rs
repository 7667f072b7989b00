//! Directional loss simulation for the datagram transport.
//!
//! The protocol is exercised against an unreliable network by gating each
//! send and receive on an independent success probability. A gate at 1.0
//! never drops; at 0.0 it drops everything.

/// Per-direction success probabilities for one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct LossGate {
    send_probability: f64,
    recv_probability: f64,
}

impl LossGate {
    /// Creates a gate with the given success probabilities, clamped to [0, 1].
    pub fn new(send_probability: f64, recv_probability: f64) -> Self {
        Self {
            send_probability: send_probability.clamp(0.0, 1.0),
            recv_probability: recv_probability.clamp(0.0, 1.0),
        }
    }

    /// A gate that never drops anything.
    pub fn lossless() -> Self {
        Self::new(1.0, 1.0)
    }

    /// Rolls the outbound gate: true means the datagram goes out.
    pub fn pass_send(&self) -> bool {
        self.send_probability >= 1.0 || rand::random::<f64>() < self.send_probability
    }

    /// Rolls the inbound gate: true means the datagram is processed.
    pub fn pass_recv(&self) -> bool {
        self.recv_probability >= 1.0 || rand::random::<f64>() < self.recv_probability
    }
}

impl Default for LossGate {
    fn default() -> Self {
        Self::lossless()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossless_always_passes() {
        let gate = LossGate::lossless();
        for _ in 0..1000 {
            assert!(gate.pass_send());
            assert!(gate.pass_recv());
        }
    }

    #[test]
    fn test_zero_probability_never_passes() {
        let gate = LossGate::new(0.0, 0.0);
        for _ in 0..1000 {
            assert!(!gate.pass_send());
            assert!(!gate.pass_recv());
        }
    }

    #[test]
    fn test_directions_independent() {
        let gate = LossGate::new(1.0, 0.0);
        assert!(gate.pass_send());
        assert!(!gate.pass_recv());
    }

    #[test]
    fn test_probabilities_clamped() {
        let gate = LossGate::new(7.0, -3.0);
        assert!(gate.pass_send());
        assert!(!gate.pass_recv());
    }

    #[test]
    fn test_half_probability_drops_some() {
        let gate = LossGate::new(0.5, 0.5);
        let passed = (0..10_000).filter(|_| gate.pass_send()).count();
        // Loose bounds; this is a sanity check, not a statistics exam.
        assert!(passed > 4_000 && passed < 6_000, "passed {passed} of 10000");
    }
}
