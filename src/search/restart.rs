//! Restart thresholds.

use super::config::RestartPolicy;

/// Tracks when the next restart is due.
#[derive(Debug, Clone)]
pub(crate) struct RestartSchedule {
    policy: RestartPolicy,
    restarts: u64,
    limit: Option<u64>,
}

impl RestartSchedule {
    pub(crate) fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            restarts: 0,
            limit: node_limit(policy, 0),
        }
    }

    /// Whether `nodes` opened since the last restart reach the threshold.
    pub(crate) fn is_due(&self, nodes: u64) -> bool {
        self.limit.is_some_and(|limit| nodes >= limit)
    }

    pub(crate) fn on_solution(&self) -> bool {
        self.policy == RestartPolicy::OnSolution
    }

    /// Whether the policy restarts at all.
    pub(crate) fn is_enabled(&self) -> bool {
        self.policy != RestartPolicy::Never
    }

    /// Records a restart and computes the next threshold.
    pub(crate) fn advance(&mut self) -> u64 {
        self.restarts += 1;
        self.limit = node_limit(self.policy, self.restarts);
        self.restarts
    }
}

fn node_limit(policy: RestartPolicy, restarts: u64) -> Option<u64> {
    match policy {
        RestartPolicy::Never | RestartPolicy::OnSolution => None,
        RestartPolicy::Luby { scale } => Some(scale.saturating_mul(luby(restarts + 1))),
        RestartPolicy::Geometric { scale, factor } => {
            let exponent = i32::try_from(restarts).unwrap_or(i32::MAX);
            let limit = (scale as f64 * factor.powi(exponent)).ceil();
            Some(if limit >= u64::MAX as f64 { u64::MAX } else { limit as u64 })
        }
    }
}

/// `i`-th term (from 1) of the Luby sequence 1, 1, 2, 1, 1, 2, 4, ...
pub(crate) fn luby(mut i: u64) -> u64 {
    debug_assert!(i >= 1);
    loop {
        let mut k = 1u32;
        while (1u64 << k) - 1 < i {
            k += 1;
        }
        if (1u64 << k) - 1 == i {
            return 1u64 << (k - 1);
        }
        i -= (1u64 << (k - 1)) - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luby_sequence() {
        let terms: Vec<u64> = (1..=15).map(luby).collect();
        assert_eq!(terms, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }

    #[test]
    fn test_luby_schedule() {
        let mut schedule = RestartSchedule::new(RestartPolicy::Luby { scale: 10 });
        assert!(!schedule.is_due(9));
        assert!(schedule.is_due(10));
        schedule.advance();
        assert!(schedule.is_due(10));
        schedule.advance();
        assert!(!schedule.is_due(19));
        assert!(schedule.is_due(20));
    }

    #[test]
    fn test_geometric_schedule() {
        let mut schedule = RestartSchedule::new(RestartPolicy::Geometric {
            scale: 10,
            factor: 1.5,
        });
        assert!(schedule.is_due(10));
        schedule.advance();
        assert!(!schedule.is_due(14));
        assert!(schedule.is_due(15));
        schedule.advance();
        assert!(schedule.is_due(23));
        assert!(!schedule.is_due(22));
    }

    #[test]
    fn test_never_and_on_solution_have_no_threshold() {
        for policy in [RestartPolicy::Never, RestartPolicy::OnSolution] {
            let schedule = RestartSchedule::new(policy);
            assert!(!schedule.is_due(u64::MAX));
        }
        assert!(RestartSchedule::new(RestartPolicy::OnSolution).on_solution());
        assert!(!RestartSchedule::new(RestartPolicy::Never).is_enabled());
    }
}
