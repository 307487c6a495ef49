// Numeric thresholds used by the evaluated machine; guarded by tests below.

/// Warn when the probabilities leaving a state through output-empty
/// transitions sum to more than this while eliminating silent paths.
pub const SUSPICIOUS_EXIT_PROBABILITY: f64 = 1.01;

/// Pivots with absolute value at or below this are treated as singular
/// during LU decomposition.
pub const SINGULAR_PIVOT_EPSILON: f64 = 1e-12;

#[test]
fn suspicious_exit_probability_allows_rounding_slack() {
    assert!(SUSPICIOUS_EXIT_PROBABILITY > 1.0);
    assert!(SUSPICIOUS_EXIT_PROBABILITY < 1.1);
}

#[test]
fn singular_pivot_epsilon_is_positive() {
    assert!(SINGULAR_PIVOT_EPSILON > 0.0);
}
