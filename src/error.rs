use thiserror::Error;

/// Numerical failure inside a single filter update.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("{filter}: innovation covariance is singular (state = {state:?}, covariance = {covariance:?})")]
    SingularInnovation {
        filter: &'static str,
        state: Vec<f64>,
        covariance: Vec<f64>,
    },
    #[error("{filter}: innovation covariance is not finite (state = {state:?}, covariance = {covariance:?})")]
    NonFiniteInnovation {
        filter: &'static str,
        state: Vec<f64>,
        covariance: Vec<f64>,
    },
}

#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("input series is empty")]
    EmptySeries,
    #[error("input series too short: expected at least {required} samples, got {got}")]
    SeriesTooShort { required: usize, got: usize },
    #[error("time must be strictly increasing (violated at sample {index})")]
    NonMonotonicTime { index: usize },
    #[error("initial friction is undefined: the series has no deceleration samples and no fallback friction is configured")]
    UndefinedInitialFriction,
    #[error("filter failure at step {step}: {source}")]
    Filter {
        step: usize,
        #[source]
        source: FilterError,
    },
}
