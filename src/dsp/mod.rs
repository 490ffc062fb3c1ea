//! GCC-PHAT time-delay and bearing estimation

pub mod angle;
pub mod correlator;
pub mod estimator;
pub mod peak;
pub mod preprocess;

pub use angle::AngleEstimator;
pub use correlator::SpectralCorrelator;
pub use estimator::{EstimationResult, GccPhatEstimator};
pub use peak::{PeakAnalysis, PeakAnalyzer, parabolic_offset};
pub use preprocess::Preprocessor;
