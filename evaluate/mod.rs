pub mod compare;
pub mod folds;
pub mod leakage;
pub mod logistic;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod selection;
pub mod sweep;
