pub mod data;
pub mod moments;
pub mod noise;
pub mod scaler;
pub mod synth;
