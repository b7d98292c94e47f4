//! Deep-prior components: the trainable generator, its optimizer, and the
//! fixed downsampler linking full-resolution output to the fidelity target.

pub mod downsample;
pub mod layer;
pub mod network;
pub mod optimizer;

pub use downsample::LanczosDownsampler;
pub use layer::Conv2d;
pub use network::{noise_input, ConvPrior, PriorNetwork, OUTPUT_CHANNELS};
pub use optimizer::AdamOptimizer;
