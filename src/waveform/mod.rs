//! Spectrum analysis and the bar strip drawn over the output video.

pub(crate) mod bars;
pub(crate) mod raster;
pub(crate) mod spectrum;
