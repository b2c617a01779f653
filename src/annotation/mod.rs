pub mod archive;
pub mod feature;
pub mod kml;
pub mod pipeline;
pub mod style;
