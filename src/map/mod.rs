pub mod geo;
pub mod map;
pub mod scene;
pub mod viewport;
