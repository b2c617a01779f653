pub mod overlay_app;
pub mod selection;
