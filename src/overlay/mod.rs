pub mod adapter;
pub mod controller;
pub mod legend;
pub mod registry;
