pub mod grid_world;
pub mod simple_golf;
