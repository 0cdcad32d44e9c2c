pub mod baseline;
pub mod common;
pub mod create_matrix;
pub mod diagonal_lines;
pub mod planner;
pub mod runs;
pub mod selector;
pub mod tile_loop;
pub mod vertical_lines;
