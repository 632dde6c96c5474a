pub mod capture;
pub mod config;
pub mod frame;
pub mod fusion;
pub mod heuristic;
pub mod hsv;
pub mod image_input;
pub mod model;
pub mod pipeline;
pub mod roi;
pub mod segmentation;
pub mod species;
pub mod stats;
pub mod verdict;
pub mod watch;
