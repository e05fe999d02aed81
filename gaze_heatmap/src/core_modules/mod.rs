pub mod colormap;
pub mod compositor;
pub mod density_map;
pub mod fixation_table;
pub mod gaussian_mask;
pub mod utils;
