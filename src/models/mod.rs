pub mod model;
pub mod vertex_format;
