pub mod api;
pub mod extract;
pub mod html;
pub mod tree;

pub use api::NgaClient;
pub use extract::{extract, extract_json, extract_value, is_post_node, Extraction, PayloadFormat};
