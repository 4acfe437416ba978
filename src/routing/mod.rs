pub mod dispatch;
pub mod selector;

pub use dispatch::{dispatch_request, normalize_base_path};
pub use selector::{parse_selector, validate_tier_selector, ModelSelector};
