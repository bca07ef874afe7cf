pub mod allow_list;
pub mod fetch;
pub mod types;

pub use types::{NetworkConfig, NetworkError, FetchResult, HttpMethod};
pub use allow_list::{is_url_allowed, validate_allow_list};
pub use fetch::{create_secure_fetch_fn, secure_fetch, SecureFetchOptions};
