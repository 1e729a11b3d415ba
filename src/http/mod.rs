pub mod authcache;
pub mod codec;
pub mod followup;
pub mod headers;
pub mod request;
pub mod requestbody;
pub mod response;
pub mod retry;
pub mod url;

// Re-exports for convenience
pub use authcache::{AuthCache, AuthEntry, Authenticator};
pub use codec::HttpCodec;
pub use headers::Headers;
pub use request::{Request, RequestBuilder};
pub use requestbody::{FormBody, RequestBody};
pub use response::Response;
pub use retry::RetryConfig;
pub use url::HttpUrl;
