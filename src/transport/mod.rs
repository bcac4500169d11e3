mod http_transport;
mod prepared_upstream;
mod retry_policy;

pub use http_transport::{HttpTransport, UpstreamReply};
pub use prepared_upstream::PreparedUpstream;
pub use retry_policy::RetryPolicy;
