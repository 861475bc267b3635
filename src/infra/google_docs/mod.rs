// =============================================================================
// GOOGLE DOCS TRANSPORT
// =============================================================================
//
// The `HttpTransport` the Docs client uses in production. Lives in the infra
// layer because it performs the actual network I/O; the core only describes
// requests and reads back status and body.

pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;
