//! Request middleware.

pub mod identity;
pub mod request_id;

pub use identity::identity_middleware;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
