//! Effects layer: everything that performs or mediates I/O.

mod bind;
mod client;
mod factory;
mod request;
mod response;
mod response_factory;
mod sequence;
mod transport;

pub use bind::{BindTarget, Binding};
pub use client::Client;
pub use factory::Factory;
pub use request::{Request, json_body};
pub use response::Response;
pub use response_factory::ResponseFactory;
pub use sequence::ResponseSequence;
pub use transport::{
    BodyStream, BoxStream, ReqwestTemplate, ReqwestTransport, Transport, TransportRequest,
    TransportResponse, TransportTemplate,
};
