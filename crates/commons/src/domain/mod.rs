pub mod descriptor;
pub mod message;
pub mod params;
pub mod permit;
pub mod traits;

pub use descriptor::{Endpoint, RequestDescriptor, RestMethod};
pub use message::{Close, Confirmation, InboundMessage, Ping, RawFrame, WsRequest};
pub use params::{
    Escaper, NoEscaper, ParamError, ParamValue, RestParams, RestParamsBuilder, UrlEscaper,
};
pub use permit::PermitRequest;
pub use traits::{RestRequest, RestResponse, RestTransport, TransportError};
