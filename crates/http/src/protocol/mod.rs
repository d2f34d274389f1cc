//! Protocol level types shared by the codec, the connection engine and handlers.
//!
//! - **Messages** ([`Message`], [`PayloadItem`], [`PayloadSize`]): a head or a piece of payload,
//!   and how a payload is framed
//! - **Request** ([`Request`], [`QueryParams`], [`ConnectionDirective`]): a fully parsed request,
//!   body included
//! - **Response** ([`Response`], [`ResponseBody`]): what a handler fills in
//! - **Context** ([`HttpContext`], [`RequestContext`], [`PathParams`]): the reusable per-request
//!   state passed through the pipeline
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`], [`HandlerError`])

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::ConnectionDirective;
pub use request::QueryParams;
pub use request::Request;

mod response;
pub use response::Response;

mod body;
pub use body::ResponseBody;

mod context;
pub use context::HttpContext;
pub use context::PathParams;
pub use context::RequestContext;

mod error;
pub use error::HandlerError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
