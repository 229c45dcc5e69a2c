mod decode;
mod error;

pub use decode::{DecodedEnvelope, decode_body, encode_direct, encode_push, require_fields};
pub use error::{EnvelopeError, ErrorDetails, ErrorResponse, Result};
