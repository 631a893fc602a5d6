//! amf-codec: AMF0/AMF3 serialization library
//!
//! A bidirectional codec for the Action Message Format used by Flash-era
//! RPC and messaging protocols. Both encodings are driven by one pair of
//! engines sharing a unified value model:
//!
//! - [`Decoder`] turns a byte buffer into an [`AmfValue`] graph, following
//!   back-references so repeated values come back as shared handles.
//! - [`Encoder`] does the inverse, emitting back-references for values it
//!   has already written within the same top-level operation.
//! - [`Packet`] is the envelope grouping headers and bodies the way
//!   remoting gateways exchange them; packet version 3 switches nested
//!   values to AMF3 via the AVM+ escape tag.
//!
//! The codec is synchronous and operates purely on in-memory buffers;
//! transport, framing, and authentication live elsewhere.
//!
//! # Example
//!
//! ```
//! use amf_codec::{decode, encode, AmfValue, Object};
//!
//! let value: AmfValue = Object::typed("com.example.User")
//!     .with_field("id", 42.0)
//!     .with_field("name", "Ada")
//!     .into();
//!
//! let bytes = encode(&value)?;
//! assert_eq!(decode(bytes)?, value);
//! # Ok::<(), amf_codec::AmfError>(())
//! ```

pub mod buffer;
pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod messages;
pub mod packet;
mod references;
pub mod resolver;
pub mod settings;
pub mod traits;
pub mod value;

// Re-export main types for convenience
pub use buffer::{ByteReader, ByteWriter};
pub use decoder::{decode, decode_amf3, Decoder};
pub use encoder::{encode, encode_amf3, Encoder};
pub use error::{AmfError, Result};
pub use packet::{Body, Header, Packet};
pub use resolver::{DefaultResolver, Resolution, TypeResolver};
pub use settings::{DateVariant, Settings, XmlVariant};
pub use traits::TraitInfo;
pub use value::{AmfValue, Array, ByteArray, Date, Object, Vector, VectorData, Xml};
