//! ActionMessage packet envelope
//!
//! The envelope groups one version, a list of headers, and a list of
//! bodies into a single packet:
//!
//! ```text
//! version(2) | header_count(2) | header* | body_count(2) | body*
//!
//! header: name(utf) | must_understand(1) | byte_length(4) | data
//! body:   target_uri(utf) | response_uri(utf) | byte_length(4) | data
//! ```
//!
//! `byte_length` is the length of the nested value encoding. It is
//! produced by encoding the value into its own buffer first and splicing
//! the result in, and it is skipped (not validated) on read. Reference
//! tables are reset for every header and body, so back-references never
//! cross value boundaries. Packet version 3 and above turns on AVM+
//! encoding for the nested values.

use bytes::Bytes;

use crate::buffer::{ByteReader, ByteWriter};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{AmfError, Result};
use crate::value::AmfValue;

/// One AMF packet: a version plus ordered headers and bodies
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub version: u16,
    pub headers: Vec<Header>,
    pub bodies: Vec<Body>,
}

/// Packet header entry
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub must_understand: bool,
    pub data: AmfValue,
}

/// Packet body entry
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub target_uri: String,
    pub response_uri: String,
    pub data: AmfValue,
}

impl Packet {
    pub fn new(version: u16) -> Self {
        Self {
            version,
            headers: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Parse one packet from a buffer
    pub fn read(decoder: &mut Decoder, data: impl Into<Bytes>) -> Result<Packet> {
        let mut r = ByteReader::new(data);
        let version = r.read_u16()?;
        let header_count = r.read_u16()?;
        let mut headers = Vec::with_capacity(header_count as usize);
        for _ in 0..header_count {
            let name = r.read_utf()?;
            let must_understand = r.read_bool()?;
            // Nested byte length, informational only
            r.skip(4)?;
            let data = decoder.decode(&mut r)?;
            headers.push(Header {
                name,
                must_understand,
                data,
            });
        }
        let body_count = r.read_u16()?;
        let mut bodies = Vec::with_capacity(body_count as usize);
        for _ in 0..body_count {
            let target_uri = r.read_utf()?;
            let response_uri = r.read_utf()?;
            r.skip(4)?;
            let data = decoder.decode(&mut r)?;
            bodies.push(Body {
                target_uri,
                response_uri,
                data,
            });
        }
        Ok(Packet {
            version,
            headers,
            bodies,
        })
    }

    /// Serialize the packet
    pub fn write(&self, encoder: &mut Encoder) -> Result<Bytes> {
        if self.headers.len() > u16::MAX as usize || self.bodies.len() > u16::MAX as usize {
            return Err(AmfError::UnsupportedValueShape(
                "more than 65535 headers or bodies",
            ));
        }
        encoder.set_avm_plus(self.version >= 3);
        let mut out = ByteWriter::new();
        out.write_u16(self.version);
        out.write_u16(self.headers.len() as u16);
        for header in &self.headers {
            out.write_utf(&header.name)?;
            out.write_bool(header.must_understand);
            let data = encoder.encode(&header.data)?;
            out.write_u32(data.len() as u32);
            out.write_bytes(&data);
        }
        out.write_u16(self.bodies.len() as u16);
        for body in &self.bodies {
            out.write_utf(&body.target_uri)?;
            out.write_utf(&body.response_uri)?;
            let data = encoder.encode(&body.data)?;
            out.write_u32(data.len() as u32);
            out.write_bytes(&data);
        }
        Ok(out.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::value::Object;

    fn roundtrip(packet: &Packet) -> Packet {
        let mut encoder = Encoder::new(Settings::default());
        let bytes = packet.write(&mut encoder).unwrap();
        let mut decoder = Decoder::new(Settings::default());
        Packet::read(&mut decoder, bytes).unwrap()
    }

    fn sample_body_value() -> AmfValue {
        Object::anonymous()
            .with_field("method", "echo")
            .with_field("count", 2.0)
            .into()
    }

    #[test]
    fn test_empty_packet() {
        let packet = Packet::new(0);
        let mut encoder = Encoder::new(Settings::default());
        let bytes = packet.write(&mut encoder).unwrap();
        assert_eq!(bytes.as_ref(), &[0, 0, 0, 0, 0, 0]);
        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn test_packet_roundtrip_amf0() {
        let mut packet = Packet::new(0);
        packet.headers.push(Header {
            name: "Credentials".into(),
            must_understand: true,
            data: AmfValue::String("secret".into()),
        });
        packet.bodies.push(Body {
            target_uri: "service.echo".into(),
            response_uri: "/1".into(),
            data: sample_body_value(),
        });
        packet.bodies.push(Body {
            target_uri: "service.other".into(),
            response_uri: "/2".into(),
            data: sample_body_value(),
        });
        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn test_packet_version_3_uses_avmplus() {
        let mut packet = Packet::new(3);
        packet.bodies.push(Body {
            target_uri: "null".into(),
            response_uri: "/1".into(),
            data: sample_body_value(),
        });
        let mut encoder = Encoder::new(Settings::default());
        let bytes = packet.write(&mut encoder).unwrap();

        // The body value starts with the AVM+ escape tag
        // version(2) + count(2) + "null"(2+4) + "/1"(2+2) + length(4) + count(2)
        let value_offset = 2 + 2 + 2 + (2 + 4) + (2 + 2) + 4;
        assert_eq!(bytes[value_offset], 0x11);

        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn test_body_length_field_matches_encoding() {
        let mut packet = Packet::new(0);
        packet.bodies.push(Body {
            target_uri: "t".into(),
            response_uri: "r".into(),
            data: sample_body_value(),
        });
        let mut encoder = Encoder::new(Settings::default());
        let bytes = packet.write(&mut encoder).unwrap();

        // version(2) count(2) + "t"(3) + "r"(3) + count-of-bodies... layout:
        // [0..2 version][2..4 header count][4..6 body count]
        // body: [6..9 "t"][9..12 "r"][12..16 length][16.. data]
        let length = u32::from_be_bytes(bytes[12..16].try_into().unwrap()) as usize;
        assert_eq!(length, bytes.len() - 16);
    }

    #[test]
    fn test_reference_tables_reset_per_body() {
        // The same shared value in two bodies must encode inline both
        // times; a cross-body back-reference would be undecodable
        let shared: AmfValue = Object::anonymous().with_field("k", 1.0).into();
        let mut packet = Packet::new(0);
        for i in 0..2 {
            packet.bodies.push(Body {
                target_uri: format!("/{}", i),
                response_uri: String::new(),
                data: shared.clone(),
            });
        }
        let decoded = roundtrip(&packet);
        assert_eq!(decoded.bodies[0].data, shared);
        assert_eq!(decoded.bodies[1].data, shared);
    }
}
