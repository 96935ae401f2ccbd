use prost::Message;

use super::error::Result;

/// Opaque capability token naming one submitted job.
///
/// The token is never inspected by the client, only round-tripped: the
/// server hands it out on submission and expects its serialized form back
/// on status queries and stream operations. `deserialize(serialize(t))`
/// always yields `t`.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Ticket {
    #[prost(bytes = "vec", tag = "1")]
    token: Vec<u8>,
}

impl Ticket {
    pub fn new(token: impl Into<Vec<u8>>) -> Self {
        Ticket {
            token: token.into(),
        }
    }

    /// Serialize to the wire representation used by status queries and
    /// write descriptors.
    pub fn serialize(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode a serialized ticket. Fails with a decode error if the bytes
    /// are not a valid serialized ticket.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(Ticket::decode(bytes)?)
    }
}

/// A ticket in either structured or already-serialized form.
///
/// Callers are not required to track which form they hold: both normalize
/// to the same wire representation at the API boundary, and nothing deeper
/// in the call chain branches on the representation.
pub trait TicketLike {
    fn to_wire(&self) -> Vec<u8>;
}

impl TicketLike for Ticket {
    fn to_wire(&self) -> Vec<u8> {
        self.serialize()
    }
}

impl TicketLike for &Ticket {
    fn to_wire(&self) -> Vec<u8> {
        self.serialize()
    }
}

impl TicketLike for Vec<u8> {
    fn to_wire(&self) -> Vec<u8> {
        self.clone()
    }
}

impl TicketLike for &[u8] {
    fn to_wire(&self) -> Vec<u8> {
        self.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_round_trip_identity() {
        let ticket = Ticket::new(b"gds-job;db=neo4j;id=42".to_vec());
        let wire = ticket.serialize();
        assert_eq!(Ticket::deserialize(&wire).unwrap(), ticket);
    }

    #[test]
    fn test_empty_token_round_trips() {
        let ticket = Ticket::new(Vec::new());
        assert_eq!(Ticket::deserialize(&ticket.serialize()).unwrap(), ticket);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        // Field 1 wire type mismatch: varint instead of length-delimited.
        assert!(Ticket::deserialize(&[0x08, 0x01]).is_err());
    }

    #[test]
    fn test_all_forms_normalize_to_the_same_wire_bytes() {
        let ticket = Ticket::new(b"abc".to_vec());
        let wire = ticket.serialize();

        assert_eq!(TicketLike::to_wire(&ticket), wire);
        assert_eq!(TicketLike::to_wire(&&ticket), wire);
        assert_eq!(TicketLike::to_wire(&wire.clone()), wire);
        assert_eq!(TicketLike::to_wire(&wire.as_slice()), wire);
    }
}
