use anyhow::{bail, Result};

use crate::models::{Header, Opcode, PlayMessage};
use crate::MAX_BODY_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Play(PlayMessage),
    /// Any command this crate does not interpret. The body, if any, is dropped.
    Other(Opcode),
}

impl From<&Packet> for Opcode {
    fn from(value: &Packet) -> Self {
        match value {
            Packet::Play(_) => Opcode::Play,
            Packet::Other(opcode) => *opcode,
        }
    }
}

impl From<PlayMessage> for Packet {
    fn from(value: PlayMessage) -> Self {
        Packet::Play(value)
    }
}

impl Packet {
    pub fn decode(header: &Header, body: &[u8]) -> Result<Self> {
        Ok(match header.opcode {
            Opcode::Play => Self::Play(serde_json::from_slice(body)?),
            opcode => Self::Other(opcode),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = match self {
            Packet::Play(play_message) => serde_json::to_vec(play_message)?,
            Packet::Other(_) => Vec::new(),
        };

        if body.len() > MAX_BODY_SIZE as usize {
            bail!(
                "Packet body is {} bytes, the maximum is {MAX_BODY_SIZE}",
                body.len()
            );
        }

        let header = Header::new(self.into(), body.len() as u32).encode();
        let mut pack = Vec::with_capacity(header.len() + body.len());
        pack.extend_from_slice(&header);
        pack.extend_from_slice(&body);
        Ok(pack)
    }
}
