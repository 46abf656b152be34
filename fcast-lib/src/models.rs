use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    None = 0,
    Play,
    Pause,
    Resume,
    Stop,
    Seek,
    PlaybackUpdate,
    VolumeUpdate,
    SetVolume,
    PlaybackError,
    SetSpeed,
    Version,
    Ping,
    Pong,
}

/// Frame header. `size` is the length of the body only, the opcode byte is
/// accounted for when encoding.
#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    pub size: u32,
    pub opcode: Opcode,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlayMessage {
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl PlayMessage {
    pub fn new(container: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            url: Some(url.into()),
            content: None,
            time: None,
            speed: None,
            headers: None,
        }
    }
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Play,
            2 => Self::Pause,
            3 => Self::Resume,
            4 => Self::Stop,
            5 => Self::Seek,
            6 => Self::PlaybackUpdate,
            7 => Self::VolumeUpdate,
            8 => Self::SetVolume,
            9 => Self::PlaybackError,
            10 => Self::SetSpeed,
            11 => Self::Version,
            12 => Self::Ping,
            13 => Self::Pong,
            _ => Self::None,
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        value as u8
    }
}

impl Header {
    pub const SIZE: usize = 5;

    pub fn new(opcode: Opcode, size: u32) -> Self {
        Self { size, opcode }
    }

    pub fn decode(buf: [u8; Self::SIZE]) -> Result<Self> {
        let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let Some(size) = length.checked_sub(1) else {
            bail!("Frame length is zero, expected at least the opcode byte");
        };

        Ok(Self {
            size,
            opcode: Opcode::from(buf[4]),
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let length = u32::to_le_bytes(self.size + 1);
        [length[0], length[1], length[2], length[3], self.opcode.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode() {
        assert_eq!(Header::new(Opcode::Ping, 0).encode(), [1, 0, 0, 0, 12]);
        assert_eq!(Header::new(Opcode::Play, 200).encode(), [201, 0, 0, 0, 1]);
        assert_eq!(Header::new(Opcode::Play, 300).encode(), [45, 1, 0, 0, 1]);
        assert_eq!(Header::new(Opcode::None, 0).encode(), [1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_header_decode() {
        assert_eq!(
            Header::decode([201, 0, 0, 0, 1]).unwrap(),
            Header::new(Opcode::Play, 200)
        );
        assert_eq!(
            Header::decode([1, 0, 0, 0, 99]).unwrap(),
            Header::new(Opcode::None, 0)
        );
        assert!(Header::decode([0, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn play_message_omits_unset_fields() {
        let msg = PlayMessage::new("video/mp4", "http://10.0.0.5:51000/");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"container":"video/mp4","url":"http://10.0.0.5:51000/"}"#
        );
    }
}
