// Store-assigned record ids: 12 bytes rendered as 24 lowercase hex chars.
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::{Error, ErrorKind};
use crate::core::record::invalid_input;

const ID_LEN: usize = 12;
const HEX_LEN: usize = ID_LEN * 2;
const COUNTER_MASK: u32 = 0x00ff_ffff;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId([u8; ID_LEN]);

struct IdSeed {
    process: [u8; 5],
    counter: AtomicU32,
}

static SEED: OnceLock<IdSeed> = OnceLock::new();

fn seed() -> Result<&'static IdSeed, Error> {
    if let Some(seed) = SEED.get() {
        return Ok(seed);
    }
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message(format!("failed to gather randomness for record ids: {err}"))
    })?;
    let mut process = [0u8; 5];
    process.copy_from_slice(&bytes[0..5]);
    let counter = u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]);
    Ok(SEED.get_or_init(|| IdSeed {
        process,
        counter: AtomicU32::new(counter),
    }))
}

impl ObjectId {
    /// Generates a fresh id stamped with `unix_seconds`.
    pub fn generate(unix_seconds: u32) -> Result<Self, Error> {
        let seed = seed()?;
        let count = seed.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        Ok(Self::from_parts(unix_seconds, seed.process, count))
    }

    fn from_parts(unix_seconds: u32, process: [u8; 5], count: u32) -> Self {
        let mut bytes = [0u8; ID_LEN];
        bytes[0..4].copy_from_slice(&unix_seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&process);
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        Self(bytes)
    }

    pub fn parse(input: &str) -> Result<Self, Error> {
        if input.len() != HEX_LEN {
            return Err(invalid_id(input));
        }
        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(input, &mut bytes).map_err(|_| invalid_id(input))?;
        Ok(Self(bytes))
    }

    pub fn timestamp_seconds(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

fn invalid_id(input: &str) -> Error {
    invalid_input().with_hint(format!(
        "Record id {input:?} is not 24 hexadecimal characters."
    ))
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ObjectId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
