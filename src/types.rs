use serde::{Deserialize, Serialize};

pub type ChannelId = u64;
pub type HandId = u64;
pub type Chips = u64;
pub type Seq = u32;

pub type SignatureBytes = Vec<u8>;
pub type PublicKeyBytes = Vec<u8>;

/// One of the two channel participants. `A` opens the channel and posts the
/// small blind; `B` joins and posts the big blind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    A,
    B,
}

impl Party {
    pub fn other(self) -> Party {
        match self {
            Party::A => Party::B,
            Party::B => Party::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Party::A => 0,
            Party::B => 1,
        }
    }

    pub fn as_byte(self) -> u8 {
        self.index() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateHash([u8; 32]);

impl StateHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::zero()
    }
}

impl AsRef<[u8; 32]> for StateHash {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for StateHash {
    fn from(bytes: [u8; 32]) -> Self {
        StateHash::new(bytes)
    }
}

impl From<StateHash> for [u8; 32] {
    fn from(hash: StateHash) -> Self {
        hash.0
    }
}

impl std::fmt::Display for StateHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
