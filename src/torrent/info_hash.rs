/// The 20-byte identifier both sides of a connection must agree on: the
/// sha1 of the bencoded info dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct InfoHash([u8; Self::SIZE]);

impl InfoHash {
    pub const SIZE: usize = sha1_smol::DIGEST_LENGTH;

    pub fn new(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8; InfoHash::SIZE]> for InfoHash {
    fn as_ref(&self) -> &[u8; Self::SIZE] {
        &self.0
    }
}
