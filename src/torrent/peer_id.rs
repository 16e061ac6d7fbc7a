use rand::distributions::{Alphanumeric, DistString};

/// Our 20-byte identity on the wire: an azureus-style vendor prefix
/// followed by a random alphanumeric suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct PeerId([u8; Self::SIZE]);

impl PeerId {
    pub const SIZE: usize = 20;
    pub const VENDOR_PREFIX: &'static [u8; 8] = b"-TV0001-";
    const SUFFIX_LEN: usize = Self::SIZE - Self::VENDOR_PREFIX.len();

    pub fn new(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    pub fn with_suffix(suffix: &[u8; Self::SUFFIX_LEN]) -> Self {
        let mut peer_id = [0; Self::SIZE];

        let (prefix_segment, suffix_segment) =
            peer_id.split_at_mut(Self::VENDOR_PREFIX.len());
        prefix_segment.copy_from_slice(Self::VENDOR_PREFIX);
        suffix_segment.copy_from_slice(suffix);

        Self(peer_id)
    }

    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let suffix = Alphanumeric.sample_string(&mut rng, Self::SUFFIX_LEN);

        Self::with_suffix(
            suffix
                .as_bytes()
                .try_into()
                .expect("can't fail as suffix is exactly SUFFIX_LEN long"),
        )
    }
}

impl AsRef<[u8; PeerId::SIZE]> for PeerId {
    fn as_ref(&self) -> &[u8; Self::SIZE] {
        &self.0
    }
}
