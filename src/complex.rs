#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

/// One I/Q pair out of the DSP debug ring buffer
pub type IqSample = Complex<i16>;

impl IqSample {
    /// Number of bytes a single pair occupies on the wire
    pub const BYTES: usize = 4;

    /// Decode a little-endian `[I_lo I_hi Q_lo Q_hi]` word
    pub fn from_le_bytes(word: [u8; 4]) -> Self {
        Self {
            re: i16::from_le_bytes([word[0], word[1]]),
            im: i16::from_le_bytes([word[2], word[3]]),
        }
    }
}
