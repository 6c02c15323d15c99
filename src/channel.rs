//! Frequency labels for the DSP debug channel select.
//!
//! The DSP core exposes one of 2048 channels of its filter bank on the debug
//! stream. The lower half of the addresses are positive frequencies, the
//! upper half count down from the top as negative frequencies.

use std::fmt;

use crate::error::ConfigError;

/// Number of channels in the filter bank
pub const NUM_CHANNELS: u16 = 2048;
/// Span covered by the filter bank in MHz
pub const SPAN_MHZ: f64 = 5e3;

/// A checked channel address in `0..2048`
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct ChannelAddress(u16);

impl ChannelAddress {
    pub fn new(addr: u16) -> Result<Self, ConfigError> {
        if addr >= NUM_CHANNELS {
            return Err(ConfigError::InvalidChannel(addr));
        }
        Ok(Self(addr))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for ChannelAddress {
    type Error = ConfigError;

    fn try_from(addr: u16) -> Result<Self, Self::Error> {
        Self::new(addr)
    }
}

/// Frequency in MHz of a point `offset` channels away from the centre of `addr`
pub fn freq_mhz(addr: ChannelAddress, offset: f64) -> f64 {
    let step = SPAN_MHZ / NUM_CHANNELS as f64;
    let addr = addr.get();
    if addr < NUM_CHANNELS / 2 {
        (addr as f64 + offset) * step
    } else {
        ((NUM_CHANNELS - 1 - addr) as f64 - offset) * -step
    }
}

/// e.g. `FreqMean = 2.4 MHz`
pub fn frequency_label(name: &str, addr: ChannelAddress, offset: f64) -> String {
    format!("{name} = {:.1} MHz", freq_mhz(addr, offset))
}

/// Edges and centre of a channel, as shown next to the channel select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLabels {
    pub min: String,
    pub mean: String,
    pub max: String,
}

impl ChannelLabels {
    pub fn new(addr: ChannelAddress) -> Self {
        Self {
            min: frequency_label("FreqMin", addr, -1.0),
            mean: frequency_label("FreqMean", addr, 0.0),
            max: frequency_label("FreqMax", addr, 1.0),
        }
    }
}

impl fmt::Display for ChannelLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.min, self.mean, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(addr: u16) -> ChannelAddress {
        ChannelAddress::new(addr).unwrap()
    }

    #[test]
    fn test_address_range() {
        assert!(ChannelAddress::new(2047).is_ok());
        assert_eq!(
            Err(ConfigError::InvalidChannel(2048)),
            ChannelAddress::try_from(2048u16)
        );
    }

    #[test]
    fn test_freq_mhz() {
        let step = 5e3 / 2048.0;
        assert_eq!(0.0, freq_mhz(ch(0), 0.0));
        assert_eq!(-step, freq_mhz(ch(0), -1.0));
        assert_eq!(10.0 * step, freq_mhz(ch(10), 0.0));
        // The top address wraps back around to DC
        assert_eq!(0.0, freq_mhz(ch(2047), 0.0));
        assert_eq!(-step, freq_mhz(ch(2047), -1.0));
        assert_eq!(step, freq_mhz(ch(2047), 1.0));
        assert_eq!(-1023.0 * step, freq_mhz(ch(1024), 0.0));
    }

    #[test]
    fn test_labels() {
        let labels = ChannelLabels::new(ch(1));
        assert_eq!("FreqMin = 0.0 MHz", labels.min);
        assert_eq!("FreqMean = 2.4 MHz", labels.mean);
        assert_eq!("FreqMax = 4.9 MHz", labels.max);
        assert_eq!(
            "FreqMin = 0.0 MHz, FreqMean = 2.4 MHz, FreqMax = 4.9 MHz",
            labels.to_string()
        );
    }
}
