use serde::{Deserialize, Serialize};

/// A SIM identity observed through a modem during one interrogation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chip {
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iccid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub status: ChipStatus,
}

/// Chips are only reported when they could be read, so the only status on
/// the wire is `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipStatus {
    Active,
}

impl Chip {
    /// Assembles the chip record from whatever the interrogation produced.
    ///
    /// Without a subscriber number the first 11 ICCID digits stand in as the
    /// `phone_number`. That placeholder keeps the SIM addressable upstream
    /// but is not dialable data. With neither field there is no chip.
    pub fn from_fields(
        phone_number: Option<String>,
        iccid: Option<String>,
        operator: Option<String>,
    ) -> Option<Self> {
        match (phone_number, iccid) {
            (Some(phone_number), iccid) => Some(Self {
                phone_number,
                iccid,
                operator,
                status: ChipStatus::Active,
            }),
            (None, Some(iccid)) => Some(Self {
                phone_number: iccid.get(..11).unwrap_or(&iccid).to_string(),
                iccid: Some(iccid),
                operator,
                status: ChipStatus::Active,
            }),
            (None, None) => None,
        }
    }
}

/// One serial-attached GSM modem as observed during a single polling round.
/// Records are rebuilt from scratch every round and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modem {
    pub port_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imei: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<u8>,
    pub status: ModemStatus,
    pub chips: Vec<Chip>,
}

/// A record only exists for a port that answered the liveness probe, so the
/// only status on the wire is `online`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModemStatus {
    Online,
}
