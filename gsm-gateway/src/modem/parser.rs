//! Extractors for raw AT command responses.
//!
//! Every function is total: malformed or truncated input yields `None`,
//! never an error, so one unreadable field cannot abort an otherwise
//! successful interrogation.

use std::sync::LazyLock;

use regex::Regex;

/// First run of 15 digits in an `AT+GSN` response.
pub fn extract_imei(response: &str) -> Option<String> {
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{15}").unwrap());
    RE.find(response).map(|m| m.as_str().to_string())
}

/// First quoted string in an `AT+COPS?` response.
pub fn extract_operator(response: &str) -> Option<String> {
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""(.+?)""#).unwrap());
    RE.captures(response).map(|c| c[1].to_string())
}

/// Signal quality from an `AT+CSQ` response. The 99 sentinel ("not known
/// or not detectable") maps to `None`; anything else passes through.
pub fn extract_signal_quality(response: &str) -> Option<u8> {
    static RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\+CSQ:\s*(\d+)").unwrap());
    let csq: u8 = RE.captures(response)?[1].parse().ok()?;
    if csq == 99 { None } else { Some(csq) }
}

/// First quoted subscriber number (optional leading `+`, then digits) in an
/// `AT+CNUM` response.
pub fn extract_phone_number(response: &str) -> Option<String> {
    static RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#""(\+?\d+)""#).unwrap());
    RE.captures(response).map(|c| c[1].to_string())
}

/// First run of 19-20 digits in an `AT+CCID`/`AT+ICCID` response.
pub fn extract_iccid(response: &str) -> Option<String> {
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{19,20}").unwrap());
    RE.find(response).map(|m| m.as_str().to_string())
}
