pub mod data;
pub mod parser;

pub use data::{Chip, ChipStatus, Modem, ModemStatus};

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use serialport::SerialPort;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The port could not be opened, even after the single retry granted to
    /// transient failures.
    #[error("port unavailable: {0}")]
    PortUnavailable(#[from] serialport::Error),
    /// The port opened but nothing on the other end acknowledged the `AT`
    /// liveness probe.
    #[error("modem did not respond to AT probe")]
    Unresponsive,
}

/// One AT command session over a serial-attached GSM modem.
///
/// The transport is generic so the protocol layer can run against a scripted
/// port in tests; production sessions hold a `Box<dyn SerialPort>`. The
/// session owns the port and releases it when dropped, on every exit path.
pub struct GsmModem<P> {
    port: P,
    settle_delay: Duration,
}

impl GsmModem<Box<dyn SerialPort>> {
    /// Opens the named port, retrying once when the failure looks like a
    /// race between enumeration and open (USB replug jitter).
    pub fn open(port_name: &str, config: &Config) -> Result<Self, SessionError> {
        let port = open_with_retry(
            || {
                serialport::new(port_name, config.baud_rate)
                    .timeout(config.serial_timeout)
                    .open()
            },
            config.open_retry_delay,
        )?;
        thread::sleep(config.settle_delay);
        Ok(Self::new(port, config.settle_delay))
    }
}

impl<P: Read + Write> GsmModem<P> {
    pub fn new(port: P, settle_delay: Duration) -> Self {
        Self { port, settle_delay }
    }

    /// Sends the bare `AT` liveness command. Anything but an `OK`
    /// acknowledgement means this port is not a responsive modem and must
    /// not be interrogated further.
    pub fn probe(&mut self) -> Result<(), SessionError> {
        match self.exchange("AT") {
            Ok(response) if response.contains("OK") => Ok(()),
            Ok(_) | Err(_) => Err(SessionError::Unresponsive),
        }
    }

    /// Runs the fixed interrogation sequence and assembles the record.
    ///
    /// Exchanges are independent: a failed or empty response leaves its
    /// field absent without aborting the rest. `AT+ICCID` is only issued
    /// when the primary `AT+CCID` yielded nothing.
    pub fn interrogate(&mut self, port_name: &str) -> Modem {
        let imei = parser::extract_imei(&self.command("AT+GSN"));
        let operator = parser::extract_operator(&self.command("AT+COPS?"));
        let signal_strength = parser::extract_signal_quality(&self.command("AT+CSQ"));
        let phone_number = parser::extract_phone_number(&self.command("AT+CNUM"));
        let iccid = parser::extract_iccid(&self.command("AT+CCID"))
            .or_else(|| parser::extract_iccid(&self.command("AT+ICCID")));

        let chips = Chip::from_fields(phone_number, iccid, operator.clone())
            .into_iter()
            .collect();

        Modem {
            port_name: port_name.to_string(),
            imei,
            operator,
            signal_strength,
            status: ModemStatus::Online,
            chips,
        }
    }

    fn command(&mut self, command: &str) -> String {
        match self.exchange(command) {
            Ok(response) => response,
            Err(err) => {
                warn!(command, error = %err, "AT exchange failed");
                String::new()
            }
        }
    }

    /// One request/response exchange: write the command, give the modem a
    /// settle interval, then drain whatever it buffered. Every read is
    /// bounded by the port timeout, so no exchange blocks indefinitely.
    fn exchange(&mut self, command: &str) -> io::Result<String> {
        debug!(command, "sending AT command");
        self.port.write_all(format!("{command}\r\n").as_bytes())?;
        thread::sleep(self.settle_delay);

        let mut response = String::new();
        let mut buf = [0u8; 1024];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    response.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if response.contains("OK") || response.contains("ERROR") {
                        break;
                    }
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        debug!(command, response = response.trim(), "AT command response");
        Ok(response.trim().to_string())
    }
}

/// Interrogates one port end to end: open (with the retry policy), probe,
/// then read every field. The caller decides what a skipped port means; the
/// port handle itself is released when the session drops, whichever way the
/// call exits.
pub fn collect(port_name: &str, config: &Config) -> Result<Modem, SessionError> {
    debug!(port_name, "starting modem session");
    let mut session = GsmModem::open(port_name, config)?;
    session.probe()?;
    Ok(session.interrogate(port_name))
}

fn open_with_retry<T>(
    mut open: impl FnMut() -> serialport::Result<T>,
    retry_delay: Duration,
) -> Result<T, SessionError> {
    match open() {
        Ok(port) => Ok(port),
        Err(err) if is_transient_open_error(&err) => {
            debug!(error = %err, "transient open failure, retrying once");
            thread::sleep(retry_delay);
            open().map_err(SessionError::from)
        }
        Err(err) => Err(err.into()),
    }
}

/// A busy or not-yet-reattached device can win a retry; anything else is a
/// hard open failure.
fn is_transient_open_error(err: &serialport::Error) -> bool {
    match err.kind() {
        serialport::ErrorKind::NoDevice => true,
        serialport::ErrorKind::Io(kind) => matches!(
            kind,
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory transport that answers each written command with the next
    /// canned response, then times out like an idle serial port.
    struct ScriptedPort {
        responses: VecDeque<Vec<u8>>,
        pending: Option<io::Cursor<Vec<u8>>>,
        writes: Vec<String>,
    }

    impl ScriptedPort {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: responses
                    .iter()
                    .map(|r| r.as_bytes().to_vec())
                    .collect(),
                pending: None,
                writes: Vec::new(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(cursor) = &mut self.pending {
                let n = cursor.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.pending = None;
            }
            Err(io::Error::from(io::ErrorKind::TimedOut))
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(String::from_utf8_lossy(buf).into_owned());
            self.pending = self.responses.pop_front().map(io::Cursor::new);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session(responses: &[&str]) -> GsmModem<ScriptedPort> {
        GsmModem::new(ScriptedPort::new(responses), Duration::ZERO)
    }

    #[test]
    fn test_round_trip_against_canned_responses() {
        let mut modem = session(&[
            "AT\r\nOK\r\n",
            "+GSN: 359876543210987",
            "+COPS: 0,0,\"VIVO\",7\r\n\r\nOK",
            "+CSQ: 23,99",
            "+CNUM: \"\",\"+5511999998888\",145",
            "+CCID: 89550534000115717668\r\n\r\nOK",
        ]);

        modem.probe().unwrap();
        let record = modem.interrogate("/dev/ttyUSB0");

        assert_eq!(record.port_name, "/dev/ttyUSB0");
        assert_eq!(record.imei.as_deref(), Some("359876543210987"));
        assert_eq!(record.operator.as_deref(), Some("VIVO"));
        assert_eq!(record.signal_strength, Some(23));
        assert_eq!(record.status, ModemStatus::Online);

        assert_eq!(record.chips.len(), 1);
        let chip = &record.chips[0];
        assert_eq!(chip.phone_number, "+5511999998888");
        assert_eq!(chip.iccid.as_deref(), Some("89550534000115717668"));
        assert_eq!(chip.status, ChipStatus::Active);

        // CCID answered, so the fallback command is never issued.
        assert_eq!(
            modem.port.writes,
            vec![
                "AT\r\n",
                "AT+GSN\r\n",
                "AT+COPS?\r\n",
                "AT+CSQ\r\n",
                "AT+CNUM\r\n",
                "AT+CCID\r\n",
            ]
        );
    }

    #[test]
    fn test_probe_rejects_port_without_acknowledgement() {
        let mut modem = session(&["garbage with no ack"]);
        assert!(matches!(modem.probe(), Err(SessionError::Unresponsive)));
    }

    #[test]
    fn test_probe_rejects_silent_port() {
        let mut modem = session(&[]);
        assert!(matches!(modem.probe(), Err(SessionError::Unresponsive)));
    }

    #[test]
    fn test_iccid_fallback_command_builds_placeholder_chip() {
        let mut modem = session(&[
            "OK",
            "OK",
            "OK",
            "+CNUM: \"\"\r\nOK",
            "OK",
            "+ICCID: 8955053400011571766\r\nOK",
        ]);

        let record = modem.interrogate("/dev/ttyUSB1");

        assert_eq!(record.chips.len(), 1);
        let chip = &record.chips[0];
        assert_eq!(chip.phone_number, "89550534000");
        assert_eq!(chip.iccid.as_deref(), Some("8955053400011571766"));
        assert!(modem.port.writes.contains(&"AT+ICCID\r\n".to_string()));
    }

    #[test]
    fn test_bare_modem_still_yields_a_record() {
        let mut modem = session(&["OK", "OK", "OK", "OK", "OK", "OK"]);

        let record = modem.interrogate("/dev/ttyUSB2");

        assert_eq!(record.imei, None);
        assert_eq!(record.operator, None);
        assert_eq!(record.signal_strength, None);
        assert!(record.chips.is_empty());
        assert_eq!(record.status, ModemStatus::Online);
    }

    #[test]
    fn test_open_retries_once_after_transient_failure() {
        let mut attempts = 0;
        let result = open_with_retry(
            || {
                attempts += 1;
                if attempts == 1 {
                    Err(serialport::Error::new(
                        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
                        "access denied",
                    ))
                } else {
                    Ok(())
                }
            },
            Duration::ZERO,
        );

        assert!(result.is_ok());
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_open_gives_up_after_second_transient_failure() {
        let mut attempts = 0;
        let result: Result<(), _> = open_with_retry(
            || {
                attempts += 1;
                Err(serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "device gone",
                ))
            },
            Duration::ZERO,
        );

        assert!(matches!(result, Err(SessionError::PortUnavailable(_))));
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_open_does_not_retry_hard_failures() {
        let mut attempts = 0;
        let result: Result<(), _> = open_with_retry(
            || {
                attempts += 1;
                Err(serialport::Error::new(
                    serialport::ErrorKind::InvalidInput,
                    "bad settings",
                ))
            },
            Duration::ZERO,
        );

        assert!(matches!(result, Err(SessionError::PortUnavailable(_))));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_transient_classification() {
        let no_device =
            serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(is_transient_open_error(&no_device));

        let busy = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "busy",
        );
        assert!(is_transient_open_error(&busy));

        let invalid =
            serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad");
        assert!(!is_transient_open_error(&invalid));
    }
}
