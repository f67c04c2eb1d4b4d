use tracing::warn;

/// Lists the serial devices currently visible to the OS.
///
/// Re-queries on every call, no caching. Zero attached devices is a normal
/// answer, and an enumeration failure degrades to the same empty list so a
/// bad round only delays collection until the next one.
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(err) => {
            warn!(error = %err, "failed to enumerate serial ports");
            Vec::new()
        }
    }
}
