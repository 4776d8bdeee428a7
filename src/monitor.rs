// Serial monitor: relay the rover's diagnostic lines to the log

use std::io::{self, BufRead, BufReader};
use std::time::Duration;
use tracing::info;

/// Error types for the serial monitor
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Read newline-terminated lines from `reader` until EOF
///
/// Read timeouts are retried and keep any partial line. Lines are decoded
/// lossily, trimmed, and empty ones skipped. Returns the number of lines
/// handed to `on_line`.
pub fn relay_lines<R, F>(mut reader: R, mut on_line: F) -> io::Result<usize>
where
    R: BufRead,
    F: FnMut(&str),
{
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) if buf.last() != Some(&b'\n') => break, // EOF mid-line
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if !line.is_empty() {
            on_line(line);
            count += 1;
        }
        buf.clear();
    }

    // Trailing text without a newline
    let line = String::from_utf8_lossy(&buf);
    let line = line.trim();
    if !line.is_empty() {
        on_line(line);
        count += 1;
    }
    Ok(count)
}

/// Open `port` and log everything the rover prints until the port closes
pub fn run(port: &str, baudrate: u32, timeout: Duration) -> Result<(), MonitorError> {
    info!("Opening serial port {} at {} baud", port, baudrate);
    let serial = serialport::new(port, baudrate).timeout(timeout).open()?;

    let lines = relay_lines(BufReader::new(serial), |line| info!("ESP32 says: {}", line))?;
    info!("Serial port closed after {} lines", lines);
    Ok(())
}
