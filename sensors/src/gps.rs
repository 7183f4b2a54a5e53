use std::io;
use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;

use nmea::sentences::GgaData;
use nmea::ParseResult;
use regex::Regex;
use serialport::SerialPort;

use crate::coordinates::GeoCoord;

/// # Explanation
/// One read from the receiver. `Fix` and `NoFix` both come from a GGA sentence, `Other` is
/// everything else (a different sentence, an unparsable GGA sentence or a read timeout).
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GpsReading {
    Fix(GeoCoord),
    NoFix,
    Other,
}

impl GpsReading {
    /// # Explanation
    /// Classifies a single line read from the receiver.
    pub fn from_line(line: &str) -> GpsReading {
        match extract_gga_sentence(line).and_then(|gga| parse_to_gga(&gga)) {
            Some(gga) => GeoCoord::from_gga(gga)
                .map(GpsReading::Fix)
                .unwrap_or(GpsReading::NoFix),
            None => GpsReading::Other,
        }
    }

    pub fn is_sample(&self) -> bool {
        !matches!(self, GpsReading::Other)
    }
}

/// # Explanation
/// This is a line based interface to a gps receiver that is connected via a serial port (e.g. the
/// uart of the raspberry pi). Every call to next blocks until a line was read or the read timeout
/// elapsed. If the port fails it is closed and reopened on one of the next calls.
pub struct GpsReceiver {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
    reader: Option<BufReader<Box<dyn SerialPort>>>,
    line: String,
}

impl GpsReceiver {
    pub fn new(
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, serialport::Error> {
        let port = Self::open(path, baud_rate, read_timeout)?;

        Ok(GpsReceiver {
            path: path.to_string(),
            baud_rate,
            read_timeout,
            reader: Some(BufReader::new(port)),
            line: String::new(),
        })
    }

    fn open(
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialPort>, serialport::Error> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .open()?;
        log::info!("Opened gps receiver on {} ({} baud)", path, baud_rate);
        Ok(port)
    }

    fn reopen(&mut self) -> Option<&mut BufReader<Box<dyn SerialPort>>> {
        if self.reader.is_none() {
            match Self::open(&self.path, self.baud_rate, self.read_timeout) {
                Ok(port) => self.reader = Some(BufReader::new(port)),
                Err(e) => {
                    log::error!("Cannot reopen the gps receiver {}: {}", self.path, e);
                    std::thread::sleep(self.read_timeout);
                }
            }
        }
        self.reader.as_mut()
    }

    /// # Explanation
    /// Reads the next line. A timeout is not an error, it simply yields an empty line so that the
    /// caller can run its watchdog checks.
    fn read_line(&mut self) -> io::Result<&str> {
        let mut line = std::mem::take(&mut self.line);
        let result = match self.reopen() {
            Some(reader) => read_gps_line(reader, &mut line),
            None => {
                line.clear();
                Ok(())
            }
        };
        self.line = line;
        result.map(|()| self.line.as_str())
    }
}

/// # Explanation
/// Reads one line of the receiver into `line`. A read timeout and non utf-8 data leave the line
/// empty, every other error is passed on.
pub fn read_gps_line<R: BufRead>(reader: &mut R, line: &mut String) -> io::Result<()> {
    line.clear();
    match reader.read_line(line) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::TimedOut => {
            line.clear();
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            log::debug!("Dropping non utf-8 data from the gps receiver");
            line.clear();
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// # Explanation
/// Iterator over the readings of the receiver. It never ends: a failing port yields `Other`
/// readings until it could be reopened.
impl Iterator for GpsReceiver {
    type Item = GpsReading;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_line() {
            Ok(line) => {
                log::trace!("GPS data: {:?}", line);
                Some(GpsReading::from_line(line))
            }
            Err(e) => {
                log::error!("Reading from the gps receiver failed: {}", e);
                self.reader = None;
                Some(GpsReading::Other)
            }
        }
    }
}

/// # Explanation
/// This function returns the nmea GGA sentence that is in the given string (if present).
pub fn extract_gga_sentence(s: &str) -> Option<String> {
    let re = Regex::new(r"\$.{0,2}GGA.{0,200}").ok()?;
    re.find(s)
        .map(|gga_match| gga_match.as_str().trim_end().to_string())
}

/// # Explanation
/// Parses the given string to GgaData. Keep in mind, that the given string must begin and end with
/// the GGA sentence (the sentence can not be in the middle).
pub fn parse_to_gga(s: &str) -> Option<GgaData> {
    match nmea::parse_str(s) {
        Ok(ParseResult::GGA(gga_sentence)) => Some(gga_sentence),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Could not parse {:?}: {:?}", s, e);
            None
        }
    }
}
