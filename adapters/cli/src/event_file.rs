use std::{error::Error, fmt, fs, path::Path};

use anyhow::{Context, Result};
use hitglow_core::{decode_events, encode_events, CodecError, Event};

const FILE_DOMAIN: &str = "hitglow-events";
const FILE_VERSION: &str = "v1";

/// Delimiter used to separate the domain, version and event count.
const FIELD_DELIMITER: char = ':';
/// Terminates the header line; the bincode payload follows directly.
const HEADER_END: u8 = b'\n';

/// Encodes `events` as a header line followed by the bincode payload.
pub(crate) fn encode(events: &[Event]) -> Result<Vec<u8>, EventFileError> {
    let payload = encode_events(events).map_err(EventFileError::InvalidPayload)?;
    let mut bytes = format!("{FILE_DOMAIN}{FIELD_DELIMITER}{FILE_VERSION}{FIELD_DELIMITER}{}", events.len())
        .into_bytes();
    bytes.push(HEADER_END);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decodes an event file produced by [`encode`].
pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<Event>, EventFileError> {
    if bytes.is_empty() {
        return Err(EventFileError::EmptyFile);
    }

    let split = bytes
        .iter()
        .position(|&byte| byte == HEADER_END)
        .ok_or(EventFileError::MissingHeaderEnd)?;
    let header = std::str::from_utf8(&bytes[..split]).map_err(|_| EventFileError::InvalidHeader)?;
    let payload = &bytes[split + 1..];

    let mut parts = header.trim().split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(EventFileError::MissingPrefix)?;
    let version = parts.next().ok_or(EventFileError::MissingVersion)?;
    let count = parts.next().ok_or(EventFileError::MissingCount)?;

    if domain != FILE_DOMAIN {
        return Err(EventFileError::InvalidPrefix(domain.to_owned()));
    }
    if version != FILE_VERSION {
        return Err(EventFileError::UnsupportedVersion(version.to_owned()));
    }
    let expected = count
        .trim()
        .parse::<usize>()
        .map_err(|_| EventFileError::InvalidCount(count.to_owned()))?;

    let events = decode_events(payload).map_err(EventFileError::InvalidPayload)?;
    if events.len() != expected {
        return Err(EventFileError::CountMismatch {
            expected,
            found: events.len(),
        });
    }
    Ok(events)
}

/// Writes `events` to `path`.
pub(crate) fn write_events(path: &Path, events: &[Event]) -> Result<()> {
    let bytes = encode(events).context("failed to encode events")?;
    fs::write(path, bytes).with_context(|| format!("failed to write event file {}", path.display()))
}

/// Reads the events stored at `path`.
pub(crate) fn read_events(path: &Path) -> Result<Vec<Event>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read event file {}", path.display()))?;
    decode(&bytes).with_context(|| format!("failed to decode event file {}", path.display()))
}

/// Errors that can occur while decoding event files.
#[derive(Debug)]
pub(crate) enum EventFileError {
    /// The file contained no bytes.
    EmptyFile,
    /// No newline terminated the header.
    MissingHeaderEnd,
    /// The header was not valid UTF-8.
    InvalidHeader,
    /// The header lacked the domain segment.
    MissingPrefix,
    /// The header lacked the version segment.
    MissingVersion,
    /// The header lacked the event count.
    MissingCount,
    /// The header used an unexpected domain.
    InvalidPrefix(String),
    /// The header used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The event count could not be parsed.
    InvalidCount(String),
    /// The payload held a different number of events than announced.
    CountMismatch {
        /// Count announced by the header.
        expected: usize,
        /// Count found in the payload.
        found: usize,
    },
    /// The payload could not be encoded or decoded.
    InvalidPayload(CodecError),
}

impl fmt::Display for EventFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFile => write!(f, "event file was empty"),
            Self::MissingHeaderEnd => write!(f, "event file header is not terminated"),
            Self::InvalidHeader => write!(f, "event file header is not valid text"),
            Self::MissingPrefix => write!(f, "event file is missing the prefix"),
            Self::MissingVersion => write!(f, "event file is missing the version"),
            Self::MissingCount => write!(f, "event file is missing the event count"),
            Self::InvalidPrefix(prefix) => write!(f, "event file prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "event file version '{version}' is not supported")
            }
            Self::InvalidCount(count) => write!(f, "could not parse event count '{count}'"),
            Self::CountMismatch { expected, found } => {
                write!(f, "header announces {expected} events but the payload holds {found}")
            }
            Self::InvalidPayload(error) => write!(f, "could not process event payload: {error}"),
        }
    }
}

impl Error for EventFileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitglow_core::{ColorCode, PixelWrite, TileId};

    fn events() -> Vec<Event> {
        let write = |x, color| PixelWrite {
            tile: TileId::new(2),
            x,
            y: 1,
            color,
        };
        let mut first = Event::single(write(0, ColorCode::RED), 0.0);
        first.absorb(Event::single(write(1, ColorCode::GREEN), 0.0004));
        vec![first, Event::single(write(3, ColorCode::BACKGROUND), 0.5)]
    }

    #[test]
    fn round_trip_preserves_order_and_writes() {
        let events = events();

        let encoded = encode(&events).expect("events encode");
        assert!(encoded.starts_with(b"hitglow-events:v1:2\n"));

        let decoded = decode(&encoded).expect("events decode");
        assert_eq!(decoded, events);
    }

    #[test]
    fn empty_list_round_trips() {
        let decoded = decode(&encode(&[]).expect("encodes")).expect("decodes");

        assert!(decoded.is_empty());
    }

    #[test]
    fn rejects_foreign_headers() {
        let mut encoded = encode(&events()).expect("events encode");
        let _ = encoded.splice(0..7, b"bogusev".iter().copied());

        assert!(matches!(
            decode(&encoded),
            Err(EventFileError::InvalidPrefix(prefix)) if prefix == "bogusev-events"
        ));
    }

    #[test]
    fn rejects_unknown_versions() {
        let encoded = encode(&events()).expect("events encode");
        let patched = [b"hitglow-events:v9:2".as_slice(), &encoded[19..]].concat();

        assert!(matches!(
            decode(&patched),
            Err(EventFileError::UnsupportedVersion(version)) if version == "v9"
        ));
    }

    #[test]
    fn rejects_count_mismatch() {
        let encoded = encode(&events()).expect("events encode");
        let patched = [b"hitglow-events:v1:3".as_slice(), &encoded[19..]].concat();

        assert!(matches!(
            decode(&patched),
            Err(EventFileError::CountMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn rejects_truncated_files() {
        assert!(matches!(decode(b""), Err(EventFileError::EmptyFile)));
        assert!(matches!(
            decode(b"hitglow-events:v1:2"),
            Err(EventFileError::MissingHeaderEnd)
        ));
        assert!(matches!(
            decode(b"hitglow-events\n"),
            Err(EventFileError::MissingVersion)
        ));
    }
}
