//! Telemetry sentence framing.
//!
//! A sentence is one checksummed, comma-delimited line from the controller:
//!
//! ```text
//! $S2MRA,1234*5A
//! ^^^           sentinel (protocol version 2)
//!    ^^^        tag
//!        ^^^^   fields
//!         ^^^   "*" plus checksum, carried but not verified here
//! ```
//!
//! Only the `$S2` layout is supported. Older firmware emitted `$S1` with
//! different per-tag field offsets; those lines are rejected rather than
//! silently misdecoded.

use specmech_core::{Error, Result};

/// The three-byte protocol-version sentinel every sentence starts with.
pub const SENTINEL: &str = "$S2";

/// The line break sequence separating sentences within one reply.
pub const LINE_BREAK: &str = "\r\x00\n";

/// One decoded telemetry sentence.
///
/// `fields[0]` is always the tag; the checksum has been stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// The sentence category (e.g. `MRA`, `ENV`, `PNU`).
    pub tag: String,
    /// All comma-separated fields, tag included.
    pub fields: Vec<String>,
}

/// Decode one telemetry line into a [`Sentence`].
///
/// The line must begin with the [`SENTINEL`]. Everything from the first `*`
/// on is checksum material and is discarded without verification; the
/// remainder is split on commas.
///
/// # Examples
///
/// ```
/// use specmech_proto::sentence::parse;
///
/// let s = parse("$S2MRA,1234*5A").unwrap();
/// assert_eq!(s.tag, "MRA");
/// assert_eq!(s.fields, vec!["MRA", "1234"]);
/// ```
pub fn parse(line: &str) -> Result<Sentence> {
    let body = line
        .strip_prefix(SENTINEL)
        .ok_or_else(|| Error::Parse(format!("missing {SENTINEL} sentinel: {line:?}")))?;

    let body = match body.split_once('*') {
        Some((data, _checksum)) => data,
        None => body,
    };

    if body.is_empty() {
        return Err(Error::Parse(format!("empty sentence body: {line:?}")));
    }

    let fields: Vec<String> = body.split(',').map(str::to_string).collect();
    let tag = fields[0].clone();

    Ok(Sentence { tag, fields })
}

/// Extract the echoed command id from a raw reply, if one is present.
///
/// The controller echoes the sequence id of the command it is answering as
/// the last field of the reply's first sentence. Returns:
///
/// - `Ok(Some(id))` when a sentence was found and its trailer is numeric;
/// - `Ok(None)` when the reply carries no sentences at all (bare prompts
///   and simple acknowledgments look like this);
/// - `Err` when a sentence was found but its trailer is not a command id.
pub fn correlation_id(raw: &str) -> Result<Option<u64>> {
    let first = raw
        .split(LINE_BREAK)
        .find(|segment| segment.starts_with(SENTINEL));

    let segment = match first {
        Some(segment) => segment,
        None => return Ok(None),
    };

    let sentence = parse(segment)?;
    let trailer = sentence
        .fields
        .last()
        .ok_or_else(|| Error::Parse(format!("sentence {segment:?} has no trailer")))?;
    trailer
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Parse(format!("reply trailer {trailer:?} is not a command id")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // parse
    // -----------------------------------------------------------------------

    #[test]
    fn parse_motor_sentence() {
        let s = parse("$S2MRA,1234*5A").unwrap();
        assert_eq!(s.tag, "MRA");
        assert_eq!(s.fields, vec!["MRA", "1234"]);
    }

    #[test]
    fn parse_keeps_tag_as_first_field() {
        let s = parse("$S2TIM,2021-01-01T00:00:00*4F").unwrap();
        assert_eq!(s.tag, "TIM");
        assert_eq!(s.fields[0], "TIM");
        assert_eq!(s.fields[1], "2021-01-01T00:00:00");
    }

    #[test]
    fn parse_many_fields() {
        let s = parse("$S2ENV,21.3,43.0,20.9,44.1,21.5,41.8,4*5C").unwrap();
        assert_eq!(s.tag, "ENV");
        assert_eq!(s.fields.len(), 8);
        assert_eq!(s.fields[7], "4");
    }

    #[test]
    fn parse_without_checksum_is_tolerated() {
        // The checksum is pass-through material; a line that lacks it
        // entirely still decodes.
        let s = parse("$S2VER,2021-09.17").unwrap();
        assert_eq!(s.fields, vec!["VER", "2021-09.17"]);
    }

    #[test]
    fn parse_discards_everything_after_the_first_star() {
        let s = parse("$S2ACC,0.01,0.02,0.99*AB*CD").unwrap();
        assert_eq!(s.fields, vec!["ACC", "0.01", "0.02", "0.99"]);
    }

    #[test]
    fn parse_rejects_missing_sentinel() {
        let err = parse("MRA,1234*5A").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn parse_rejects_version_one_sentinel() {
        // $S1 lines use different field offsets; misdecoding them silently
        // would be worse than rejecting them.
        let err = parse("$S1MRA,1234*5A").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn parse_rejects_sentinel_not_at_start() {
        let err = parse("  $S2MRA,1234*5A").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn parse_rejects_empty_body() {
        let err = parse("$S2*00").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    // -----------------------------------------------------------------------
    // correlation_id
    // -----------------------------------------------------------------------

    #[test]
    fn correlation_id_from_single_sentence() {
        let raw = "$S2MRA,1200,7*3C\r\x00\n>";
        assert_eq!(correlation_id(raw).unwrap(), Some(7));
    }

    #[test]
    fn correlation_id_uses_the_first_sentence() {
        let raw = "$S2MRA,1200,3*3C\r\x00\n$S2TIM,2021-01-01T00:00:00,99*4F\r\x00\n>";
        assert_eq!(correlation_id(raw).unwrap(), Some(3));
    }

    #[test]
    fn correlation_id_none_for_sentence_free_reply() {
        assert_eq!(correlation_id(">").unwrap(), None);
        assert_eq!(correlation_id("\r\x00\n>").unwrap(), None);
    }

    #[test]
    fn correlation_id_rejects_non_numeric_trailer() {
        let err = correlation_id("$S2MRA,1200,abc*3C\r\x00\n>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
