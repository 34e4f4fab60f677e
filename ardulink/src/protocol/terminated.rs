use super::ByteStreamProcessor;
use crate::{
    error::UnsupportedMessageError,
    message::{FromDeviceMessage, ToDeviceMessage},
};

/// Longest record (terminator excluded) accepted; this also bounds the
/// fragment retained between `parse` calls.
pub const DEFAULT_MAX_FRAGMENT_LEN: usize = 8 * 1024;

/// A record-oriented grammar: one message per terminator-delimited record.
pub trait RecordGrammar: Send {
    fn name(&self) -> &'static str;

    fn terminator(&self) -> u8 {
        b'\n'
    }

    /// Classifies one record (terminator excluded). `None` discards it.
    fn classify(&self, record: &[u8]) -> Option<FromDeviceMessage>;

    /// Serializes one message, terminator included.
    fn serialize(&self, message: &ToDeviceMessage) -> Result<Vec<u8>, UnsupportedMessageError>;
}

enum ScanState {
    /// Looking for the next terminator at or after the scan position.
    Scanning,
    /// A terminator was found at this buffer index.
    Dispatching(usize),
}

/// Drives a [`RecordGrammar`] over an unbounded, arbitrarily chunked stream.
///
/// Records that match no grammar rule are dropped and scanning resumes after
/// their terminator. Records longer than the limit are dropped as well, no
/// matter how they were chunked: a fragment growing past the limit is
/// discarded at once, together with the rest of its record.
pub struct TerminatedProcessor<G: RecordGrammar> {
    grammar: G,
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no terminator.
    scanned: usize,
    max_fragment_len: usize,
    /// Set when the head of the current record was dropped.
    truncated: bool,
}

impl<G: RecordGrammar> TerminatedProcessor<G> {
    pub fn new(grammar: G) -> Self {
        Self::with_max_fragment_len(grammar, DEFAULT_MAX_FRAGMENT_LEN)
    }

    pub fn with_max_fragment_len(grammar: G, max_fragment_len: usize) -> Self {
        Self {
            grammar,
            buffer: Vec::with_capacity(256),
            scanned: 0,
            max_fragment_len,
            truncated: false,
        }
    }

    pub fn grammar(&self) -> &G {
        &self.grammar
    }

    /// Length of the retained, not yet terminated fragment.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

impl<G: RecordGrammar> ByteStreamProcessor for TerminatedProcessor<G> {
    fn protocol_name(&self) -> &str {
        self.grammar.name()
    }

    fn parse(&mut self, chunk: &[u8]) -> Vec<FromDeviceMessage> {
        self.buffer.extend_from_slice(chunk);

        let terminator = self.grammar.terminator();
        let mut messages = Vec::new();
        let mut record_start = 0;
        let mut state = ScanState::Scanning;

        loop {
            state = match state {
                ScanState::Scanning => {
                    let from = record_start.max(self.scanned);
                    match self.buffer[from..].iter().position(|b| *b == terminator) {
                        Some(offset) => ScanState::Dispatching(from + offset),
                        None => break,
                    }
                }
                ScanState::Dispatching(end) => {
                    let truncated = std::mem::take(&mut self.truncated);
                    let oversized = end - record_start > self.max_fragment_len;
                    if !truncated && !oversized {
                        let record = &self.buffer[record_start..end];
                        if let Some(message) = self.grammar.classify(record) {
                            messages.push(message);
                        }
                    }
                    record_start = end + 1;
                    ScanState::Scanning
                }
            };
        }

        self.buffer.drain(..record_start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_fragment_len {
            self.buffer.clear();
            self.scanned = 0;
            self.truncated = true;
        }

        messages
    }

    fn to_device(&self, message: &ToDeviceMessage) -> Result<Vec<u8>, UnsupportedMessageError> {
        self.grammar.serialize(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts records spelling `ready`, nothing else.
    struct ReadyOnly;

    impl RecordGrammar for ReadyOnly {
        fn name(&self) -> &'static str {
            "ready-only"
        }

        fn classify(&self, record: &[u8]) -> Option<FromDeviceMessage> {
            (record == b"ready").then_some(FromDeviceMessage::Ready)
        }

        fn serialize(
            &self,
            message: &ToDeviceMessage,
        ) -> Result<Vec<u8>, UnsupportedMessageError> {
            Err(UnsupportedMessageError {
                protocol: self.name().to_string(),
                message: format!("{message:?}"),
                reason: "read-only grammar".to_string(),
            })
        }
    }

    #[test]
    fn retains_unterminated_fragment() {
        let mut processor = TerminatedProcessor::new(ReadyOnly);
        assert!(processor.parse(b"rea").is_empty());
        assert_eq!(processor.pending_len(), 3);
        assert_eq!(processor.parse(b"dy\nre"), vec![FromDeviceMessage::Ready]);
        assert_eq!(processor.pending_len(), 2);
    }

    #[test]
    fn discards_unknown_records_and_resumes() {
        let mut processor = TerminatedProcessor::new(ReadyOnly);
        let messages = processor.parse(b"noise\n\nready\nmore noise\nready\n");
        assert_eq!(messages, vec![FromDeviceMessage::Ready, FromDeviceMessage::Ready]);
        assert_eq!(processor.pending_len(), 0);
    }

    #[test]
    fn oversized_fragment_is_dropped_with_its_record() {
        let mut processor = TerminatedProcessor::with_max_fragment_len(ReadyOnly, 8);
        assert!(processor.parse(b"xxxxxxxxxxready").is_empty());
        assert_eq!(processor.pending_len(), 0);
        // The tail of the dropped record must not be mistaken for a record.
        assert!(processor.parse(b"ready\n").is_empty());
        assert_eq!(processor.parse(b"ready\n"), vec![FromDeviceMessage::Ready]);
    }

    #[test]
    fn record_limit_ignores_chunk_boundaries() {
        let mut input = vec![b'x'; 12];
        input.extend_from_slice(b"\nready\n");

        let mut whole = TerminatedProcessor::with_max_fragment_len(ReadyOnly, 8);
        let expected = whole.parse(&input);
        assert_eq!(expected, vec![FromDeviceMessage::Ready]);

        for at in 1..input.len() {
            let mut split = TerminatedProcessor::with_max_fragment_len(ReadyOnly, 8);
            let mut got = split.parse(&input[..at]);
            got.extend(split.parse(&input[at..]));
            assert_eq!(got, expected, "split at {at}");
        }
    }

    #[test]
    fn record_at_the_limit_is_kept() {
        let mut processor = TerminatedProcessor::with_max_fragment_len(ReadyOnly, 5);
        assert_eq!(processor.parse(b"ready\n"), vec![FromDeviceMessage::Ready]);
        assert!(processor.parse(b"re").is_empty());
        assert_eq!(processor.parse(b"ady\n"), vec![FromDeviceMessage::Ready]);
    }

    #[test]
    fn byte_by_byte_delivery_matches_single_chunk() {
        let input = b"ready\njunk\nready\n";
        let mut whole = TerminatedProcessor::new(ReadyOnly);
        let expected = whole.parse(input);

        let mut split = TerminatedProcessor::new(ReadyOnly);
        let got: Vec<_> = input.iter().flat_map(|b| split.parse(&[*b])).collect();
        assert_eq!(got, expected);
        assert_eq!(got.len(), 2);
    }
}
