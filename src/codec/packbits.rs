//! Incremental PackBits decoder.
//!
//! RLE segments have no declared compressed length, so the decoder is fed
//! arbitrary chunks and reports how many input bytes it consumed. It stops
//! after producing exactly `target` bytes. A run that crosses the target is
//! still consumed whole, so the input position always lands on a run
//! boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting a header byte.
    Header,
    /// Copying this many more literal bytes.
    Literal(usize),
    /// Expecting the byte to repeat this many times.
    Repeat(usize),
}

/// Decoder for one PackBits segment.
#[derive(Debug, Clone)]
pub struct PackBitsDecoder {
    remaining: usize,
    state: State,
}

impl PackBitsDecoder {
    /// Decoder that stops after `target` output bytes.
    pub fn new(target: usize) -> Self {
        Self {
            remaining: target,
            state: State::Header,
        }
    }

    /// Whether `target` bytes were produced and the last run was consumed.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0 && self.state == State::Header
    }

    /// Output bytes still expected.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Decode from `input`, appending output to `out` when given.
    ///
    /// Returns the number of input bytes consumed. Stops early when the
    /// decoder completes.
    pub fn feed(&mut self, input: &[u8], mut out: Option<&mut Vec<u8>>) -> usize {
        let mut pos = 0;

        while pos < input.len() && !self.is_complete() {
            match self.state {
                State::Header => {
                    let header = input[pos] as i8;
                    pos += 1;
                    self.state = match header {
                        0..=127 => State::Literal(header as usize + 1),
                        -127..=-1 => State::Repeat((1 - header as isize) as usize),
                        // -128 is a no-op
                        _ => State::Header,
                    };
                }
                State::Literal(count) => {
                    let take = count.min(input.len() - pos);
                    let emit = take.min(self.remaining);
                    if let Some(out) = out.as_deref_mut() {
                        out.extend_from_slice(&input[pos..pos + emit]);
                    }
                    self.remaining -= emit;
                    pos += take;
                    self.state = if take == count {
                        State::Header
                    } else {
                        State::Literal(count - take)
                    };
                }
                State::Repeat(count) => {
                    let value = input[pos];
                    pos += 1;
                    let emit = count.min(self.remaining);
                    if let Some(out) = out.as_deref_mut() {
                        out.resize(out.len() + emit, value);
                    }
                    self.remaining -= emit;
                    self.state = State::Header;
                }
            }
        }

        pos
    }
}

/// Encode `data` as PackBits.
///
/// Used to build RLE fixtures with known contents.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let mut run = 1;
        while i + run < data.len() && data[i + run] == data[i] && run < 128 {
            run += 1;
        }

        if run >= 2 {
            out.push((1i16 - run as i16) as i8 as u8);
            out.push(data[i]);
            i += run;
            continue;
        }

        let start = i;
        while i < data.len() && i - start < 128 {
            if i + 1 < data.len() && data[i] == data[i + 1] {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&data[start..i]);
    }

    out
}
