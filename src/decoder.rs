//! The streaming packet decoder: header classification, continuation
//! byte accumulation, synchronization scanning and the callback-driven
//! delivery loop.
//!
//! The decoder is resumable at every byte boundary: when the buffered
//! bytes end in the middle of a packet, the read cursor stays at the
//! packet's header and the packet is re-parsed once more bytes have
//! been fed. No partial packet is ever emitted. The only bytes consumed
//! ahead of a finished packet are those of a zero-bit run, whose length
//! a bounded buffer cannot hold; the run is tracked as a bit count
//! instead.

use bitmatch::bitmatch;
use bitvec::prelude::*;

use crate::buffer::Buffer;
use crate::dwt;
use crate::error::Error;
use crate::packet::{
    Extension, ExtensionSource, GlobalTimestamp1, GlobalTimestamp2, Kind, LocalTimestamp,
    LtsRelation, Packet, Source, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE,
};

/// Minimum capacity of the backing storage handed to [`Decoder::new`]:
/// the largest single packet is a five-byte continuation-encoded
/// timestamp, plus headroom for the synchronization scanner.
pub const MIN_BUFFER_SIZE: usize = 8;

/// Minimum number of zero bits in a synchronization packet.
const SYNC_MIN_ZEROS: usize = 47;

/// Maximum number of continuation bytes behind a header.
const MAX_CONTINUATION_BYTES: usize = MAX_PAYLOAD_SIZE;

/// Flags for a decode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// No more bytes will ever be fed. Trailing bytes that do not form
    /// a complete packet are delivered as unknown data instead of being
    /// retained for a later feed.
    pub eos: bool,
}

/// The decoder's possible states between pulls.
#[derive(Clone, Copy)]
enum DecoderState {
    /// The read cursor is at a packet header boundary.
    Header,

    /// Inside a zero-bit run; carries the number of zero bits consumed
    /// so far. Always a whole number of bytes between pulls.
    Syncing(usize),

    /// A zero run was aborted or flushed and its bytes are still owed
    /// to the consumer as unknown data: `zero_bytes` zero bytes,
    /// then the byte that terminated the run, if any.
    Draining {
        zero_bytes: usize,
        terminator: Option<u8>,
    },
}

type Callback<'a> = Box<dyn FnMut(&Packet) -> bool + 'a>;

/// Streaming SWO packet decoder.
///
/// Created over caller-supplied backing storage which the decoder
/// borrows for its lifetime. Bytes enter through [`feed`](Decoder::feed)
/// and leave as [`Packet`]s through [`pull`](Decoder::pull) or through
/// the callback-driven [`decode`](Decoder::decode) loop.
pub struct Decoder<'a> {
    buf: Buffer<'a>,
    state: DecoderState,
    callback: Option<Callback<'a>>,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over `storage`. Fails with
    /// [`Error::InvalidArgument`] when the storage is smaller than
    /// [`MIN_BUFFER_SIZE`].
    pub fn new(storage: &'a mut [u8]) -> Result<Decoder<'a>, Error> {
        if storage.len() < MIN_BUFFER_SIZE {
            return Err(Error::InvalidArgument);
        }

        Ok(Decoder {
            buf: Buffer::new(storage),
            state: DecoderState::Header,
            callback: None,
        })
    }

    /// Appends trace bytes behind the pending data. Fails with
    /// [`Error::InvalidArgument`] when `data` does not fit into
    /// [`free_space`](Decoder::free_space); nothing is appended then.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.buf.feed(data)
    }

    /// Buffer capacity currently available to [`feed`](Decoder::feed).
    pub fn free_space(&self) -> usize {
        self.buf.free_space()
    }

    /// The fed bytes not yet consumed by decoding, oldest first.
    pub fn pending(&self) -> &[u8] {
        self.buf.pending()
    }

    /// Installs the packet sink invoked by [`decode`](Decoder::decode).
    /// The callback returns whether decoding should continue; the
    /// packet reference is only valid for the duration of the call.
    pub fn set_callback(&mut self, callback: impl FnMut(&Packet) -> bool + 'a) {
        self.callback = Some(Box::new(callback));
    }

    /// Runs the delivery loop: packets are pulled and handed to the
    /// installed callback until the buffered bytes cannot yield another
    /// complete packet or the callback returns `false`. With
    /// [`DecodeOptions::eos`] set, residual bytes are flushed as
    /// unknown packets before returning.
    ///
    /// Fails with [`Error::InvalidArgument`] when no callback is
    /// installed. The callback is moved out of the decoder while the
    /// loop runs, so a re-entrant `decode` from inside the callback
    /// reports the same error instead of recursing.
    ///
    /// A stopped run leaves the cursor behind the last delivered
    /// packet; a later call resumes exactly there.
    pub fn decode(&mut self, options: DecodeOptions) -> Result<(), Error> {
        let mut callback = self.callback.take().ok_or(Error::InvalidArgument)?;

        while let Some(packet) = self.pull(options) {
            if !callback(&packet) {
                break;
            }
        }

        self.callback = Some(callback);
        Ok(())
    }

    /// Pulls a single packet out of the pipeline, or `None` when the
    /// buffered bytes cannot yield another complete packet. This is the
    /// primitive [`decode`](Decoder::decode) iterates.
    pub fn pull(&mut self, options: DecodeOptions) -> Option<Packet> {
        loop {
            let state = self.state;
            match state {
                DecoderState::Draining {
                    zero_bytes,
                    terminator,
                } => return Some(self.drain(zero_bytes, terminator)),

                DecoderState::Syncing(zeros) => {
                    if let Some(packet) = self.scan_sync(zeros, options.eos) {
                        return Some(packet);
                    }
                    if let DecoderState::Syncing(_) = self.state {
                        return None;
                    }
                    // the run was aborted or flushed; drain it
                }

                DecoderState::Header => {
                    let header = self.buf.peek()?;
                    if header == 0x00 {
                        self.state = DecoderState::Syncing(0);
                        continue;
                    }

                    return match self.parse(header) {
                        Some(packet) => Some(packet),
                        None if options.eos => Some(self.flush_trailing()),
                        None => None,
                    };
                }
            }
        }
    }

    /// Consumes zero bits until the first one bit. A run of at least
    /// [`SYNC_MIN_ZEROS`] makes a synchronization packet and realigns
    /// decoding to the byte boundary behind the terminating bit; a
    /// shorter run is unknown data.
    fn scan_sync(&mut self, mut zeros: usize, eos: bool) -> Option<Packet> {
        while let Some(byte) = self.buf.peek() {
            if byte == 0x00 {
                self.buf.advance(1);
                zeros += 8;
                continue;
            }

            // the run terminates inside this byte
            let bits = byte.view_bits::<Lsb0>();
            let first_one = (0..8).find(|&i| bits[i]).unwrap();
            let run_bytes = zeros / 8;
            zeros += first_one;
            self.buf.advance(1);

            if zeros >= SYNC_MIN_ZEROS {
                self.state = DecoderState::Header;
                return Some(Packet {
                    size: zeros + 1,
                    data: [0; MAX_PACKET_SIZE],
                    data_len: 0,
                    kind: Kind::Sync,
                });
            }

            log::warn!(
                "zero run terminated after only {} bits, emitting unknown data",
                zeros
            );
            self.state = DecoderState::Draining {
                zero_bytes: run_bytes,
                terminator: Some(byte),
            };
            return None;
        }

        if eos {
            log::debug!("end of stream inside a zero run of {} bits", zeros);
            self.state = DecoderState::Draining {
                zero_bytes: zeros / 8,
                terminator: None,
            };
        } else {
            self.state = DecoderState::Syncing(zeros);
        }

        None
    }

    /// Emits the next chunk of an aborted or flushed zero run as an
    /// unknown packet. Runs wider than the packet data field are split
    /// across several packets.
    fn drain(&mut self, zero_bytes: usize, terminator: Option<u8>) -> Packet {
        let mut data = [0u8; MAX_PACKET_SIZE];
        let mut len = zero_bytes.min(MAX_PACKET_SIZE);
        let remaining = zero_bytes - len;
        let mut terminator = terminator;

        if remaining == 0 && terminator.is_some() && len < MAX_PACKET_SIZE {
            data[len] = terminator.take().unwrap();
            len += 1;
        }

        self.state = if remaining > 0 || terminator.is_some() {
            DecoderState::Draining {
                zero_bytes: remaining,
                terminator,
            }
        } else {
            DecoderState::Header
        };

        Packet {
            size: len,
            data,
            data_len: len,
            kind: Kind::Unknown,
        }
    }

    /// Classifies a header byte and parses the packet behind it.
    /// Returns `None` when more bytes are needed; the cursor is left at
    /// the header.
    #[bitmatch]
    fn parse(&mut self, header: u8) -> Option<Packet> {
        #[bitmatch]
        match header {
            // Protocol packet category
            "0111_0000" => Some(self.take(1, Kind::Overflow)),
            "1?rr_0000" => {
                // Local timestamp, format 1 (LTS1)
                self.parse_lts1(r)
            }
            "0ttt_0000" => {
                // Local timestamp, format 2 (LTS2); t is 1..=6, the
                // all-zeros and all-ones encodings are synchronization
                // and overflow headers
                let kind = Kind::LocalTimestamp(LocalTimestamp {
                    relation: LtsRelation::Sync,
                    value: t.into(),
                });
                Some(self.take(1, kind))
            }
            "1001_0100" => {
                // Global timestamp, format 1 (GTS1)
                self.parse_gts1()
            }
            "1011_0100" => {
                // Global timestamp, format 2 (GTS2)
                self.parse_gts2()
            }
            "cvvv_1s00" => {
                // Extension packet
                self.parse_ext(c != 0, v, s)
            }

            // Source packet category; header bit 2 separates
            // instrumentation (0) from hardware (1) sources
            "hhhh_hhhh" => self.parse_source(h, h & 0b100 != 0),
        }
    }

    /// Local timestamp packet with a continuation-encoded value of up
    /// to 28 bits.
    fn parse_lts1(&mut self, relation: u8) -> Option<Packet> {
        let count = self.continuation_length()?;

        let kind = match count {
            None => {
                log::warn!("unterminated local timestamp, emitting unknown data");
                Kind::Unknown
            }
            Some(count) => {
                let payload = &self.buf.pending()[1..=count];
                Kind::LocalTimestamp(LocalTimestamp {
                    relation: match relation {
                        0b00 => LtsRelation::Sync,
                        0b01 => LtsRelation::TimestampDelayed,
                        0b10 => LtsRelation::SourceDelayed,
                        0b11 => LtsRelation::BothDelayed,
                        _ => unreachable!(),
                    },
                    // value bits [27:0], c.f. Appendix D4.2.4
                    value: continuation_value(payload, 27),
                })
            }
        };

        Some(self.take_continued(count, kind))
    }

    #[bitmatch]
    fn parse_gts1(&mut self) -> Option<Packet> {
        let count = self.continuation_length()?;

        let kind = match count {
            None => {
                log::warn!("unterminated global timestamp, emitting unknown data");
                Kind::Unknown
            }
            Some(count) => {
                let payload = &self.buf.pending()[1..=count];

                // the final byte carries the clock change and wrap
                // flags above the value's top bits
                #[bitmatch]
                let "?cw?_????" = *payload.last().unwrap();

                Kind::GlobalTimestamp1(GlobalTimestamp1 {
                    // value bits [25:0], c.f. Appendix D4.2.5
                    value: continuation_value(payload, 25),
                    clkch: c != 0,
                    wrap: w != 0,
                })
            }
        };

        Some(self.take_continued(count, kind))
    }

    fn parse_gts2(&mut self) -> Option<Packet> {
        let count = self.continuation_length()?;

        let kind = match count {
            None => {
                log::warn!("unterminated global timestamp, emitting unknown data");
                Kind::Unknown
            }
            Some(count) => {
                let payload = &self.buf.pending()[1..=count];
                Kind::GlobalTimestamp2(GlobalTimestamp2 {
                    value: gts2_value(payload),
                })
            }
        };

        Some(self.take_continued(count, kind))
    }

    /// Extension packet: three value bits in the header, widened by
    /// continuation bytes when the header's continuation bit is set.
    fn parse_ext(&mut self, continued: bool, low_bits: u8, source: u8) -> Option<Packet> {
        let source = if source == 0 {
            ExtensionSource::Itm
        } else {
            ExtensionSource::Hardware
        };

        if !continued {
            let kind = Kind::Extension(Extension {
                source,
                value: low_bits.into(),
            });
            return Some(self.take(1, kind));
        }

        let count = self.continuation_length()?;

        let kind = match count {
            None => {
                log::warn!("unterminated extension packet, emitting unknown data");
                Kind::Unknown
            }
            Some(count) => {
                let mut value = u32::from(low_bits);
                for (i, byte) in self.buf.pending()[1..=count].iter().enumerate() {
                    value |= u32::from(byte & 0x7F) << (3 + 7 * i);
                }
                Kind::Extension(Extension { source, value })
            }
        };

        Some(self.take_continued(count, kind))
    }

    /// Instrumentation or hardware source packet. Hardware packets are
    /// refined into DWT packets where the address and payload length
    /// match a DWT layout.
    fn parse_source(&mut self, header: u8, hardware: bool) -> Option<Packet> {
        let len = match header & 0b11 {
            0b01 => 1,
            0b10 => 2,
            0b11 => 4,
            _ => {
                // the zero size encoding is reserved, as is every
                // remaining header that ends up here
                log::warn!("reserved header byte {:#04x}, emitting unknown data", header);
                return Some(self.take(1, Kind::Unknown));
            }
        };

        if self.buf.len() < 1 + len {
            return None;
        }

        let mut payload = [0u8; MAX_PAYLOAD_SIZE];
        payload[..len].copy_from_slice(&self.buf.pending()[1..=len]);

        let source = Source {
            address: header >> 3,
            payload,
            payload_len: len,
            value: le_value(&payload[..len]),
        };

        let kind = if hardware {
            dwt::refine(source)
        } else {
            Kind::Instrumentation(source)
        };

        Some(self.take(1 + len, kind))
    }

    /// Number of continuation bytes behind the header at the cursor.
    /// The outer `None` means the sequence is still incomplete and more
    /// bytes must be fed; the inner `None` marks a malformed sequence
    /// that is still continued past the four-byte cap.
    #[allow(clippy::option_option)]
    fn continuation_length(&self) -> Option<Option<usize>> {
        for i in 0..MAX_CONTINUATION_BYTES {
            match self.buf.peek_at(1 + i) {
                None => return None,
                Some(byte) if byte & 0x80 == 0 => return Some(Some(i + 1)),
                Some(_) => {}
            }
        }

        Some(None)
    }

    /// Consumes a continuation-encoded packet: header plus `count`
    /// bytes, or the full five-byte window for a malformed sequence.
    fn take_continued(&mut self, count: Option<usize>, kind: Kind) -> Packet {
        match count {
            Some(count) => self.take(1 + count, kind),
            None => self.take(MAX_PACKET_SIZE, Kind::Unknown),
        }
    }

    /// Consumes `len` bytes at the cursor into a packet.
    fn take(&mut self, len: usize, kind: Kind) -> Packet {
        let mut data = [0u8; MAX_PACKET_SIZE];
        data[..len].copy_from_slice(&self.buf.pending()[..len]);
        self.buf.advance(len);

        Packet {
            size: len,
            data,
            data_len: len,
            kind,
        }
    }

    /// Delivers the bytes of an incomplete trailing packet as unknown
    /// data once the stream has ended.
    fn flush_trailing(&mut self) -> Packet {
        let len = self.buf.len().min(MAX_PACKET_SIZE);
        log::debug!("end of stream, flushing {} trailing bytes", len);
        self.take(len, Kind::Unknown)
    }
}

/// Assembles a continuation-encoded value of seven bits per byte,
/// least significant group first. `max_bit` is the highest bit index
/// the value can occupy; the final byte only contributes the value's
/// top bits, so flags riding above them are masked out.
fn continuation_value(payload: &[u8], max_bit: u32) -> u32 {
    let (rtail, head) = payload.split_at(payload.len() - 1);

    let mut value: u32 = 0;
    for (i, byte) in rtail.iter().enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
    }

    let shift = 7 - (max_bit % 7);
    let mask = 0xFFu8.wrapping_shl(shift) >> shift;
    value | (u32::from(head[0] & mask) << (7 * rtail.len()))
}

/// Assembles a GTS2 timestamp, bits [47:26] of the full value. The
/// emitter's architecture profile shows in the continuation length:
/// a sequence shorter than four bytes is a compressed encoding that
/// carries seven value bits in every byte, and only the full-length
/// form reaches the 22-bit profile's top group, which holds a single
/// bit.
fn gts2_value(payload: &[u8]) -> u32 {
    const VALUE_BITS: usize = 22;

    let (rtail, head) = payload.split_at(payload.len() - 1);

    let mut value: u32 = 0;
    for (i, byte) in rtail.iter().enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
    }

    let remaining = VALUE_BITS - 7 * rtail.len();
    let mask = if remaining >= 7 {
        0x7F
    } else {
        (1u8 << remaining) - 1
    };
    value | (u32::from(head[0] & mask) << (7 * rtail.len()))
}

/// The payload as a little-endian integer.
fn le_value(payload: &[u8]) -> u32 {
    let mut value: u32 = 0;
    for (i, byte) in payload.iter().enumerate() {
        value |= u32::from(*byte) << (8 * i);
    }

    value
}
