//! A [sans-I/O](https://sans-io.readthedocs.io/how-to-sans-io.html)
//! decoder for the ARM CoreSight SWO trace stream: the ITM and DWT
//! packet protocol as specified in the [ARMv7-M architecture reference
//! manual, Appendix
//! D4](https://developer.arm.com/documentation/ddi0403/ed/). Any
//! references in this code base refer to this document.
//!
//! Common abbreviations:
//!
//! - SWO: serial wire output;
//! - ITM: instrumentation trace macrocell;
//! - DWT: data watchpoint and trace unit;
//! - PC: program counter;
//!
//! Trace bytes are fed into a caller-sized buffer and come back out as
//! typed [`Packet`]s, either pulled one at a time or pushed through a
//! callback. The decoder tolerates arbitrary fragmentation of the
//! input: a packet cut off by the end of the buffered bytes is picked
//! up again on the next feed. Byte patterns that violate the protocol
//! are delivered as [`Kind::Unknown`] packets instead of aborting the
//! stream, since a bit flip on the wire must not terminate decoding.
//!
//! Usage is simple:
//! ```
//! use swo_decode::{DecodeOptions, Decoder};
//!
//! let mut storage = [0u8; 64];
//! let mut decoder = Decoder::new(&mut storage).unwrap();
//! decoder.set_callback(|packet| {
//!     println!("{:?}", packet);
//!     true
//! });
//!
//! decoder.feed(&[0b0111_0000]).unwrap();
//! decoder.decode(DecodeOptions { eos: true }).unwrap();
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

mod buffer;
mod decoder;
mod dwt;
mod error;
mod packet;

pub use decoder::{DecodeOptions, Decoder, MIN_BUFFER_SIZE};
pub use error::Error;
pub use packet::{
    AddressOffset, DataValue, EventCounter, ExceptionFunction, ExceptionTrace, Extension,
    ExtensionSource, GlobalTimestamp1, GlobalTimestamp2, Kind, LocalTimestamp, LtsRelation, Packet,
    PacketType, PcSample, PcValue, Source, MAX_PAYLOAD_SIZE, MAX_SOURCE_ADDRESS,
};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
