//! Defines SWO packets and their possible contents.
//!
//! Every packet carries the fields common to all packet types: a type
//! tag, a size and the raw on-wire bytes. The per-type contents live in
//! the [`Kind`] variants.

/// Maximum payload size of a source packet in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 4;

/// Maximum address of a source packet (5 header bits).
pub const MAX_SOURCE_ADDRESS: u8 = 31;

/// Capacity of the raw data field: one header byte plus the payload.
pub(crate) const MAX_PACKET_SIZE: usize = 1 + MAX_PAYLOAD_SIZE;

/// Packet type tags.
///
/// The numeric values are stable and part of the API; language bindings
/// and trace file formats rely on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PacketType {
    /// Data which could not be decoded.
    Unknown = 0,
    /// Synchronization packet.
    Sync = 1,
    /// Overflow packet.
    Overflow = 2,
    /// Local timestamp packet.
    Lts = 3,
    /// Global timestamp (GTS1) packet.
    Gts1 = 4,
    /// Global timestamp (GTS2) packet.
    Gts2 = 5,
    /// Extension packet.
    Ext = 6,
    /// Instrumentation packet.
    Instrumentation = 7,
    /// Hardware source packet.
    Hardware = 8,
    /// DWT: event counter packet.
    DwtEventCounter = 16,
    /// DWT: exception trace packet.
    DwtExceptionTrace = 17,
    /// DWT: periodic PC sample packet.
    DwtPcSample = 18,
    /// DWT: data trace PC value packet.
    DwtPcValue = 19,
    /// DWT: data trace address offset packet.
    DwtAddressOffset = 20,
    /// DWT: data trace data value packet.
    DwtDataValue = 21,
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    /// Packet size. Counted in bits for synchronization packets and in
    /// bytes, header included, for every other type.
    pub(crate) size: usize,

    /// The original on-wire encoding of the packet.
    pub(crate) data: [u8; MAX_PACKET_SIZE],

    /// Length of the valid prefix of `data`.
    pub(crate) data_len: usize,

    /// The kind (type) of this packet.
    pub(crate) kind: Kind,
}

impl Packet {
    /// Packet size: the number of zero bits plus the terminating one bit
    /// for [`Kind::Sync`], the byte count including the header otherwise.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The raw bytes this packet was decoded from. Empty for
    /// synchronization packets, whose bit run is not retained.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_len]
    }

    /// The kind (type) of this packet.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// The stable type tag of this packet.
    pub fn packet_type(&self) -> PacketType {
        match self.kind {
            Kind::Unknown => PacketType::Unknown,
            Kind::Sync => PacketType::Sync,
            Kind::Overflow => PacketType::Overflow,
            Kind::LocalTimestamp(_) => PacketType::Lts,
            Kind::GlobalTimestamp1(_) => PacketType::Gts1,
            Kind::GlobalTimestamp2(_) => PacketType::Gts2,
            Kind::Extension(_) => PacketType::Ext,
            Kind::Instrumentation(_) => PacketType::Instrumentation,
            Kind::Hardware(_) => PacketType::Hardware,
            Kind::EventCounter(_) => PacketType::DwtEventCounter,
            Kind::ExceptionTrace(_) => PacketType::DwtExceptionTrace,
            Kind::PcSample(_) => PacketType::DwtPcSample,
            Kind::PcValue(_) => PacketType::DwtPcValue,
            Kind::AddressOffset(_) => PacketType::DwtAddressOffset,
            Kind::DataValue(_) => PacketType::DwtDataValue,
        }
    }
}

/// The contents of a packet, by type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// Data which could not be decoded: a reserved header byte, a
    /// malformed continuation sequence, an aborted synchronization run
    /// or the remains of the stream after end-of-stream.
    Unknown,

    /// A synchronization packet: at least 47 zero bits followed by a
    /// single one bit. Consumers use it to re-align to the byte stream.
    /// (Appendix D4.2.1)
    Sync,

    /// The target dropped trace data, or its local timestamp counter
    /// overflowed. (Appendix D4.2.3)
    Overflow,

    /// A delta timestamp measuring the interval since the previous
    /// local timestamp packet. (Appendix D4.2.4)
    LocalTimestamp(LocalTimestamp),

    /// Lower-order bits [25:0] of the global timestamp. (Appendix D4.2.5)
    GlobalTimestamp1(GlobalTimestamp1),

    /// Higher-order bits [47:26] of the global timestamp.
    GlobalTimestamp2(GlobalTimestamp2),

    /// Additional information about a trace source; on ARMv7-M the
    /// stimulus port page. (Appendix D4.2.6)
    Extension(Extension),

    /// Payload written to an ITM stimulus port. (Appendix D4.2.8)
    Instrumentation(Source),

    /// A packet generated by the DWT whose address was not recognized
    /// as one of the defined DWT packet layouts.
    Hardware(Source),

    /// One or more DWT event counters have wrapped. (Appendix D4.3.1)
    EventCounter(EventCounter),

    /// The processor entered, exited or returned to an exception.
    /// (Appendix D4.3.2)
    ExceptionTrace(ExceptionTrace),

    /// Periodic PC sample. (Appendix D4.3.3)
    PcSample(PcSample),

    /// A DWT comparator matched a PC value. (Appendix D4.3.4)
    PcValue(PcValue),

    /// A DWT comparator matched a data address. (Appendix D4.3.4)
    AddressOffset(AddressOffset),

    /// A DWT comparator matched a data access. (Appendix D4.3.4)
    DataValue(DataValue),
}

/// Relationship between the generation of a local timestamp packet and
/// the corresponding source packet. (Appendix D4.2.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LtsRelation {
    /// Source packet and timestamp packet are synchronous.
    Sync = 0,

    /// The timestamp packet is delayed relative to the source packet;
    /// the value is the counter value when the timestamp packet was
    /// generated.
    TimestampDelayed = 1,

    /// The source packet is delayed relative to the event it reports.
    SourceDelayed = 2,

    /// Both the source packet and the timestamp packet are delayed.
    BothDelayed = 3,
}

/// Contents of a local timestamp packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalTimestamp {
    pub(crate) relation: LtsRelation,
    pub(crate) value: u32,
}

impl LocalTimestamp {
    /// How this timestamp relates to the corresponding source packet.
    pub fn relation(&self) -> LtsRelation {
        self.relation
    }

    /// Timestamp value; up to 28 bits.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Contents of a global timestamp (GTS1) packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalTimestamp1 {
    pub(crate) value: u32,
    pub(crate) clkch: bool,
    pub(crate) wrap: bool,
}

impl GlobalTimestamp1 {
    /// Lower-order bits [25:0] of the global timestamp value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Whether the system has asserted the clock change input to the
    /// processor since the last global timestamp packet.
    pub fn clkch(&self) -> bool {
        self.clkch
    }

    /// Whether the higher-order timestamp bits changed since the last
    /// GTS2 packet.
    pub fn wrap(&self) -> bool {
        self.wrap
    }
}

/// Contents of a global timestamp (GTS2) packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalTimestamp2 {
    pub(crate) value: u32,
}

impl GlobalTimestamp2 {
    /// Higher-order bits [47:26] of the global timestamp value.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Originator of an extension packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ExtensionSource {
    /// Instrumentation Trace Macrocell (ITM) extension packet.
    Itm = 0,
    /// Hardware source extension packet.
    Hardware = 1,
}

/// Contents of an extension packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extension {
    pub(crate) source: ExtensionSource,
    pub(crate) value: u32,
}

impl Extension {
    /// Source of the extension packet.
    pub fn source(&self) -> ExtensionSource {
        self.source
    }

    /// Extension information: three header bits, widened by up to four
    /// continuation bytes.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Common contents of the source packets (instrumentation and hardware),
/// also preserved verbatim on every refined DWT packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Source {
    pub(crate) address: u8,
    pub(crate) payload: [u8; MAX_PAYLOAD_SIZE],
    pub(crate) payload_len: usize,
    pub(crate) value: u32,
}

impl Source {
    /// Stimulus port number of an instrumentation packet, or the
    /// discriminator address of a hardware source packet. At most
    /// [`MAX_SOURCE_ADDRESS`].
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Payload bytes; 1, 2 or 4 of them.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len]
    }

    /// The payload as a little-endian integer.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Contents of a DWT event counter packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventCounter {
    pub(crate) source: Source,
    pub(crate) cpi: bool,
    pub(crate) exc: bool,
    pub(crate) sleep: bool,
    pub(crate) lsu: bool,
    pub(crate) fold: bool,
    pub(crate) cyc: bool,
}

impl EventCounter {
    /// The hardware source packet this packet was refined from.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// CPICNT wrapped around to zero.
    pub fn cpi(&self) -> bool {
        self.cpi
    }

    /// EXCCNT wrapped around to zero.
    pub fn exc(&self) -> bool {
        self.exc
    }

    /// SLEEPCNT wrapped around to zero.
    pub fn sleep(&self) -> bool {
        self.sleep
    }

    /// LSUCNT wrapped around to zero.
    pub fn lsu(&self) -> bool {
        self.lsu
    }

    /// FOLDCNT wrapped around to zero.
    pub fn fold(&self) -> bool {
        self.fold
    }

    /// CYCCNT wrapped around to zero.
    pub fn cyc(&self) -> bool {
        self.cyc
    }
}

/// Action taken by the processor for an exception. (Table D4-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ExceptionFunction {
    /// Reserved function encoding.
    Reserved = 0,
    /// Exception was entered.
    Enter = 1,
    /// Exception was exited.
    Exit = 2,
    /// Exception was returned to.
    Return = 3,
}

/// Contents of a DWT exception trace packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExceptionTrace {
    pub(crate) source: Source,
    pub(crate) exception: u16,
    pub(crate) function: ExceptionFunction,
}

impl ExceptionTrace {
    /// The hardware source packet this packet was refined from.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Exception number, 0..=511.
    pub fn exception(&self) -> u16 {
        self.exception
    }

    /// Action taken by the processor.
    pub fn function(&self) -> ExceptionFunction {
        self.function
    }
}

/// Contents of a DWT periodic PC sample packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PcSample {
    pub(crate) source: Source,
    pub(crate) sleep: bool,
    pub(crate) pc: u32,
}

impl PcSample {
    /// The hardware source packet this packet was refined from.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Whether the processor was in sleep mode. A sleeping sample
    /// carries no PC value.
    pub fn sleep(&self) -> bool {
        self.sleep
    }

    /// Program counter value; 0 for sleep samples.
    pub fn pc(&self) -> u32 {
        self.pc
    }
}

/// Contents of a DWT data trace PC value packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PcValue {
    pub(crate) source: Source,
    pub(crate) cmpn: u8,
    pub(crate) pc: u32,
}

impl PcValue {
    /// The hardware source packet this packet was refined from.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Number of the comparator that generated the packet, 0..=3.
    pub fn cmpn(&self) -> u8 {
        self.cmpn
    }

    /// PC value of the instruction that caused the match.
    pub fn pc(&self) -> u32 {
        self.pc
    }
}

/// Contents of a DWT data trace address offset packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressOffset {
    pub(crate) source: Source,
    pub(crate) cmpn: u8,
    pub(crate) offset: u16,
}

impl AddressOffset {
    /// The hardware source packet this packet was refined from.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Number of the comparator that generated the packet, 0..=3.
    pub fn cmpn(&self) -> u8 {
        self.cmpn
    }

    /// Address offset, bits [15:0] of the matched address.
    pub fn offset(&self) -> u16 {
        self.offset
    }
}

/// Contents of a DWT data trace data value packet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataValue {
    pub(crate) source: Source,
    pub(crate) cmpn: u8,
    pub(crate) wnr: bool,
    pub(crate) data_value: u32,
}

impl DataValue {
    /// The hardware source packet this packet was refined from.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Number of the comparator that generated the packet, 0..=3.
    pub fn cmpn(&self) -> u8 {
        self.cmpn
    }

    /// Whether the access was a write (true) or a read (false).
    pub fn wnr(&self) -> bool {
        self.wnr
    }

    /// The accessed data value.
    pub fn data_value(&self) -> u32 {
        self.data_value
    }
}
