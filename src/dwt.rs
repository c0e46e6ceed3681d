//! Refinement of hardware source packets into DWT packets.
//!
//! The DWT emits all of its trace output as hardware source packets;
//! the discriminator address and the payload length select the actual
//! packet layout. (Appendix D4.3) Refinement re-interprets the already
//! captured payload; the raw source fields are preserved on the refined
//! packet, and an address or payload length that matches no layout
//! leaves the packet a plain hardware source packet.

use bitmatch::bitmatch;

use crate::packet::{
    AddressOffset, DataValue, EventCounter, ExceptionFunction, ExceptionTrace, Kind, PcSample,
    PcValue, Source,
};

#[bitmatch]
pub(crate) fn refine(source: Source) -> Kind {
    let payload = source.payload;

    match (source.address, source.payload_len) {
        (0, 1) => {
            // event counter wrap
            #[bitmatch]
            let "??yf_lsec" = payload[0];

            Kind::EventCounter(EventCounter {
                cyc: y != 0,
                fold: f != 0,
                lsu: l != 0,
                sleep: s != 0,
                exc: e != 0,
                cpi: c != 0,
                source,
            })
        }
        (1, 2) => {
            // exception trace
            #[bitmatch]
            let "??ff_???e" = payload[1];

            Kind::ExceptionTrace(ExceptionTrace {
                exception: u16::from(payload[0]) | (u16::from(e) << 8),
                function: match f {
                    0b01 => ExceptionFunction::Enter,
                    0b10 => ExceptionFunction::Exit,
                    0b11 => ExceptionFunction::Return,
                    _ => ExceptionFunction::Reserved,
                },
                source,
            })
        }
        (2, 4) => Kind::PcSample(PcSample {
            sleep: false,
            pc: source.value,
            source,
        }),
        (2, 1) => {
            // periodic PC sleep packet
            Kind::PcSample(PcSample {
                sleep: true,
                pc: 0,
                source,
            })
        }
        (8..=23, len) => {
            // data trace
            #[bitmatch]
            let "???t_tccd" = source.address;
            let cmpn = c;

            match (t, d, len) {
                (0b01, 0, 4) => Kind::PcValue(PcValue {
                    cmpn,
                    pc: source.value,
                    source,
                }),
                (0b01, 1, 2) => Kind::AddressOffset(AddressOffset {
                    cmpn,
                    offset: source.value as u16,
                    source,
                }),
                (0b10, d, _) => Kind::DataValue(DataValue {
                    cmpn,
                    wnr: d != 0,
                    data_value: source.value,
                    source,
                }),
                _ => Kind::Hardware(source),
            }
        }
        _ => Kind::Hardware(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MAX_PAYLOAD_SIZE;

    fn source(address: u8, payload: &[u8]) -> Source {
        let mut bytes = [0u8; MAX_PAYLOAD_SIZE];
        bytes[..payload.len()].copy_from_slice(payload);

        let mut value: u32 = 0;
        for (i, byte) in payload.iter().enumerate() {
            value |= u32::from(*byte) << (8 * i);
        }

        Source {
            address,
            payload: bytes,
            payload_len: payload.len(),
            value,
        }
    }

    #[test]
    fn unassigned_addresses_stay_hardware() {
        for address in [3, 4, 5, 6, 7, 24, 31] {
            let src = source(address, &[0xAA]);
            assert_eq!(refine(src.clone()), Kind::Hardware(src));
        }
    }

    #[test]
    fn mismatched_payload_length_stays_hardware() {
        // exception trace payloads are two bytes; four bytes is an
        // unrecognized layout
        let exctrace = source(1, &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(refine(exctrace.clone()), Kind::Hardware(exctrace));

        // PC value packets carry a full word
        let pc_value = source(8, &[0x01, 0x02]);
        assert_eq!(refine(pc_value.clone()), Kind::Hardware(pc_value));
    }

    #[test]
    fn comparator_and_direction_split() {
        match refine(source(0b10101, &[0x2A])) {
            Kind::DataValue(value) => {
                assert_eq!(value.cmpn(), 0b10);
                assert!(value.wnr());
                assert_eq!(value.data_value(), 0x2A);
            }
            kind => panic!("unexpected refinement: {:?}", kind),
        }

        match refine(source(0b01011, &[0x34, 0x12])) {
            Kind::AddressOffset(offset) => {
                assert_eq!(offset.cmpn(), 0b01);
                assert_eq!(offset.offset(), 0x1234);
            }
            kind => panic!("unexpected refinement: {:?}", kind),
        }
    }
}
