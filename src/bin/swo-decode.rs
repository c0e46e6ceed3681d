use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use structopt::StructOpt;
use swo_decode::{DecodeOptions, Decoder, Kind};

#[derive(StructOpt, Debug)]
#[structopt(
    about = "An SWO trace stream decoder for the ARM CoreSight ITM/DWT packet protocol, as specified in the ARMv7-M architecture reference manual, Appendix D4. See <https://developer.arm.com/documentation/ddi0403/ed/>."
)]
struct Opt {
    #[structopt(
        short = "-s",
        long = "--stimulus-strings",
        help = "Decode instrumentation packets as UTF-8 strings (assumes each string ends with a newline)"
    )]
    instr_as_string: bool,

    #[structopt(
        long = "--buffer-size",
        default_value = "1024",
        help = "Capacity of the decode buffer in bytes"
    )]
    buffer_size: usize,

    #[structopt(name = "FILE", parse(from_os_str), help = "Raw trace input file")]
    file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::from_args();

    // Read the whole file and feed it to the decoder in buffer-sized
    // chunks.
    let trace = {
        let mut f = File::open(&opt.file).with_context(|| format!("Failed to open {:?}", opt.file))?;
        let mut buf: Vec<u8> = Vec::new();
        f.read_to_end(&mut buf)
            .with_context(|| format!("Failed to buffer {:?}", opt.file))?;

        buf
    };

    let mut storage = vec![0u8; opt.buffer_size];
    let mut decoder = Decoder::new(&mut storage).context("Failed to create decoder")?;

    let mut stim = BTreeMap::new();
    let mut offset = 0;

    loop {
        let eos = offset == trace.len();
        if !eos {
            let chunk = (trace.len() - offset).min(decoder.free_space());
            decoder
                .feed(&trace[offset..offset + chunk])
                .context("Failed to feed decoder")?;
            offset += chunk;
        }

        while let Some(packet) = decoder.pull(DecodeOptions { eos }) {
            match packet.kind() {
                Kind::Instrumentation(source) if opt.instr_as_string => {
                    // lossily convert the payload to a UTF-8 string
                    let string = stim
                        .entry(source.address())
                        .or_insert_with(String::new);
                    string.push_str(&String::from_utf8_lossy(source.payload()));

                    // If a newline is encountered, the user likely wants
                    // the string to be printed.
                    if string.ends_with('\n') {
                        for line in string.lines() {
                            println!("port {}> {}", source.address(), line);
                        }

                        string.clear();
                    }
                }
                _ => println!("{:?}", packet),
            }
        }

        if eos {
            break;
        }
    }

    if stim.iter().any(|(_, string)| !string.is_empty()) {
        println!("Warning: decoded incomplete UTF-8 strings from instrumentation packets:");
    }
    for (port, string) in stim {
        for line in string.lines() {
            println!("port {}> {}", port, line);
        }
    }

    Ok(())
}
