//! Configure the accelerometer controller and decode its sample stream.

use std::process::exit;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use log::{info, warn};

use accel_host_utils::cancel::CancelToken;
use accel_host_utils::device::client::{
    Controller, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT, list_devices,
};
use accel_host_utils::device::constants::{OutputDataRate, Range, Scale};
use accel_host_utils::device::decoder::{DecodeConfig, StreamDecoder};
use accel_host_utils::device::serial::CdcSerial;
use accel_host_utils::samples::store::SampleWriter;
use accel_host_utils::storage::filename::default_stream_filename;

#[derive(Parser)]
#[command(
    name = "accelctl",
    version,
    about = "Configure and stream the USB accelerometer controller."
)]
struct Cli {
    /// Serial device node to communicate with.
    #[arg(short = 'd', long, global = true, default_value = "/dev/ttyACM0")]
    device: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Retrieve device information.
    #[command(group = ArgGroup::new("device_action").multiple(false))]
    Device {
        /// List attached devices (human readable).
        #[arg(short, long, group = "device_action")]
        list: bool,
        /// List attached devices (machine readable as JSON).
        #[arg(short, long, group = "device_action")]
        json: bool,
        /// Perform a device reboot (reset).
        #[arg(short, long, group = "device_action")]
        reboot: bool,
    },

    /// Configure output data rate, resolution and range.
    #[command(group = ArgGroup::new("set_action").multiple(false))]
    Set {
        /// Set sampling rate.
        #[arg(short, long, value_enum, group = "set_action")]
        outputdatarate: Option<OutputDataRate>,
        /// Set sampling resolution.
        #[arg(short, long, value_enum, group = "set_action")]
        scale: Option<Scale>,
        /// Set sampling range.
        #[arg(short, long, value_enum, group = "set_action")]
        range: Option<Range>,
    },

    /// Read device parameters.
    #[command(group = ArgGroup::new("get_action").multiple(false))]
    Get {
        /// Read sampling rate.
        #[arg(short, long, group = "get_action")]
        outputdatarate: bool,
        /// Read sampling resolution.
        #[arg(short, long, group = "get_action")]
        scale: bool,
        /// Read sampling range.
        #[arg(short, long, group = "get_action")]
        range: bool,
        /// Read all parameters.
        #[arg(short, long, group = "get_action")]
        all: bool,
    },

    /// Start or stop data streaming from the device.
    #[command(group = ArgGroup::new("stream_action").multiple(false))]
    Stream {
        /// Start streaming n samples; n=0 streams until stop (0 <= n <= 65535).
        #[arg(
            short,
            long,
            group = "stream_action",
            num_args = 0..=1,
            default_missing_value = "0",
            value_name = "N"
        )]
        start: Option<u16>,
        /// Stop the current stream.
        #[arg(short = 'p', long, group = "stream_action")]
        stop: bool,
    },

    /// Connect and decode the input stream.
    ///
    /// The connection must be established before the stream is started;
    /// concurrent `stream` and `set` invocations are allowed meanwhile.
    #[command(group = ArgGroup::new("decode_action").multiple(false))]
    Decode {
        /// Print records to the log; keeps decoding across streams.
        #[arg(long, group = "decode_action")]
        stdout: bool,
        /// Write records to a file and finish when the stream stops. Leave
        /// the value empty for a generated file name.
        #[arg(
            short,
            long,
            group = "decode_action",
            num_args = 0..=1,
            default_missing_value = "",
            value_name = "PATH"
        )]
        file: Option<String>,
    },
}

fn cancel_on_ctrlc() -> anyhow::Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || handler.set()).context("installing the ctrl-c handler")?;
    Ok(cancel)
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(255);
    };

    match command {
        Command::Device { list, json, reboot } => {
            if list {
                for device in list_devices()? {
                    println!("{}", device.name);
                }
            } else if json {
                let devices = list_devices()?;
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if reboot {
                info!("device reboot");
                Controller::open(&cli.device)?.reboot()?;
            } else {
                warn!("nothing to do");
                return Ok(1);
            }
        }

        Command::Set {
            outputdatarate,
            scale,
            range,
        } => {
            if let Some(odr) = outputdatarate {
                info!("send outputdatarate={odr}");
                Controller::open(&cli.device)?.set_output_data_rate(odr)?;
            } else if let Some(scale) = scale {
                info!("send scale={scale}");
                Controller::open(&cli.device)?.set_scale(scale)?;
            } else if let Some(range) = range {
                info!("send range={range}");
                Controller::open(&cli.device)?.set_range(range)?;
            } else {
                warn!("nothing to do");
                return Ok(1);
            }
        }

        Command::Get {
            outputdatarate,
            scale,
            range,
            all,
        } => {
            if outputdatarate {
                println!("odr={}", Controller::open(&cli.device)?.get_output_data_rate()?);
            } else if scale {
                println!("scale={}", Controller::open(&cli.device)?.get_scale()?);
            } else if range {
                println!("range={}", Controller::open(&cli.device)?.get_range()?);
            } else if all {
                let mut ctrl = Controller::open(&cli.device)?;
                println!("odr={}", ctrl.get_output_data_rate()?);
                println!("scale={}", ctrl.get_scale()?);
                println!("range={}", ctrl.get_range()?);
                println!("firmware={}", ctrl.get_firmware_version()?);
                println!("uptime_ms={}", ctrl.get_uptime_ms()?);
            } else {
                warn!("nothing to do");
                return Ok(1);
            }
        }

        Command::Stream { start, stop } => {
            if let Some(n) = start {
                info!("sampling start n={n}");
                Controller::open(&cli.device)?.start_sampling(n)?;
            } else if stop {
                info!("sampling stop");
                Controller::open(&cli.device)?.stop_sampling()?;
            } else {
                warn!("nothing to do");
                return Ok(1);
            }
        }

        Command::Decode { stdout, file } => {
            if !stdout && file.is_none() {
                warn!("nothing to do");
                return Ok(1);
            }
            let cancel = cancel_on_ctrlc()?;
            let link = CdcSerial::open(&cli.device, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT)?;
            let mut decoder = StreamDecoder::new(link);
            if stdout {
                info!("decode stream to stdout");
                decoder.decode(DecodeConfig::new(false, 0.0), None, &cancel)?;
            } else if let Some(file) = file {
                let path = if file.is_empty() {
                    default_stream_filename("stream")
                } else {
                    file
                };
                info!("decode stream to file {path}");
                let mut writer = SampleWriter::create(&path)?;
                decoder.decode(DecodeConfig::new(true, 0.0), Some(&mut writer), &cancel)?;
            }
        }
    }

    Ok(0)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => exit(code),
        Err(e) => {
            log::error!("{e:#}");
            exit(1);
        }
    }
}
