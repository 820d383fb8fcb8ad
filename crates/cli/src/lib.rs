#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Command-line frontend for `adbsync`.
//!
//! Parses arguments, resolves the adb binary and the target device,
//! assembles [`engine::PullOptions`] and drives one [`engine::pull`] run.
//! Exit codes follow the documented contract: 0 success, 1 configuration
//! error, 2 transport error, 3 when one or more file actions failed after
//! retries, 130 when cancelled.

mod exit_code;
mod frontend;

pub use exit_code::ExitCode;
pub use frontend::{command, parse, Invocation};

use std::ffi::OsString;
use std::process;
use std::sync::atomic::AtomicBool;

use tracing::error;

use adb::{AdbClient, DeviceState};
use engine::{PullOptions, PullSummary};
use filters::{FilterRule, FilterSet};

/// Entry point shared by the binary and the tests.
pub fn run_with<I>(args: I) -> process::ExitCode
where
    I: IntoIterator<Item = OsString>,
{
    run_inner(args).into()
}

fn run_inner<I>(args: I) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
{
    let invocation = match parse(args) {
        Ok(invocation) => invocation,
        Err(error) => {
            // Help and version are not failures.
            let code = if error.use_stderr() {
                ExitCode::Config
            } else {
                ExitCode::Ok
            };
            let _ = error.print();
            return code;
        }
    };

    logging::init(invocation.verbose);

    let program = AdbClient::locate_program(invocation.adb.clone());
    let client = AdbClient::new(program);

    if invocation.list_devices {
        return list_devices(&client);
    }

    let client = match resolve_device(&client, invocation.device.clone()) {
        Ok(client) => client,
        Err(code) => return code,
    };

    let filters = match assemble_filters(&invocation) {
        Ok(filters) => filters,
        Err(code) => return code,
    };

    let mut options = PullOptions::new(&invocation.remote_root, &invocation.local_root);
    if let Some(reference) = &invocation.reference {
        options = options.with_reference(reference);
    }
    options = options.with_filters(filters);
    if let Some(delete) = invocation.delete {
        options.delete_extraneous = delete;
    }
    if let Some(concurrency) = invocation.concurrency {
        options.concurrency = concurrency;
    }
    if let Some(window) = invocation.modify_window {
        options.modify_window = window;
    }
    options.dry_run = invocation.dry_run;

    let cancel = AtomicBool::new(false);
    match engine::pull(&client, &options, &cancel) {
        Ok(summary) => {
            print_summary(&summary, invocation.dry_run);
            if summary.is_clean() {
                ExitCode::Ok
            } else {
                ExitCode::Partial
            }
        }
        Err(engine_error) => {
            error!("{engine_error}");
            let code = ExitCode::from(&engine_error);
            if code == ExitCode::Transport {
                print_transport_guidance();
            }
            code
        }
    }
}

fn list_devices(client: &AdbClient) -> ExitCode {
    match client.devices() {
        Ok(devices) if devices.is_empty() => {
            eprintln!("no devices connected");
            ExitCode::Transport
        }
        Ok(devices) => {
            for device in devices {
                let model = device.model.as_deref().unwrap_or("-");
                println!("{}\t{:?}\t{}", device.serial, device.state, model);
            }
            ExitCode::Ok
        }
        Err(error) => {
            error!("{error}");
            print_transport_guidance();
            ExitCode::Transport
        }
    }
}

/// Picks the device to talk to.
///
/// An explicit `--device` wins. Otherwise exactly one authorized device must
/// be connected; zero or several is an error the user has to resolve.
fn resolve_device(client: &AdbClient, explicit: Option<String>) -> Result<AdbClient, ExitCode> {
    if let Some(serial) = explicit {
        return Ok(client.clone().with_serial(serial));
    }

    let devices = match client.devices() {
        Ok(devices) => devices,
        Err(error) => {
            error!("{error}");
            print_transport_guidance();
            return Err(ExitCode::Transport);
        }
    };

    let usable: Vec<_> = devices
        .iter()
        .filter(|device| device.state.is_usable())
        .collect();
    match usable.as_slice() {
        [device] => Ok(client.clone().with_serial(device.serial.clone())),
        [] => {
            if devices
                .iter()
                .any(|device| device.state == DeviceState::Unauthorized)
            {
                eprintln!("device is not authorized; confirm the prompt on its screen");
            } else {
                eprintln!("no usable device connected");
            }
            print_transport_guidance();
            Err(ExitCode::Transport)
        }
        several => {
            let serials: Vec<_> = several.iter().map(|device| device.serial.as_str()).collect();
            eprintln!(
                "several devices connected ({}); pick one with --device",
                serials.join(", ")
            );
            Err(ExitCode::Config)
        }
    }
}

/// Builds the exclude set: file patterns first, then inline `--exclude`
/// patterns, preserving order so later rules win.
fn assemble_filters(invocation: &Invocation) -> Result<FilterSet, ExitCode> {
    let mut rules = Vec::new();
    if let Some(path) = &invocation.exclude_from {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                eprintln!("cannot read exclude file {}: {error}", path.display());
                return Err(ExitCode::Config);
            }
        };
        rules.extend(text.lines().filter_map(FilterRule::parse_line));
    }
    rules.extend(
        invocation
            .excludes
            .iter()
            .filter_map(|pattern| FilterRule::parse_line(pattern)),
    );

    FilterSet::from_rules(rules).map_err(|error| {
        eprintln!("{error}");
        ExitCode::Config
    })
}

fn print_summary(summary: &PullSummary, dry_run: bool) {
    let prefix = if dry_run { "would have " } else { "" };
    println!(
        "{prefix}pulled {} files ({} bytes), linked {}, copied {}, deleted {}, unchanged {}",
        summary.files_pulled,
        summary.bytes_transferred,
        summary.files_linked,
        summary.files_copied,
        summary.files_deleted,
        summary.files_unchanged,
    );
    if summary.files_skipped > 0 {
        println!("skipped {} non-regular remote entries", summary.files_skipped);
    }
    if !summary.failures.is_empty() {
        println!("{} files failed:", summary.failures.len());
        for failure in &summary.failures {
            println!("  {}: {}", failure.path.display(), failure.error);
        }
    }
}

fn print_transport_guidance() {
    eprintln!("check `adb devices`, authorize the device on its screen, or re-plug the cable");
}
