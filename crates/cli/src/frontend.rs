use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

/// Parsed command line, before options assembly.
#[derive(Debug)]
pub struct Invocation {
    /// Absolute POSIX path on the device.
    pub remote_root: PathBuf,
    /// Local target directory.
    pub local_root: PathBuf,
    /// Explicit adb binary path (`--adb`).
    pub adb: Option<OsString>,
    /// Explicit device serial (`--device`).
    pub device: Option<String>,
    /// Inline exclude patterns, in order (`--exclude`).
    pub excludes: Vec<String>,
    /// Exclude file (`--exclude-from`).
    pub exclude_from: Option<PathBuf>,
    /// Reference snapshot (`--reference`).
    pub reference: Option<PathBuf>,
    /// Explicit `--delete`/`--no-delete` override, if any.
    pub delete: Option<bool>,
    /// Plan only.
    pub dry_run: bool,
    /// Worker pool width override.
    pub concurrency: Option<usize>,
    /// Mtime comparison window override in seconds.
    pub modify_window: Option<i64>,
    /// Repeated `-v` count.
    pub verbose: u8,
    /// List connected devices instead of pulling.
    pub list_devices: bool,
}

/// Builds the clap command definition.
#[must_use]
pub fn command() -> Command {
    Command::new("adbsync")
        .about("Incrementally mirror a directory from an Android device over adb")
        .arg(
            Arg::new("remote_root")
                .value_name("REMOTE_ROOT")
                .help("Absolute directory on the device, e.g. /sdcard/DCIM")
                .required_unless_present("list-devices"),
        )
        .arg(
            Arg::new("local_root")
                .value_name("LOCAL_ROOT")
                .help("Local directory receiving the mirror")
                .required_unless_present("list-devices"),
        )
        .arg(
            Arg::new("adb")
                .long("adb")
                .value_name("PATH")
                .value_parser(clap::value_parser!(OsString))
                .help("Path to the adb executable (default: $ADBSYNC_ADB, $ANDROID_HOME, PATH)"),
        )
        .arg(
            Arg::new("device")
                .long("device")
                .value_name("SERIAL")
                .help("Device serial; required when several devices are connected"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("PATTERN")
                .action(ArgAction::Append)
                .help("Exclude pattern (gitignore syntax, repeatable)"),
        )
        .arg(
            Arg::new("exclude-from")
                .long("exclude-from")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Read exclude patterns from FILE"),
        )
        .arg(
            Arg::new("reference")
                .long("reference")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Previous snapshot; unchanged files are hard-linked from it"),
        )
        .arg(
            Arg::new("delete")
                .long("delete")
                .action(ArgAction::SetTrue)
                .overrides_with("no-delete")
                .help("Remove local entries that are missing remotely"),
        )
        .arg(
            Arg::new("no-delete")
                .long("no-delete")
                .action(ArgAction::SetTrue)
                .overrides_with("delete")
                .help("Keep local entries that are missing remotely"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .short('n')
                .action(ArgAction::SetTrue)
                .help("Show what would be done without touching anything"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Parallel transfer workers (default 4)"),
        )
        .arg(
            Arg::new("modify-window")
                .long("modify-window")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(i64))
                .help("Treat mtimes differing by up to SECONDS as equal (default 2)"),
        )
        .arg(
            Arg::new("list-devices")
                .long("list-devices")
                .action(ArgAction::SetTrue)
                .help("List connected devices and exit"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase diagnostics; repeat for more"),
        )
}

/// Parses `args` into an [`Invocation`].
pub fn parse<I>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = OsString>,
{
    let matches = command().try_get_matches_from(args)?;

    let delete = if matches.get_flag("delete") {
        Some(true)
    } else if matches.get_flag("no-delete") {
        Some(false)
    } else {
        None
    };

    Ok(Invocation {
        remote_root: matches
            .get_one::<String>("remote_root")
            .map(PathBuf::from)
            .unwrap_or_default(),
        local_root: matches
            .get_one::<String>("local_root")
            .map(PathBuf::from)
            .unwrap_or_default(),
        adb: matches.get_one::<OsString>("adb").cloned(),
        device: matches.get_one::<String>("device").cloned(),
        excludes: matches
            .get_many::<String>("exclude")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        exclude_from: matches.get_one::<PathBuf>("exclude-from").cloned(),
        reference: matches.get_one::<PathBuf>("reference").cloned(),
        delete,
        dry_run: matches.get_flag("dry-run"),
        concurrency: matches.get_one::<usize>("concurrency").copied(),
        modify_window: matches.get_one::<i64>("modify-window").copied(),
        verbose: matches.get_count("verbose"),
        list_devices: matches.get_flag("list-devices"),
    })
}
