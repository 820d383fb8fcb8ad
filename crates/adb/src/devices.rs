/// Connection state reported by `adb devices`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceState {
    /// Connected and authorized.
    Device,
    /// Connected but not authorized on the device screen.
    Unauthorized,
    /// Known to adb but unreachable.
    Offline,
    /// Any other state string adb may report.
    Other(String),
}

impl DeviceState {
    fn parse(text: &str) -> Self {
        match text {
            "device" => Self::Device,
            "unauthorized" => Self::Unauthorized,
            "offline" => Self::Offline,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the device can serve transfers.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Device)
    }
}

/// One row of `adb devices -l` output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceInfo {
    /// Serial (or `ip:port` for wireless connections).
    pub serial: String,
    /// Connection state.
    pub state: DeviceState,
    /// Model name from the `model:` annotation, when present.
    pub model: Option<String>,
}

/// Parses `adb devices [-l]` output.
///
/// The header line and emulator noise lines without a state column are
/// skipped. Annotations beyond `model:` are ignored.
#[must_use]
pub fn parse_devices(output: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(serial) = fields.next() else {
            continue;
        };
        let Some(state) = fields.next() else {
            continue;
        };
        let model = fields
            .clone()
            .find_map(|field| field.strip_prefix("model:"))
            .map(str::to_string);
        devices.push(DeviceInfo {
            serial: serial.to_string(),
            state: DeviceState::parse(state),
            model,
        });
    }
    devices
}
