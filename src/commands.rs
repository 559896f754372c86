use std::str::FromStr;

/// Centralized command id enum for the IPC surface. Matching against the
/// wire `command` string is case-insensitive.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Command {
    Ping,
    Status,
    DeviceList,
    AddDevice,
    RemoveDevice,
    DeviceStatus,
    ConnectDevice,
    DisconnectDevice,
    ReadData,
    WriteData,
}

impl Command {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Status => "status",
            Self::DeviceList => "device_list",
            Self::AddDevice => "add_device",
            Self::RemoveDevice => "remove_device",
            Self::DeviceStatus => "device_status",
            Self::ConnectDevice => "connect_device",
            Self::DisconnectDevice => "disconnect_device",
            Self::ReadData => "read_data",
            Self::WriteData => "write_data",
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ping" => Ok(Self::Ping),
            "status" => Ok(Self::Status),
            "device_list" => Ok(Self::DeviceList),
            "add_device" => Ok(Self::AddDevice),
            "remove_device" => Ok(Self::RemoveDevice),
            "device_status" => Ok(Self::DeviceStatus),
            "connect_device" => Ok(Self::ConnectDevice),
            "disconnect_device" => Ok(Self::DisconnectDevice),
            "read_data" => Ok(Self::ReadData),
            "write_data" => Ok(Self::WriteData),
            other => Err(format!("unknown command id: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("PING".parse::<Command>().unwrap(), Command::Ping);
        assert_eq!("Read_Data".parse::<Command>().unwrap(), Command::ReadData);
        assert!("no_such".parse::<Command>().is_err());
    }

    #[test]
    fn roundtrip_as_str() {
        let all = [
            Command::Ping,
            Command::Status,
            Command::DeviceList,
            Command::AddDevice,
            Command::RemoveDevice,
            Command::DeviceStatus,
            Command::ConnectDevice,
            Command::DisconnectDevice,
            Command::ReadData,
            Command::WriteData,
        ];
        for cmd in all {
            assert_eq!(cmd.as_str().parse::<Command>().unwrap(), cmd);
        }
    }
}
