//! DHCPv4 options used when answering from a resolved lease.
//!
//! Each option has a code (1 byte), length (1 byte), and variable-length data.
//! Only the options a lease reply reads or writes are decoded; everything
//! else is carried through as [`DhcpOption::Unknown`].
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Maximum number of IPv4 addresses that fit in one option (255 / 4).
const MAX_ADDRESSES_PER_OPTION: usize = 63;

/// Longest payload a single option can carry.
const MAX_OPTION_LENGTH: usize = 255;

/// DHCP option codes handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    Pad = 0,
    /// Subnet mask (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Router/gateway addresses (RFC 2132 §3.5).
    Router = 3,
    /// DNS server addresses (RFC 2132 §3.8).
    DnsServer = 6,
    /// Client hostname (RFC 2132 §3.14).
    Hostname = 12,
    /// Requested IP address (RFC 2132 §9.1).
    RequestedIpAddress = 50,
    /// IP address lease time in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// DHCP message type (RFC 2132 §9.6).
    MessageType = 53,
    /// Server identifier (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// Parameter request list (RFC 2132 §9.8).
    ParameterRequestList = 55,
    /// Client identifier (RFC 2132 §9.14).
    ClientIdentifier = 61,
    /// TFTP server name (RFC 2132 §9.4).
    TftpServerName = 66,
    /// Boot file name (RFC 2132 §9.5).
    BootfileName = 67,
    End = 255,
}

impl TryFrom<u8> for OptionCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pad),
            1 => Ok(Self::SubnetMask),
            3 => Ok(Self::Router),
            6 => Ok(Self::DnsServer),
            12 => Ok(Self::Hostname),
            50 => Ok(Self::RequestedIpAddress),
            51 => Ok(Self::LeaseTime),
            53 => Ok(Self::MessageType),
            54 => Ok(Self::ServerIdentifier),
            55 => Ok(Self::ParameterRequestList),
            61 => Ok(Self::ClientIdentifier),
            66 => Ok(Self::TftpServerName),
            67 => Ok(Self::BootfileName),
            255 => Ok(Self::End),
            other => Err(other),
        }
    }
}

/// DHCP message types (Option 53).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Discover => "DISCOVER",
            Self::Offer => "OFFER",
            Self::Request => "REQUEST",
            Self::Decline => "DECLINE",
            Self::Ack => "ACK",
            Self::Nak => "NAK",
            Self::Release => "RELEASE",
            Self::Inform => "INFORM",
        };
        f.write_str(name)
    }
}

/// A parsed DHCP option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOption {
    SubnetMask(Ipv4Addr),
    Router(Vec<Ipv4Addr>),
    DnsServer(Vec<Ipv4Addr>),
    Hostname(String),
    RequestedIpAddress(Ipv4Addr),
    LeaseTime(u32),
    MessageType(MessageType),
    ServerIdentifier(Ipv4Addr),
    ParameterRequestList(Vec<u8>),
    ClientIdentifier(Vec<u8>),
    TftpServerName(String),
    BootfileName(String),
    /// Any option not listed above, preserved as raw bytes.
    Unknown(u8, Vec<u8>),
}

impl DhcpOption {
    pub fn option_code(&self) -> u8 {
        let code = match self {
            Self::SubnetMask(_) => OptionCode::SubnetMask,
            Self::Router(_) => OptionCode::Router,
            Self::DnsServer(_) => OptionCode::DnsServer,
            Self::Hostname(_) => OptionCode::Hostname,
            Self::RequestedIpAddress(_) => OptionCode::RequestedIpAddress,
            Self::LeaseTime(_) => OptionCode::LeaseTime,
            Self::MessageType(_) => OptionCode::MessageType,
            Self::ServerIdentifier(_) => OptionCode::ServerIdentifier,
            Self::ParameterRequestList(_) => OptionCode::ParameterRequestList,
            Self::ClientIdentifier(_) => OptionCode::ClientIdentifier,
            Self::TftpServerName(_) => OptionCode::TftpServerName,
            Self::BootfileName(_) => OptionCode::BootfileName,
            Self::Unknown(code, _) => return *code,
        };
        code as u8
    }

    /// Parses the data of one option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] when the length does not fit the option
    /// type, or for Pad/End, which carry no data.
    pub fn parse(code: u8, data: &[u8]) -> Result<Self> {
        let option = match OptionCode::try_from(code) {
            Ok(OptionCode::SubnetMask) => Self::SubnetMask(parse_address(data, "subnet mask")?),
            Ok(OptionCode::Router) => Self::Router(parse_address_list(data, "router")?),
            Ok(OptionCode::DnsServer) => Self::DnsServer(parse_address_list(data, "DNS server")?),
            Ok(OptionCode::Hostname) => Self::Hostname(parse_text(data)),
            Ok(OptionCode::RequestedIpAddress) => {
                Self::RequestedIpAddress(parse_address(data, "requested IP address")?)
            }
            Ok(OptionCode::LeaseTime) => {
                let bytes: [u8; 4] = data
                    .try_into()
                    .map_err(|_| invalid_length("lease time"))?;
                Self::LeaseTime(u32::from_be_bytes(bytes))
            }
            Ok(OptionCode::MessageType) => {
                let [value] = data else {
                    return Err(invalid_length("message type"));
                };
                let message_type = MessageType::try_from(*value).map_err(|value| {
                    Error::InvalidPacket(format!("Unknown message type: {}", value))
                })?;
                Self::MessageType(message_type)
            }
            Ok(OptionCode::ServerIdentifier) => {
                Self::ServerIdentifier(parse_address(data, "server identifier")?)
            }
            Ok(OptionCode::ParameterRequestList) => Self::ParameterRequestList(data.to_vec()),
            Ok(OptionCode::ClientIdentifier) => Self::ClientIdentifier(data.to_vec()),
            Ok(OptionCode::TftpServerName) => Self::TftpServerName(parse_text(data)),
            Ok(OptionCode::BootfileName) => Self::BootfileName(parse_text(data)),
            Ok(OptionCode::Pad) | Ok(OptionCode::End) => {
                return Err(Error::InvalidPacket(
                    "Pad/End should not be parsed as options".to_string(),
                ));
            }
            Err(unknown_code) => Self::Unknown(unknown_code, data.to_vec()),
        };
        Ok(option)
    }

    /// Encodes the option as code, length, data.
    ///
    /// Payloads longer than an option can carry are truncated.
    pub fn encode(&self) -> Vec<u8> {
        let data = match self {
            Self::SubnetMask(address)
            | Self::RequestedIpAddress(address)
            | Self::ServerIdentifier(address) => address.octets().to_vec(),
            Self::Router(addresses) | Self::DnsServer(addresses) => addresses
                .iter()
                .take(MAX_ADDRESSES_PER_OPTION)
                .flat_map(|address| address.octets())
                .collect(),
            Self::Hostname(text) | Self::TftpServerName(text) | Self::BootfileName(text) => {
                text.as_bytes().to_vec()
            }
            Self::LeaseTime(seconds) => seconds.to_be_bytes().to_vec(),
            Self::MessageType(message_type) => vec![*message_type as u8],
            Self::ParameterRequestList(bytes)
            | Self::ClientIdentifier(bytes)
            | Self::Unknown(_, bytes) => bytes.clone(),
        };

        let length = data.len().min(MAX_OPTION_LENGTH);
        let mut result = Vec::with_capacity(length + 2);
        result.push(self.option_code());
        result.push(length as u8);
        result.extend_from_slice(&data[..length]);
        result
    }
}

fn invalid_length(name: &str) -> Error {
    Error::InvalidPacket(format!("Invalid {} length", name))
}

fn parse_address(data: &[u8], name: &str) -> Result<Ipv4Addr> {
    let octets: [u8; 4] = data.try_into().map_err(|_| invalid_length(name))?;
    Ok(Ipv4Addr::from(octets))
}

fn parse_address_list(data: &[u8], name: &str) -> Result<Vec<Ipv4Addr>> {
    if data.is_empty() || !data.len().is_multiple_of(4) {
        return Err(Error::InvalidPacket(format!("Invalid {} option length", name)));
    }
    Ok(data
        .chunks_exact(4)
        .map(|chunk| Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]))
        .collect())
}

fn parse_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).trim_end_matches('\0').to_string()
}
