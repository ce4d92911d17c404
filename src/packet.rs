//! DHCPv4 packet parsing and encoding per RFC 2131.
//!
//! A DHCP packet consists of a fixed 236-byte header followed by a 4-byte
//! magic cookie and variable-length options:
//!
//! ```text
//! op htype hlen hops | xid | secs flags | ciaddr | yiaddr | siaddr | giaddr
//! chaddr (16) | sname (64) | file (128) | magic cookie 99.130.83.99 | options
//! ```
//!
//! The lease handler only needs to read the client's hardware address and
//! parameter request list and to fill in a reply, so option overloading of
//! the `sname`/`file` fields is not interpreted.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::options::{DhcpOption, MessageType, OptionCode};

/// DHCP magic cookie that identifies DHCP packets (vs BOOTP).
const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const DHCP_CHADDR_OFFSET: usize = 28;
const DHCP_SNAME_OFFSET: usize = DHCP_CHADDR_OFFSET + 16;
const DHCP_FILE_OFFSET: usize = DHCP_SNAME_OFFSET + 64;
const DHCP_MAGIC_COOKIE_OFFSET: usize = DHCP_FILE_OFFSET + 128;

/// Size of the fixed header portion including magic cookie.
const DHCP_FIXED_HEADER_SIZE: usize = DHCP_MAGIC_COOKIE_OFFSET + DHCP_MAGIC_COOKIE.len();

/// Replies are padded to this size for BOOTP relay compatibility.
const DHCP_MIN_PACKET_SIZE: usize = 300;

/// Prevents relay loops (RFC 2131 §4.1).
const MAX_HOPS: u8 = 16;

/// BOOTP/DHCP operation code for client requests.
pub const BOOTREQUEST: u8 = 1;

/// BOOTP/DHCP operation code for server replies.
pub const BOOTREPLY: u8 = 2;

/// Hardware type for Ethernet.
pub const HTYPE_ETHERNET: u8 = 1;

/// Hardware address length for Ethernet.
pub const HLEN_ETHERNET: u8 = 6;

/// A parsed DHCPv4 packet, request or reply.
#[derive(Debug, Clone)]
pub struct DhcpPacket {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    /// Transaction ID chosen by the client, echoed in replies.
    pub xid: u32,
    pub secs: u16,
    /// Bit 15 (0x8000) is the broadcast flag.
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    /// "Your" IP address: the address being assigned to the client.
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub sname: [u8; 64],
    pub file: [u8; 128],
    pub options: Vec<DhcpOption>,
}

impl DhcpPacket {
    /// Parses a DHCP packet from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] if the packet is shorter than the fixed
    /// header, the magic cookie is wrong, the hop count exceeds 16, an Ethernet
    /// hardware length is not 6, or an option is truncated or malformed.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < DHCP_FIXED_HEADER_SIZE {
            return Err(Error::InvalidPacket(format!(
                "Packet too short: {} bytes (minimum {})",
                data.len(),
                DHCP_FIXED_HEADER_SIZE
            )));
        }

        if data[DHCP_MAGIC_COOKIE_OFFSET..DHCP_FIXED_HEADER_SIZE] != DHCP_MAGIC_COOKIE {
            return Err(Error::InvalidPacket("Invalid magic cookie".to_string()));
        }

        let [op, htype, hlen, hops] = [data[0], data[1], data[2], data[3]];

        if hops > MAX_HOPS {
            return Err(Error::InvalidPacket(format!(
                "Hop count {} exceeds maximum {}",
                hops, MAX_HOPS
            )));
        }

        if htype == HTYPE_ETHERNET && hlen != HLEN_ETHERNET {
            return Err(Error::InvalidPacket(format!(
                "Invalid hlen {} for Ethernet (expected {})",
                hlen, HLEN_ETHERNET
            )));
        }

        let address_at = |offset: usize| {
            Ipv4Addr::new(
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            )
        };

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[DHCP_CHADDR_OFFSET..DHCP_SNAME_OFFSET]);
        let mut sname = [0u8; 64];
        sname.copy_from_slice(&data[DHCP_SNAME_OFFSET..DHCP_FILE_OFFSET]);
        let mut file = [0u8; 128];
        file.copy_from_slice(&data[DHCP_FILE_OFFSET..DHCP_MAGIC_COOKIE_OFFSET]);

        Ok(Self {
            op,
            htype,
            hlen,
            hops,
            xid: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            secs: u16::from_be_bytes([data[8], data[9]]),
            flags: u16::from_be_bytes([data[10], data[11]]),
            ciaddr: address_at(12),
            yiaddr: address_at(16),
            siaddr: address_at(20),
            giaddr: address_at(24),
            chaddr,
            sname,
            file,
            options: Self::parse_options(&data[DHCP_FIXED_HEADER_SIZE..])?,
        })
    }

    fn parse_options(data: &[u8]) -> Result<Vec<DhcpOption>> {
        let mut options = Vec::new();
        let mut index = 0;

        while index < data.len() {
            let code = data[index];

            if code == OptionCode::Pad as u8 {
                index += 1;
                continue;
            }

            if code == OptionCode::End as u8 {
                break;
            }

            let Some(&length) = data.get(index + 1) else {
                return Err(Error::InvalidPacket("Option length missing".to_string()));
            };

            let start = index + 2;
            let end = start + length as usize;
            let Some(option_data) = data.get(start..end) else {
                return Err(Error::InvalidPacket("Option data truncated".to_string()));
            };

            options.push(DhcpOption::parse(code, option_data)?);
            index = end;
        }

        Ok(options)
    }

    /// Encodes the packet to bytes, padded to at least 300 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(576);

        packet.extend_from_slice(&[self.op, self.htype, self.hlen, self.hops]);
        packet.extend_from_slice(&self.xid.to_be_bytes());
        packet.extend_from_slice(&self.secs.to_be_bytes());
        packet.extend_from_slice(&self.flags.to_be_bytes());
        for address in [self.ciaddr, self.yiaddr, self.siaddr, self.giaddr] {
            packet.extend_from_slice(&address.octets());
        }
        packet.extend_from_slice(&self.chaddr);
        packet.extend_from_slice(&self.sname);
        packet.extend_from_slice(&self.file);
        packet.extend_from_slice(&DHCP_MAGIC_COOKIE);

        for option in &self.options {
            packet.extend_from_slice(&option.encode());
        }
        packet.push(OptionCode::End as u8);

        if packet.len() < DHCP_MIN_PACKET_SIZE {
            packet.resize(DHCP_MIN_PACKET_SIZE, 0);
        }

        packet
    }

    /// Returns the first option with the given code.
    pub fn option(&self, code: OptionCode) -> Option<&DhcpOption> {
        self.options
            .iter()
            .find(|option| option.option_code() == code as u8)
    }

    /// Replaces every option with the same code, or appends it.
    pub fn update_option(&mut self, option: DhcpOption) {
        let code = option.option_code();
        match self.options.iter().position(|existing| existing.option_code() == code) {
            Some(position) => {
                self.options[position] = option;
                let mut index = 0;
                self.options.retain(|existing| {
                    let keep = index <= position || existing.option_code() != code;
                    index += 1;
                    keep
                });
            }
            None => self.options.push(option),
        }
    }

    /// Returns the DHCP message type (Option 53) if present.
    pub fn message_type(&self) -> Option<MessageType> {
        match self.option(OptionCode::MessageType) {
            Some(DhcpOption::MessageType(message_type)) => Some(*message_type),
            _ => None,
        }
    }

    /// Returns the parameter request list (Option 55) if present.
    pub fn parameter_request_list(&self) -> Option<&[u8]> {
        match self.option(OptionCode::ParameterRequestList) {
            Some(DhcpOption::ParameterRequestList(codes)) => Some(codes.as_slice()),
            _ => None,
        }
    }

    /// Returns true if the client listed `code` in its parameter request list.
    pub fn is_option_requested(&self, code: OptionCode) -> bool {
        self.parameter_request_list()
            .is_some_and(|codes| codes.contains(&(code as u8)))
    }

    /// Formats the client hardware address as `aa:bb:cc:dd:ee:ff`.
    pub fn format_mac(&self) -> String {
        let len = (self.hlen as usize).min(self.chaddr.len());
        self.chaddr[..len]
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        let message_type = self
            .message_type()
            .map(|message_type| message_type.to_string())
            .unwrap_or_else(|| "BOOTP".to_string());
        format!(
            "{} xid={:#010x} chaddr={} ciaddr={} yiaddr={} giaddr={}",
            message_type,
            self.xid,
            self.format_mac(),
            self.ciaddr,
            self.yiaddr,
            self.giaddr
        )
    }

    /// Creates a reply skeleton for `request`.
    ///
    /// Copies `xid`, `flags`, `giaddr`, `chaddr`, `htype` and `hlen`, and sets
    /// the message type as the first option.
    pub fn create_reply(request: &DhcpPacket, message_type: MessageType, server_ip: Ipv4Addr) -> Self {
        Self {
            op: BOOTREPLY,
            htype: request.htype,
            hlen: request.hlen,
            hops: 0,
            xid: request.xid,
            secs: 0,
            flags: request.flags,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: server_ip,
            giaddr: request.giaddr,
            chaddr: request.chaddr,
            sname: [0u8; 64],
            file: [0u8; 128],
            options: vec![DhcpOption::MessageType(message_type)],
        }
    }
}
