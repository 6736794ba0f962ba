//! Self-loop detection for frames read from the TAP.
//!
//! The transport's own UDP traffic can show up on the TAP when the host
//! routes through the bridged interface. Forwarding such a frame would send
//! transport packets through the transport itself, looping until the link
//! saturates. Before forwarding, every frame is checked for the signature
//! of that loop: an IPv4 or IPv6 UDP datagram whose source port is the
//! transport's own.
//!
//! Fragmented datagrams only carry the UDP header in the first fragment, so
//! later fragments cannot be checked and are treated as foreign. For IPv6
//! one Fragment extension header is unwrapped; other extension headers are
//! not parsed.

const ETHER_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: [u8; 2] = [0x08, 0x00];
const ETHERTYPE_IPV6: [u8; 2] = [0x86, 0xDD];
const PROTO_UDP: u8 = 0x11;
const IPV6_EXT_FRAGMENT: u8 = 44;
const IPV6_FIXED_HEADER_LEN: usize = 40;

/// Whether `frame` is a UDP datagram sent from the transport's own socket
/// (source port `udp_port`). Such frames must be dropped instead of
/// forwarded.
#[must_use]
pub fn is_own_transport_frame(frame: &[u8], udp_port: u16) -> bool {
    if frame.len() < ETHER_HEADER_LEN {
        return false;
    }

    match [frame[12], frame[13]] {
        ETHERTYPE_IPV4 => is_own_udp_ipv4(frame, udp_port),
        ETHERTYPE_IPV6 => is_own_udp_ipv6(frame, udp_port),
        _ => false,
    }
}

fn is_own_udp_ipv4(frame: &[u8], udp_port: u16) -> bool {
    if frame.len() < ETHER_HEADER_LEN + 10 {
        return false;
    }
    let ip = &frame[ETHER_HEADER_LEN..];

    if ip[9] != PROTO_UDP {
        return false;
    }

    // Only the first fragment carries the UDP header.
    let fragment_offset = u16::from(ip[6] & 0x1F) << 8 | u16::from(ip[7]);
    if fragment_offset != 0 {
        return false;
    }

    let ip_header_len = usize::from(ip[0] & 0x0F) * 4;
    let udp_offset = ETHER_HEADER_LEN + ip_header_len;
    if frame.len() < udp_offset + 2 {
        return false;
    }

    let port = u16::from_be_bytes([frame[udp_offset], frame[udp_offset + 1]]);
    port == udp_port
}

fn is_own_udp_ipv6(frame: &[u8], udp_port: u16) -> bool {
    let mut udp_offset = ETHER_HEADER_LEN + IPV6_FIXED_HEADER_LEN;
    if frame.len() < udp_offset {
        return false;
    }
    let ip = &frame[ETHER_HEADER_LEN..];

    if ip[6] == IPV6_EXT_FRAGMENT {
        // Fragment extension header: next-header, reserved, offset+flags,
        // identification. Only the first fragment (offset 0) shows the UDP
        // header. Further extension headers are not unwrapped.
        if frame.len() < udp_offset + 10 {
            return false;
        }
        let not_first = ip[42] != 0 || (ip[43] & 0xF8) != 0;
        if not_first {
            return false;
        }
        if ip[40] != PROTO_UDP {
            return false;
        }
        udp_offset += 8;
    } else if ip[6] != PROTO_UDP {
        return false;
    }

    if frame.len() < udp_offset + 2 {
        return false;
    }

    let port = u16::from_be_bytes([frame[udp_offset], frame[udp_offset + 1]]);
    port == udp_port
}
