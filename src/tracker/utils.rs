use crate::benc;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str;

pub(super) fn parse_binary_ipv4_peers(data: &[u8]) -> impl Iterator<Item = SocketAddr> + '_ {
    fn to_addr_and_port(src: &[u8]) -> Option<SocketAddr> {
        let (addr_data, port_data) = src.split_at(4);
        Some(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::from(u32::from_be_bytes(addr_data.try_into().ok()?))),
            u16::from_be_bytes(port_data.try_into().ok()?),
        ))
    }
    data.chunks_exact(6).filter_map(to_addr_and_port)
}

pub(super) fn parse_dictionary_peers(
    list: &[benc::Element],
) -> impl Iterator<Item = SocketAddr> + '_ {
    fn to_addr_and_port(e: &benc::Element) -> Option<SocketAddr> {
        let dict = e.as_dict().ok()?;
        let ip = dict.get(b"ip".as_slice())?.as_bytes().ok()?;
        let port = dict.get(b"port".as_slice())?.as_int().ok()?;
        Some(SocketAddr::new(parse_ip(ip)?, u16::try_from(port).ok()?))
    }
    list.iter().filter_map(to_addr_and_port)
}

// textual address, or 4 raw bytes from trackers that skip the conversion
fn parse_ip(data: &[u8]) -> Option<IpAddr> {
    match str::from_utf8(data).ok().and_then(|text| text.parse().ok()) {
        Some(ip) => Some(ip),
        None => {
            let octets: [u8; 4] = data.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
    }
}
