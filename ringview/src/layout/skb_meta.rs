//! Packet metadata record emitted once per processed packet.

use bytemuck::{ Pod, Zeroable };

use super::Record;

/// 64-byte packet metadata, 8-byte aligned, no implicit padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SkbMeta {
    /// Kernel address of the socket buffer the record was taken from
    pub address: u64,
    pub len: u32,
    pub pkt_type: u32,
    pub mark: u32,
    pub priority: u32,
    pub ingress_ifindex: u32,
    pub ifindex: u32,
    pub queue_mapping: u16,
    pub protocol: u16,
    pub vlan_present: u16,
    pub vlan_tci: u16,
    pub vlan_proto: u16,
    pub tc_index: u16,
    /// Control buffer scratch words
    pub cb: [u32; 5],
}

impl Record for SkbMeta {
    #[inline]
    fn fold(&self) -> u64 {
        let mut s = self.address;
        s = s.wrapping_add(self.len as u64);
        s = s.wrapping_add(self.pkt_type as u64);
        s = s.wrapping_add(self.mark as u64);
        s = s.wrapping_add(self.queue_mapping as u64);
        s = s.wrapping_add(self.protocol as u64);
        s = s.wrapping_add(self.vlan_present as u64);
        s = s.wrapping_add(self.vlan_tci as u64);
        s = s.wrapping_add(self.vlan_proto as u64);
        s = s.wrapping_add(self.priority as u64);
        s = s.wrapping_add(self.ingress_ifindex as u64);
        s = s.wrapping_add(self.ifindex as u64);
        s = s.wrapping_add(self.tc_index as u64);
        for v in self.cb {
            s = s.wrapping_add(v as u64);
        }
        s
    }
}
