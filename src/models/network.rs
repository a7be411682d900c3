// Network counter, interface, and connection record shapes

use serde::{Deserialize, Serialize};

/// Cumulative I/O counters since boot, global or per interface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetIoRecord {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

impl NetIoRecord {
    pub fn add(&mut self, other: &NetIoRecord) {
        self.bytes_sent += other.bytes_sent;
        self.bytes_recv += other.bytes_recv;
        self.packets_sent += other.packets_sent;
        self.packets_recv += other.packets_recv;
        self.errin += other.errin;
        self.errout += other.errout;
        self.dropin += other.dropin;
        self.dropout += other.dropout;
    }
}

/// One address bound to an interface. `family` is "inet", "inet6" or
/// "link" (MAC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfAddrRecord {
    pub family: String,
    pub address: String,
    pub prefix: Option<u8>,
}

/// Link-level interface state. `speed` is bits per second, 0 when the
/// platform does not report it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IfStatsRecord {
    pub isup: bool,
    pub speed: u64,
    pub mtu: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddrPort {
    pub ip: String,
    pub port: u16,
}

/// One active socket. `family` is "inet"/"inet6", `r#type` is "tcp"/"udp",
/// `status` follows the kernel TCP state names ("LISTEN", "ESTABLISHED",
/// ...); "NONE" for UDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub family: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub laddr: AddrPort,
    pub raddr: Option<AddrPort>,
    pub status: String,
}
