use super::LocalAddr;

pub(crate) fn get_all_ip_addresses() -> Vec<LocalAddr> {
    let mut addrs = Vec::new();
    for iface in pnet_datalink::interfaces() {
        for ip in iface.ips {
            addrs.push(LocalAddr {
                ip: ip.ip(),
                prefix_len: ip.prefix(),
            });
        }
    }
    addrs
}
