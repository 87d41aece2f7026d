//! Free-space probe for install destinations

use std::path::Path;

use sysinfo::Disks;

/// Available space in MiB on the volume holding `path`.
///
/// Picks the disk whose mount point is the longest prefix of the path.
/// Returns `None` when no disk matches (e.g. path outside any mount).
pub fn available_space_mb(path: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();

    let mut best: Option<(usize, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let depth = mount.components().count();
            if best.map(|(d, _)| depth > d).unwrap_or(true) {
                best = Some((depth, disk.available_space() / (1024 * 1024)));
            }
        }
    }
    best.map(|(_, mb)| mb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_volume_is_found() {
        // "/" is always mounted; the probe must resolve it
        let free = available_space_mb(Path::new("/"));
        assert!(free.is_some());
    }
}
