//! Integration tests exercising [`blockfs`] through its public API only,
//! against both the in-memory and the file-backed block devices.

use blockfs::{BlockDevice, EntryKind, FileBlockDevice, FileSystem, Geometry, MemoryBlockDevice, OpenFileRegistry};

fn with_both_devices(total_sectors: usize, body: impl Fn(&mut dyn BlockDevice)) {
    let mut memory = MemoryBlockDevice::new(total_sectors);
    body(&mut memory);

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut file = FileBlockDevice::create(tmp.path(), total_sectors).unwrap();
    body(&mut file);
}

#[test]
fn format_then_reopen_preserves_layout() {
    with_both_devices(64, |device| {
        let geometry = Geometry::new(64).unwrap();
        FileSystem::format(device, geometry).unwrap();

        let geometry = Geometry::new(64).unwrap();
        let fs = FileSystem::open_volume(device, geometry, false).unwrap();
        assert!(fs.list(device, "/", false).unwrap().is_empty());
    });
}

#[test]
fn nested_directories_list_with_full_paths() {
    with_both_devices(64, |device| {
        let geometry = Geometry::new(64).unwrap();
        let fs = FileSystem::format(device, geometry).unwrap();

        fs.create(device, "/docs", 0, true).unwrap();
        fs.create(device, "/docs/readme", 40, false).unwrap();
        fs.create(device, "/docs/notes", 40, false).unwrap();

        let top = fs.list(device, "/", false).unwrap();
        assert_eq!(top.len(), 1);
        assert!(top[0].kind.is_dir());

        let mut nested = fs.list(device, "/docs", false).unwrap();
        nested.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].path, "/docsnotes");
        assert_eq!(nested[1].path, "/docsreadme");

        let recursive = fs.list(device, "/", true).unwrap();
        assert_eq!(recursive.len(), 3);
    });
}

#[test]
fn remove_nonrecursive_on_nonempty_directory_leaves_children_orphaned_in_freemap() {
    with_both_devices(64, |device| {
        let geometry = Geometry::new(64).unwrap();
        let fs = FileSystem::format(device, geometry).unwrap();

        fs.create(device, "/docs", 0, true).unwrap();
        fs.create(device, "/docs/a", 10, false).unwrap();
        let child_sector = fs.open(device, "/docs/a").unwrap().header_sector();

        // Non-recursive remove only detaches the directory entry and frees
        // the directory's own header/data; it does not walk into it, so the
        // child's header sector stays marked allocated with no directory
        // entry pointing at it.
        fs.remove(device, "/docs", false).unwrap();
        assert!(fs.list(device, "/", false).unwrap().is_empty());
        assert!(fs.is_sector_allocated(device, child_sector).unwrap());
    });
}

#[test]
fn open_read_write_through_registry() {
    with_both_devices(32, |device| {
        let geometry = Geometry::new(32).unwrap();
        let fs = FileSystem::format(device, geometry).unwrap();
        fs.create(device, "/a", 128, false).unwrap();

        let mut registry = OpenFileRegistry::new();
        let id = fs.open_for_id(device, &mut registry, "/a").unwrap();

        let payload = b"hello blockfs";
        fs.write_by_id(device, &registry, id, 0, payload).unwrap();

        let mut out = vec![0u8; payload.len()];
        fs.read_by_id(device, &registry, id, 0, &mut out).unwrap();
        assert_eq!(&out, payload);

        assert_eq!(fs.close_by_id(&mut registry, id), 1);
        assert!(fs.read_by_id(device, &registry, id, 0, &mut out).is_err());
    });
}

#[test]
fn resolving_through_a_file_component_fails() {
    with_both_devices(32, |device| {
        let geometry = Geometry::new(32).unwrap();
        let fs = FileSystem::format(device, geometry).unwrap();
        fs.create(device, "/a", 10, false).unwrap();

        assert!(fs.create(device, "/a/b", 10, false).is_err());
        assert!(fs.list(device, "/a", false).is_err());
    });
}

#[test]
fn create_raw_and_remove_raw_report_success_as_booleans() {
    with_both_devices(32, |device| {
        let geometry = Geometry::new(32).unwrap();
        let fs = FileSystem::format(device, geometry).unwrap();

        assert_eq!(fs.create_raw(device, "/a", 10, false), 1);
        assert_eq!(fs.create_raw(device, "/a", 10, false), 0);
        assert!(fs.remove_raw(device, "/a", false));
        assert!(!fs.remove_raw(device, "/a", false));
    });
}

#[test]
fn deep_recursive_destroy_frees_every_sector() {
    with_both_devices(64, |device| {
        let geometry = Geometry::new(64).unwrap();
        let fs = FileSystem::format(device, geometry).unwrap();

        fs.create(device, "/a", 0, true).unwrap();
        fs.create(device, "/a/b", 0, true).unwrap();
        fs.create(device, "/a/b/c", 50, false).unwrap();

        let before = fs.list(device, "/", true).unwrap();
        assert_eq!(before.len(), 3);

        fs.remove(device, "/a", true).unwrap();
        assert!(fs.list(device, "/", false).unwrap().is_empty());

        // A fresh create after the recursive remove must succeed, which it
        // would not if any sector from the destroyed subtree leaked.
        fs.create(device, "/fresh", 10, false).unwrap();
        assert!(matches!(
            fs.list(device, "/", false).unwrap()[0].kind,
            EntryKind::File(_)
        ));
    });
}
