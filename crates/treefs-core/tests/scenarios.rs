//! End-to-end scenarios exercising resolution, mutation and snapshots together.

use std::fs;

use treefs_core::{FsCore, FsError, Identity, Mode, NodeType, SessionContext};

fn root_session() -> (FsCore, SessionContext) {
    let fs = FsCore::default();
    let ctx = fs.session(Identity::root());
    (fs, ctx)
}

#[test]
fn test_docs_lifecycle() {
    let (mut fs, ctx) = root_session();

    fs.create_directory(&ctx, "/docs").unwrap();
    fs.write_file(&ctx, "/docs/x.txt", "hi").unwrap();
    assert_eq!(fs.read_file(&ctx, "/docs/x.txt").unwrap(), "hi");
    fs.delete(&ctx, "/docs/x.txt").unwrap();
    assert_eq!(fs.read_file(&ctx, "/docs/x.txt"), Err(FsError::NotFound));
}

#[test]
fn test_non_root_write_denied_root_allowed() {
    let (mut fs, ctx) = root_session();
    fs.create_file(&ctx, "/root_owned_file.txt", "original").unwrap();
    fs.chmod(&ctx, "/root_owned_file.txt", Mode::from_bits(0o644).unwrap()).unwrap();

    let alice = fs.session(Identity::user("alice", vec!["users".to_string()]));
    assert_eq!(
        fs.write_file(&alice, "/root_owned_file.txt", "hacked"),
        Err(FsError::PermissionDenied)
    );
    assert_eq!(fs.read_file(&ctx, "/root_owned_file.txt").unwrap(), "original");

    // Root ignores the bits entirely.
    fs.chmod(&ctx, "/root_owned_file.txt", Mode::from_bits(0o000).unwrap()).unwrap();
    fs.write_file(&ctx, "/root_owned_file.txt", "updated").unwrap();
    assert_eq!(fs.read_file(&ctx, "/root_owned_file.txt").unwrap(), "updated");
}

#[test]
fn test_symlink_to_file() {
    let (mut fs, ctx) = root_session();
    fs.create_directory(&ctx, "/docs").unwrap();
    fs.write_file(&ctx, "/docs/x.txt", "content").unwrap();
    fs.create_symlink(&ctx, "/docs/x.txt", "/docs/link").unwrap();

    assert_eq!(
        fs.read_file(&ctx, "/docs/link").unwrap(),
        fs.read_file(&ctx, "/docs/x.txt").unwrap()
    );

    // Writes through the link land on the target.
    fs.write_file(&ctx, "/docs/link", "via link").unwrap();
    assert_eq!(fs.read_file(&ctx, "/docs/x.txt").unwrap(), "via link");

    fs.delete(&ctx, "/docs/link").unwrap();
    assert_eq!(fs.read_file(&ctx, "/docs/x.txt").unwrap(), "via link");
}

#[test]
fn test_link_lifecycle_dangling_to_resolvable_and_back() {
    let (mut fs, ctx) = root_session();
    fs.create_symlink(&ctx, "/later/file", "/early").unwrap();
    assert!(matches!(fs.read_file(&ctx, "/early"), Err(FsError::DanglingLink { .. })));

    fs.create_directory(&ctx, "/later").unwrap();
    fs.write_file(&ctx, "/later/file", "now here").unwrap();
    assert_eq!(fs.read_file(&ctx, "/early").unwrap(), "now here");

    fs.delete(&ctx, "/later/file").unwrap();
    assert!(matches!(fs.read_file(&ctx, "/early"), Err(FsError::DanglingLink { .. })));
    assert_eq!(fs.metadata(&ctx, "/early", false).unwrap().kind, NodeType::Symlink);
}

#[test]
fn test_symlink_cycle_terminates() {
    let (mut fs, ctx) = root_session();
    fs.create_symlink(&ctx, "/b", "/a").unwrap();
    fs.create_symlink(&ctx, "/a", "/b").unwrap();
    assert_eq!(fs.read_file(&ctx, "/a"), Err(FsError::SymlinkLoop));
    assert_eq!(fs.list_directory(&ctx, "/b"), Err(FsError::SymlinkLoop));
    assert_eq!(fs.read_link(&ctx, "/a").unwrap(), "/b");
}

#[test]
fn test_absolute_resolution_independent_of_cwd() {
    let (mut fs, mut ctx) = root_session();
    fs.create_directory(&ctx, "/a").unwrap();
    fs.create_directory(&ctx, "/a/b").unwrap();
    fs.write_file(&ctx, "/a/b/f", "x").unwrap();

    let expected = fs.resolve(&ctx, "/a/b/f", true).unwrap();
    for dir in ["/a", "/a/b", "/"] {
        fs.change_directory(&mut ctx, dir).unwrap();
        assert_eq!(fs.resolve(&ctx, "/a/b/f", true).unwrap(), expected);
    }
}

#[test]
fn test_dotdot_at_root_for_any_actor() {
    let (mut fs, _) = root_session();
    let nobody = fs.session(Identity::user("nobody", vec![]));
    let root = fs.root();
    assert_eq!(fs.resolve(&nobody, "..", true).unwrap(), root);
    assert_eq!(fs.resolve(&nobody, "../..", true).unwrap(), root);
}

#[test]
fn test_deleted_cwd_reports_not_found() {
    let (mut fs, mut ctx) = root_session();
    fs.create_directory(&ctx, "/tmp").unwrap();
    fs.change_directory(&mut ctx, "/tmp").unwrap();
    let root_ctx = fs.session(Identity::root());
    fs.delete(&root_ctx, "/tmp").unwrap();
    assert!(!fs.contains(ctx.cwd));
    assert_eq!(fs.read_file(&ctx, "anything"), Err(FsError::NotFound));
    // Absolute paths still work.
    assert!(fs.list_directory(&ctx, "/").is_ok());
}

#[test]
fn test_snapshot_round_trip_through_file() {
    let (mut fs, ctx) = root_session();
    fs.create_directory(&ctx, "/docs").unwrap();
    fs.write_file(&ctx, "/docs/x.txt", "persist me").unwrap();
    fs.chmod(&ctx, "/docs/x.txt", Mode::from_bits(0o600).unwrap()).unwrap();
    fs.create_symlink(&ctx, "docs/x.txt", "/shortcut").unwrap();
    let before = fs.metadata(&ctx, "/docs/x.txt", true).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, fs.serialize().unwrap()).unwrap();

    let mut restored = FsCore::default();
    restored.restore(&fs::read(&path).unwrap()).unwrap();
    let ctx = restored.session(Identity::root());

    assert_eq!(restored.metadata(&ctx, "/docs/x.txt", true).unwrap(), before);
    assert_eq!(restored.read_link(&ctx, "/shortcut").unwrap(), "docs/x.txt");
    assert_eq!(restored.read_file(&ctx, "/shortcut").unwrap(), "persist me");
}

#[test]
fn test_deep_tree_survives_restore() {
    let (mut fs, ctx) = root_session();
    let mut path = String::new();
    for depth in 0..200 {
        path.push_str(&format!("/d{depth}"));
        fs.create_directory(&ctx, &path).unwrap();
    }
    let leaf = format!("{path}/leaf.txt");
    fs.write_file(&ctx, &leaf, "bottom").unwrap();

    let bytes = fs.serialize().unwrap();
    let mut restored = FsCore::default();
    restored.restore(&bytes).unwrap();
    let ctx = restored.session(Identity::root());
    assert_eq!(restored.read_file(&ctx, &leaf).unwrap(), "bottom");
    assert_eq!(restored.tree().len(), fs.tree().len());
}

#[test]
fn test_find_style_enumeration() {
    let (mut fs, ctx) = root_session();
    fs.create_directory(&ctx, "/src").unwrap();
    fs.write_file(&ctx, "/src/main.rs", "fn main() {}").unwrap();
    fs.write_file(&ctx, "/src/lib.rs", "pub mod x;").unwrap();

    let files: Vec<String> = fs
        .walk(&ctx, "/src")
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == NodeType::File)
        .map(|e| e.path)
        .collect();
    assert_eq!(files, vec!["/src/lib.rs", "/src/main.rs"]);
}
