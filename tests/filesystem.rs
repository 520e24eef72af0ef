// tests/filesystem.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use dockyard::exec::current_user::{
    CreatedPath, UserAndGroup, create_current_user_files, group_contents, passwd_contents,
};
use dockyard::exec::proxy::proxy_environment_variables;
use dockyard::fs::FileSystem;
use dockyard::fs::mock::{MockEntry, MockFileSystem};

fn alice() -> UserAndGroup {
    UserAndGroup {
        user_id: 1000,
        user_name: "alice".to_string(),
        group_id: 1001,
        group_name: "staff".to_string(),
    }
}

fn root() -> UserAndGroup {
    UserAndGroup {
        user_id: 0,
        user_name: "root".to_string(),
        group_id: 0,
        group_name: "root".to_string(),
    }
}

#[test]
fn mock_filesystem_tracks_files_and_directories() {
    let fs = MockFileSystem::new();

    fs.write(Path::new("/tmp/run/config"), b"hello").unwrap();

    assert_eq!(fs.read_to_string(Path::new("/tmp/run/config")).unwrap(), "hello");
    assert_eq!(fs.entry("/tmp/run"), Some(MockEntry::Dir));
    assert!(fs.remove_file(Path::new("/tmp/run")).is_err());

    fs.remove_dir_all(Path::new("/tmp/run")).unwrap();
    assert!(!fs.exists(Path::new("/tmp/run/config")));
    assert!(fs.exists(Path::new("/tmp")));
}

#[test]
fn mock_filesystem_can_refuse_deletion() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/locked", "x");
    fs.make_undeletable("/tmp/locked");

    let err = fs.remove_file(Path::new("/tmp/locked")).unwrap_err();

    assert!(err.to_string().contains("Permission denied"));
    assert!(fs.exists(Path::new("/tmp/locked")));
}

#[test]
fn passwd_and_group_include_the_host_user() {
    assert_eq!(
        passwd_contents(&alice(), "/home/app"),
        "root:x:0:0:root:/root:/bin/sh\nalice:x:1000:1001:alice:/home/app:/bin/sh\n"
    );
    assert_eq!(group_contents(&alice()), "root:x:0:root\nstaff:x:1001:alice\n");
    assert_eq!(alice().docker_user(), "1000:1001");
}

#[test]
fn root_user_gets_only_root_entries() {
    assert_eq!(passwd_contents(&root(), "/home/app"), "root:x:0:0:root:/home/app:/bin/sh\n");
    assert_eq!(group_contents(&root()), "root:x:0:root\n");
}

#[test]
fn current_user_files_are_created_and_reported() {
    let fs = MockFileSystem::new();
    let mut created = Vec::new();

    let files = create_current_user_files(&fs, "shop-app-1234", &alice(), "/home/app", |path| {
        created.push(path)
    })
    .unwrap();

    assert_eq!(files.passwd_file, PathBuf::from("/tmp/shop-app-1234-passwd"));
    assert_eq!(
        created,
        [
            CreatedPath::File(PathBuf::from("/tmp/shop-app-1234-passwd")),
            CreatedPath::File(PathBuf::from("/tmp/shop-app-1234-group")),
            CreatedPath::Directory(PathBuf::from("/tmp/shop-app-1234-home")),
        ]
    );
    assert_eq!(fs.entry("/tmp/shop-app-1234-home"), Some(MockEntry::Dir));
    assert!(
        fs.read_to_string(&files.group_file)
            .unwrap()
            .contains("staff:x:1001:alice")
    );

    assert_eq!(
        files.volume_arguments("/home/app"),
        [
            "--volume",
            "/tmp/shop-app-1234-passwd:/etc/passwd:ro",
            "--volume",
            "/tmp/shop-app-1234-group:/etc/group:ro",
            "--volume",
            "/tmp/shop-app-1234-home:/home/app:delegated",
        ]
    );
}

#[test]
fn proxy_variables_are_copied_in_both_cases() {
    let host: BTreeMap<&str, &str> = BTreeMap::from([
        ("http_proxy", "http://proxy:3128"),
        ("HTTPS_PROXY", "http://secure-proxy:3128"),
        ("PATH", "/usr/bin"),
    ]);

    let variables = proxy_environment_variables(
        |name| host.get(name).map(|v| v.to_string()),
        &BTreeSet::new(),
    );

    assert_eq!(
        variables,
        BTreeMap::from([
            ("HTTPS_PROXY".to_string(), "http://secure-proxy:3128".to_string()),
            ("http_proxy".to_string(), "http://proxy:3128".to_string()),
        ])
    );
}

#[test]
fn no_proxy_is_extended_with_container_names() {
    let extra = BTreeSet::from(["cache".to_string(), "db".to_string()]);

    let variables = proxy_environment_variables(
        |name| match name {
            "no_proxy" => Some("localhost".to_string()),
            "NO_PROXY" => Some(String::new()),
            _ => None,
        },
        &extra,
    );

    assert_eq!(variables["no_proxy"], "localhost,cache,db");
    assert_eq!(variables["NO_PROXY"], "cache,db");
}
