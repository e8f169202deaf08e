use tempfile::tempdir;

use wgkeeper::config::{ConfigRepository, TunnelConfig, DEMO_TUNNEL_NAME};
use wgkeeper::error::VpnError;

const OFFICE_CONF: &str = "\
[Interface]
PrivateKey = cFff9SJ2XvDF8BpCWh1nYRozu7Lk6eUzVyBPQJ+mC2E=
Address = 10.0.0.2/32
DNS = 1.1.1.1

[Peer]
PublicKey = HIgo9xNzJMWLKASShiTqIybxZ0U3wGLiUeJ1PKf8ykw=
AllowedIPs = 0.0.0.0/0
Endpoint = vpn.example.org:51820
PersistentKeepalive = 25
";

#[test]
fn round_trip_preserves_every_field() {
    let parsed = TunnelConfig::parse("office", OFFICE_CONF).unwrap();
    let reparsed = TunnelConfig::parse("office", &parsed.to_conf()).unwrap();
    assert_eq!(parsed, reparsed);
    assert_eq!(reparsed.persistent_keepalive, Some(25));
}

#[test]
fn round_trip_without_keepalive() {
    let text = OFFICE_CONF
        .lines()
        .filter(|l| !l.starts_with("PersistentKeepalive"))
        .collect::<Vec<_>>()
        .join("\n");
    let parsed = TunnelConfig::parse("office", &text).unwrap();
    assert_eq!(parsed.persistent_keepalive, None);

    let reparsed = TunnelConfig::parse("office", &parsed.to_conf()).unwrap();
    assert_eq!(parsed, reparsed);
}

#[test]
fn list_is_empty_for_a_fresh_directory() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    assert!(repo.list_tunnels().unwrap().is_empty());
}

#[test]
fn demo_bootstrap_creates_exactly_one_config() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();

    let private = "cFff9SJ2XvDF8BpCWh1nYRozu7Lk6eUzVyBPQJ+mC2E=";
    assert!(repo.ensure_demo_config(private).unwrap());
    assert_eq!(repo.list_tunnels().unwrap(), vec![DEMO_TUNNEL_NAME]);

    let demo = repo.read(DEMO_TUNNEL_NAME).unwrap();
    assert_eq!(demo.private_key, private);
    assert_eq!(demo.peer_public_key, "SERVER_PUBLIC_KEY_HERE");

    // Second call must not create or overwrite anything.
    assert!(!repo.ensure_demo_config("DIFFERENT_KEY=").unwrap());
    assert_eq!(repo.read(DEMO_TUNNEL_NAME).unwrap().private_key, private);
}

#[test]
fn demo_bootstrap_skips_populated_directories() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    repo.write("office", OFFICE_CONF).unwrap();

    assert!(!repo.ensure_demo_config("KEY=").unwrap());
    assert_eq!(repo.list_tunnels().unwrap(), vec!["office"]);
}

#[test]
fn demo_bootstrap_never_overwrites_a_malformed_demo() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();

    // A half-edited demo: Endpoint lost its port, so it no longer parses
    // and the lister skips it. It is still the user's file.
    let corrupted = "[Peer]\nEndpoint = vpn.example.org\n";
    repo.write(DEMO_TUNNEL_NAME, corrupted).unwrap();
    assert!(repo.list_tunnels().unwrap().is_empty());

    assert!(!repo.ensure_demo_config("NEW_KEY=").unwrap());
    let on_disk = std::fs::read_to_string(repo.path_for(DEMO_TUNNEL_NAME)).unwrap();
    assert_eq!(on_disk, corrupted);
}

#[test]
fn malformed_endpoint_is_a_parse_error_and_skipped_by_the_lister() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    repo.write("office", OFFICE_CONF).unwrap();
    repo.write("broken", "[Peer]\nEndpoint = vpn.example.org\n")
        .unwrap();

    assert!(matches!(
        repo.read("broken"),
        Err(VpnError::ConfigParse { .. })
    ));
    assert_eq!(repo.list_tunnels().unwrap(), vec!["office"]);
}

#[test]
fn delete_of_a_missing_tunnel_is_config_not_found() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    assert!(matches!(
        repo.delete("ghost"),
        Err(VpnError::ConfigNotFound(name)) if name == "ghost"
    ));
}

#[test]
fn write_replaces_content_wholesale() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    repo.write("office", OFFICE_CONF).unwrap();

    let mut changed = repo.read("office").unwrap();
    changed.dns = vec!["9.9.9.9".to_string()];
    repo.write_config(&changed).unwrap();

    let reread = repo.read("office").unwrap();
    assert_eq!(reread.dns, vec!["9.9.9.9"]);
    assert_eq!(reread.private_key, changed.private_key);
}

#[test]
fn import_validates_and_sanitizes() {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();

    let name = repo.import_config(OFFICE_CONF, "My Office.conf").unwrap();
    assert_eq!(name, "My-Office");
    assert!(repo.read(&name).is_ok());

    // Same name again is rejected, not clobbered.
    assert!(matches!(
        repo.import_config(OFFICE_CONF, "My Office.conf"),
        Err(VpnError::ConfigExists(name)) if name == "My-Office"
    ));

    // Unparseable text never reaches the disk.
    assert!(repo
        .import_config("[Peer]\nEndpoint = no-port-here\n", "bad")
        .is_err());
    assert!(!repo.path_for("bad").exists());
}

#[cfg(unix)]
#[test]
fn config_files_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    repo.write("office", OFFICE_CONF).unwrap();

    let mode = std::fs::metadata(repo.path_for("office"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
