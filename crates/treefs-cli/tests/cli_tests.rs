use std::io::Write;

use tempfile::TempDir;
use treefs_cli::shell::{Shell, ShellCommand, ShellLine};
use treefs_cli::store::SessionStore;
use treefs_cli::{Cli, Parser};
use treefs_core::FsConfig;

#[test]
fn test_cli_parsing_defaults() {
    let cli = Cli::try_parse_from(["treefs"]).unwrap();
    assert!(cli.config.is_none());
    assert_eq!(cli.state_dir, std::path::PathBuf::from("."));
    assert!(cli.log_level.is_none());
    assert_eq!(cli.load_config().unwrap(), FsConfig::default());
}

#[test]
fn test_cli_parsing_options() {
    let args = vec!["treefs", "--state-dir", "/var/lib/treefs", "--log-level", "treefs_core=debug"];

    let cli = Cli::try_parse_from(args).unwrap();
    assert_eq!(cli.state_dir, std::path::PathBuf::from("/var/lib/treefs"));
    assert_eq!(cli.log_level.as_deref(), Some("treefs_core=debug"));
}

#[test]
fn test_cli_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{ "limits": {{ "max_symlink_hops": 4 }} }}"#).unwrap();

    let cli = Cli::try_parse_from(["treefs", "--config", path.to_str().unwrap()]).unwrap();
    let config = cli.load_config().unwrap();
    assert_eq!(config.limits.max_symlink_hops, 4);

    std::fs::write(&path, "not json").unwrap();
    assert!(cli.load_config().is_err());
}

#[test]
fn test_shell_line_parsing_ln() {
    let line = ShellLine::try_parse_from(["ln", "-s", "/docs/x.txt", "/link"]).unwrap();
    assert!(matches!(line.command, ShellCommand::Ln { ref target, ref link, .. }
        if target == "/docs/x.txt" && link == "/link"));
}

#[test]
fn test_shell_line_parsing_stat() {
    let line = ShellLine::try_parse_from(["stat", "--no-follow", "/link"]).unwrap();
    assert!(matches!(line.command, ShellCommand::Stat { no_follow: true, .. }));
}

#[test]
fn test_symlink_hop_limit_from_config() {
    let dir = TempDir::new().unwrap();
    let mut config = FsConfig::default();
    config.limits.max_symlink_hops = 2;
    let mut shell = Shell::new(config, SessionStore::new(dir.path()));

    let input = b"write /f x\nln -s /f /l1\nln -s /l1 /l2\nln -s /l2 /l3\ncat /l2\ncat /l3\n";
    let mut out = Vec::new();
    shell.run(&input[..], &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("x\n"));
    assert!(text.contains("error: cat: /l3: too many levels of symbolic links"));
}

#[test]
fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();

    let mut first = Shell::new(FsConfig::default(), SessionStore::new(dir.path()));
    let script = b"mkdir /proj\nwrite /proj/readme hello\nuseradd dev -G staff\ncd /proj\nsave snap\n";
    first.run(&script[..], Vec::new()).unwrap();
    assert!(dir.path().join(".snap.treefs").exists());

    let mut second = Shell::new(FsConfig::default(), SessionStore::new(dir.path()));
    let mut out = Vec::new();
    second.run(&b"load snap\npwd\ncat readme\nusers\n"[..], &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("/proj\n"));
    assert!(text.contains("hello\n"));
    assert!(text.contains("dev (uid: 1000, groups: staff,users)"));
}
