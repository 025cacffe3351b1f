use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn manoctl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_manoctl"))
}

#[test]
fn help_lists_lifecycle_subcommands() {
    let out = manoctl().arg("--help").output().expect("failed to run --help");
    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    for subcommand in ["ns-create", "ns-delete", "ns-action", "vnf-scale", "pdu-create"] {
        assert!(s.contains(subcommand), "help should mention {subcommand}: {s}");
    }
}

#[test]
fn version_flag_works() {
    manoctl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("manoctl"));
}

#[test]
fn ns_create_requires_descriptor_and_vim() {
    let out = manoctl()
        .args(["ns-create", "--ns-name", "demo"])
        .output()
        .expect("failed to run ns-create");
    // clap argument errors use exit code 2
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--nsd-id"), "stderr was: {stderr}");
    assert!(stderr.contains("--vim-account"), "stderr was: {stderr}");
}

#[test]
fn vnf_scale_requires_scaling_group() {
    let out = manoctl()
        .args(["vnf-scale", "my-ns", "--vnf-name", "1"])
        .output()
        .expect("failed to run vnf-scale");
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--scaling-group"), "stderr was: {stderr}");
}

#[test]
fn unknown_subcommand_is_rejected() {
    manoctl().arg("frobnicate").assert().code(2);
}

#[test]
fn unreachable_orchestrator_fails_authentication() {
    let mut descriptor = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(descriptor, "name: pdu-test\ntype: router").expect("write descriptor");

    let out = manoctl()
        .args(["--hostname", "http://127.0.0.1:1/osm", "pdu-create"])
        .arg(descriptor.path())
        .output()
        .expect("failed to run pdu-create");
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("authentication failed"), "stderr was: {stderr}");
}
