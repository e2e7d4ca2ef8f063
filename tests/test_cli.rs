
use fixtures::*;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn gpt_dump() -> Command {
    Command::new(assert_cmd::cargo_bin!("gpt_dump"))
}

#[test]
fn test_it_prints_text_summary() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk.img", &sample_image(512));

    let mut cmd = gpt_dump();
    cmd.arg(&image);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Signature                 'EFI PART'"))
        .stdout(predicate::str::contains("Revision                  1.0"))
        .stdout(predicate::str::contains(DISK_GUID))
        .stdout(predicate::str::contains("EFI System Partition"))
        .stdout(predicate::str::contains("(valid)"))
        .stdout(predicate::str::contains("INVALID").not());
}

#[test]
fn test_it_prints_json() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk.img", &sample_image(512));

    let output = gpt_dump()
        .args(["-o", "json"])
        .arg(&image)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["header_crc"]["valid"], true);
    assert_eq!(value["part_array_crc"]["valid"], true);
    assert_eq!(value["header"]["disk_guid"], DISK_GUID);
    // Unused slots are filtered out unless asked for.
    assert_eq!(value["entries"].as_array().unwrap().len(), 2);
    assert_eq!(value["entries"][0]["unique_uuid"], ESP_UNIQUE);
    assert_eq!(value["entries"][1]["name"], "root");
}

#[test]
fn test_it_prints_all_entries_when_asked() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk.img", &sample_image(512));

    let output = gpt_dump()
        .args(["-o", "json", "--all-entries"])
        .arg(&image)
        .output()
        .unwrap();

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["entries"].as_array().unwrap().len(), 128);
}

#[test]
fn test_it_honors_block_size() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk4k.img", &sample_image(4096));

    gpt_dump()
        .args(["-b", "4096"])
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("block size 4096"));

    // LBA 1 at 512 bytes is inside the protective MBR block.
    gpt_dump()
        .arg(&image)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid GPT header signature"));
}

#[test]
fn test_it_rejects_invalid_block_size() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk.img", &sample_image(512));

    gpt_dump()
        .args(["-b", "1000"])
        .arg(&image)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("power of two"));
}

#[test]
fn test_bad_header_checksum_exits_with_2() {
    let d = tempdir().unwrap();
    let mut raw = sample_image(512);
    raw[header_offset(512) + 16] ^= 0xFF;
    let image = write_image(d.path(), "disk.img", &raw);

    gpt_dump()
        .arg(&image)
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("INVALID"));
}

#[test]
fn test_bad_array_checksum_can_be_allowed() {
    let d = tempdir().unwrap();
    let mut raw = sample_image(512);
    raw[array_offset(512) + 56] = b'X';
    let image = write_image(d.path(), "disk.img", &raw);

    gpt_dump().arg(&image).assert().failure().code(2);

    gpt_dump()
        .arg("--allow-bad-checksums")
        .arg(&image)
        .assert()
        .success();
}

#[test]
fn test_missing_input_fails() {
    let d = tempdir().unwrap();

    gpt_dump()
        .arg(d.path().join("nope.img"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to open input"));
}

#[test]
fn it_respects_file_output() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk.img", &sample_image(512));
    let f = d.path().join("out").join("report.json");

    let mut cmd = gpt_dump();
    cmd.args(["-o", "json", "-f", &f.to_string_lossy()]).arg(&image);

    assert!(
        cmd.output().unwrap().stdout.is_empty(),
        "Expected output to be printed to file, but was printed to stdout"
    );

    let written = fs::read_to_string(&f).unwrap();
    assert!(written.contains(DISK_GUID), "Expected output to be printed to file");
}

#[test]
fn test_it_refuses_to_overwrite_directory() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk.img", &sample_image(512));

    gpt_dump()
        .args(["-f", &d.path().to_string_lossy()])
        .arg(&image)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_it_overwrites_file_anyways_if_passed_flag() {
    let d = tempdir().unwrap();
    let image = write_image(d.path(), "disk.img", &sample_image(512));
    let f = d.path().join("test.out");

    let mut file = File::create(&f).unwrap();
    file.write_all(b"I'm a file!").unwrap();

    gpt_dump()
        .args(["-f", &f.to_string_lossy(), "--no-confirm-overwrite"])
        .arg(&image)
        .assert()
        .success();

    let written = fs::read_to_string(&f).unwrap();
    assert!(written.contains("Primary GPT Header"));
    assert!(!written.contains("I'm a file!"));
}
