use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn test_cli_applies_descriptor_to_selection() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("page.html");
    let descriptor = dir.path().join("descriptor.json");
    fs::write(&page, r#"<ul><li class="item">a</li><li>b</li></ul>"#).unwrap();
    fs::write(
        &descriptor,
        r#"{"className": "item active", "contents": [" ", {"tag": "em", "contents": 1}]}"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bliss"))
        .arg(&page)
        .arg(&descriptor)
        .arg(".item")
        .env_remove("BLISS_CONFIG")
        .output()
        .expect("run bliss");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#"<li class="item active">a <em>1</em></li><li>b</li>"#));
}

#[test]
fn test_cli_rejects_non_object_descriptor() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("page.html");
    let descriptor = dir.path().join("descriptor.json");
    fs::write(&page, "<p></p>").unwrap();
    fs::write(&descriptor, "[1, 2]").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bliss"))
        .arg(&page)
        .arg(&descriptor)
        .output()
        .expect("run bliss");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("must contain a JSON object"));
}
