use std::process::Command;

fn topdf() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_topdf"));
    cmd.env_remove("TOPDF_LOAD_IMAGES").env_remove("WK_LOAD_IMG");
    cmd
}

#[test]
fn dump_config_reflects_cli_flags() {
    let out = topdf()
        .args(["--dump-config", "--load-images", "--pdf-engine", "lualatex"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("html_load_images = true"));
    assert!(text.contains("pdf_engine = \"lualatex\""));
    assert!(text.contains("[timeouts]"));
}

#[test]
fn text_mode_hands_off_without_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.md");
    std::fs::write(&input, "# Notes\n").unwrap();

    let out = topdf()
        .args(["run", "--mode", "text"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["outcome"], "handoff");
    assert_eq!(summary["mode"], "text");
    assert_eq!(summary["format"], "md");
    assert!(summary["conversion"].is_null());
}

#[test]
fn topdf_mode_with_scripted_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.html");
    std::fs::write(&input, "<p>hi</p>").unwrap();
    let config = dir.path().join("topdf.toml");
    std::fs::write(
        &config,
        "[commands]\nhtml = \"printf '%%PDF-1.4\\\\n%%%%EOF\\\\n' > {output}\"\n",
    )
    .unwrap();
    let kept = dir.path().join("page.pdf");

    let out = topdf()
        .arg("--config")
        .arg(&config)
        .args(["run", "--mode", "topdf", "-o"])
        .arg(&kept)
        .arg(&input)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["outcome"], "pdf");
    assert!(summary["pdf_base64"].as_str().unwrap().starts_with("JVBERi0"));
    assert!(std::fs::read(&kept).unwrap().starts_with(b"%PDF-"));
}

#[test]
fn convert_from_flag_covers_missing_extension() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("README");
    std::fs::write(&input, "# Readme\n").unwrap();
    let config = dir.path().join("topdf.toml");
    std::fs::write(
        &config,
        "[commands]\nmarkdown = \"printf '%%PDF-1.4\\\\n%%%%EOF\\\\n' > {output}\"\n",
    )
    .unwrap();
    let out_dir = dir.path().join("out");

    let out = topdf()
        .arg("--config")
        .arg(&config)
        .args(["convert", "--from", "md", "-o"])
        .arg(&out_dir)
        .arg(&input)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(std::fs::read(out_dir.join("README.pdf"))
        .unwrap()
        .starts_with(b"%PDF-"));
}

#[test]
fn unknown_mode_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.md");
    std::fs::write(&input, "x").unwrap();

    let out = topdf()
        .args(["run", "--mode", "vision"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Unsupported mode"));
}

#[test]
fn convert_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sheet.xlsx");
    std::fs::write(&input, "x").unwrap();

    let out = topdf()
        .args(["convert", "-o"])
        .arg(dir.path())
        .arg(&input)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("conversion(s) failed"));
}
