use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("specs-examples");
    path
}

const AGGREGATED: &str = r#"//go:build go1.18
// +build go1.18

package armfoo_test

import (
	"context"
	"log"

	"github.com/Azure/azure-sdk-for-go/sdk/azidentity"
	"github.com/Azure/azure-sdk-for-go/sdk/resourcemanager/foo/armfoo"
)

// Generated from example definition: https://github.com/Azure/azure-rest-api-specs/tree/main/specification/foo/resource-manager/Microsoft.Foo/stable/2022-01-01/examples/Foos_Get.json
func ExampleFoosClient_Get() {
	cred, err := azidentity.NewDefaultAzureCredential(nil)
	if err != nil {
		log.Fatalf("failed to obtain a credential: %v", err)
	}
	_, _ = armfoo.NewFoosClient("sub", cred, nil)
}

// Generated from example definition: https://github.com/Azure/azure-rest-api-specs/tree/main/specification/foo/resource-manager/Microsoft.Foo/stable/2022-01-01/examples/Foos_List.json
func ExampleFoosClient_NewListPager() {
	_ = context.Background()
}
"#;

const GO_MOD: &str = "module github.com/Azure/azure-sdk-for-go/sdk/resourcemanager/foo/armfoo\n\ngo 1.18\n\nrequire (\n\tgithub.com/Azure/azure-sdk-for-go/sdk/azcore v1.4.0\n\tgithub.com/Azure/azure-sdk-for-go/sdk/azidentity v1.2.2\n)\n";

/// A Go SDK checkout with one aggregated sample, a job JSON, and a config
/// whose `go` command is `go_command`.
fn setup(go_command: &str) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    let module = root.join("sdk/sdk/resourcemanager/foo/armfoo");
    fs::create_dir_all(&module).unwrap();
    fs::write(module.join("go.mod"), GO_MOD).unwrap();
    fs::write(module.join("ze_generated_example_foos_client_test.go"), AGGREGATED).unwrap();
    fs::write(module.join("client.go"), "package armfoo\n").unwrap();

    let input = serde_json::json!({
        "sdkPath": root.join("sdk"),
        "sdkExamplesPath": root.join("examples"),
        "tempPath": root.join("tmp"),
        "release": {
            "tag": "sdk/resourcemanager/foo/armfoo/v1.0.0",
            "package": "sdk/resourcemanager/foo/armfoo",
            "version": "1.0.0"
        }
    });
    let input_path = root.join("input.json");
    fs::write(&input_path, serde_json::to_string_pretty(&input).unwrap()).unwrap();

    let config_path = root.join("automation.toml");
    fs::write(
        &config_path,
        format!(
            "[toolchain]\ngo = {}\ngoimports = [\"true\"]\n",
            go_command
        ),
    )
    .unwrap();

    (tmp, input_path, config_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_report(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_extract_go_release() {
    let (tmp, input, config) = setup(r#"["true"]"#);
    let output = tmp.path().join("output.json");

    let (_, stderr, success) = run(
        &config,
        &[
            "extract",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--language",
            "go",
        ],
    );
    assert!(success, "extract failed: {}", stderr);

    let report = read_report(&output);
    assert_eq!(report["status"], "succeeded");
    assert_eq!(
        report["name"],
        "github.com/Azure/azure-sdk-for-go/sdk/resourcemanager/foo/armfoo@v1.0.0"
    );
    let dir = "specification/foo/resource-manager/Microsoft.Foo/stable/2022-01-01/examples-go";
    let files: Vec<&str> = report["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert_eq!(
        files,
        vec![
            format!("{}/Foos_Get.go", dir),
            format!("{}/Foos_Get.json", dir),
            format!("{}/Foos_List.go", dir),
            format!("{}/Foos_List.json", dir),
        ]
    );

    let examples = tmp.path().join("examples");
    let code = fs::read_to_string(examples.join(files[0])).unwrap();
    assert!(code.starts_with("//go:build go1.18\n"));
    assert!(code.contains("func ExampleFoosClient_Get() {"));
    assert!(!code.contains("NewListPager"));

    let metadata = read_report(&examples.join(files[1]));
    assert_eq!(
        metadata["sdkUrl"],
        "https://github.com/Azure/azure-sdk-for-go/blob/sdk%2Fresourcemanager%2Ffoo%2Farmfoo%2Fv1.0.0/sdk/resourcemanager/foo/armfoo/README.md"
    );
}

#[test]
fn test_extract_build_failure_emits_nothing() {
    // Every go subcommand succeeds except `go build`.
    let (tmp, input, config) = setup(r#"["sh", "-c", "test \"$1\" != build", "sh"]"#);
    let output = tmp.path().join("output.json");

    let (_, stderr, success) = run(
        &config,
        &[
            "extract",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--language",
            "go",
        ],
    );
    assert!(success, "report must still be written: {}", stderr);
    assert!(stderr.contains("ToolchainError"), "stderr: {}", stderr);

    let report = read_report(&output);
    assert_eq!(report["status"], "failed");
    assert!(report["files"].as_array().unwrap().is_empty());
    assert!(!tmp.path().join("examples").exists());
}

#[test]
fn test_extract_without_language_fails() {
    let (tmp, input, config) = setup(r#"["true"]"#);
    let output = tmp.path().join("output.json");

    let (_, _, success) = run(
        &config,
        &["extract", input.to_str().unwrap(), output.to_str().unwrap()],
    );
    assert!(success);
    let report = read_report(&output);
    assert_eq!(report["status"], "failed");
    assert_eq!(report["name"], "sdk/resourcemanager/foo/armfoo/v1.0.0");
}

#[test]
fn test_index_add_and_query() {
    let tmp = TempDir::new().unwrap();
    let index_dir = tmp.path().join("metadata");
    fs::create_dir_all(&index_dir).unwrap();
    let config = tmp.path().join("missing.toml");

    let report = tmp.path().join("output.json");
    fs::write(
        &report,
        r#"{"status": "succeeded", "name": "com.azure.resourcemanager:azure-resourcemanager-foo:1.0.0", "files": ["specification/foo/examples-java/A.java", "specification/foo/examples-java/A.json"]}"#,
    )
    .unwrap();

    let add = [
        "index",
        "add",
        "--index-dir",
        index_dir.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
        "--language",
        "java",
        "--tag",
        "azure-resourcemanager-foo_1.0.0",
        "--package",
        "azure-resourcemanager-foo",
        "--version",
        "1.0.0",
        "--date",
        "2023-04-05",
    ];
    let (stdout, stderr, success) = run(&config, &add);
    assert!(success, "index add failed: {}", stderr);
    assert!(stdout.contains("Recorded"));

    let releases = fs::read_to_string(index_dir.join("java-library-example-index.csv")).unwrap();
    assert_eq!(
        releases,
        "id,name,language,tag,package,version,date_epoch,date\n\
         1,com.azure.resourcemanager:azure-resourcemanager-foo:1.0.0,java,azure-resourcemanager-foo_1.0.0,azure-resourcemanager-foo,1.0.0,1680652800,04/05/2023\n"
    );
    let files = fs::read_to_string(index_dir.join("java-library-example-list.csv")).unwrap();
    assert_eq!(
        files,
        "id,file,release_id\n1,specification/foo/examples-java/A.java,1\n"
    );

    // Second run is a no-op.
    let (stdout, _, success) = run(&config, &add);
    assert!(success);
    assert!(stdout.contains("Already recorded"));
    assert_eq!(
        fs::read_to_string(index_dir.join("java-library-example-index.csv")).unwrap(),
        releases
    );

    let (stdout, _, success) = run(
        &config,
        &[
            "index",
            "query",
            "--index-dir",
            index_dir.to_str().unwrap(),
            "--language",
            "java",
        ],
    );
    assert!(success);
    assert_eq!(
        stdout.trim(),
        "azure-resourcemanager-foo_1.0.0\tazure-resourcemanager-foo\t1.0.0\t04/05/2023"
    );
}
