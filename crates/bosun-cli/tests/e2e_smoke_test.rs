use std::{fs, path::PathBuf};

use tempfile::tempdir;

use bosun_cli::{Args, Command, run};

/// Collects all .bosun files from a directory
fn collect_bosun_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("bosun")
            })
            .collect()
    } else {
        Vec::new()
    };

    // Sort for consistent test output
    files.sort();
    files
}

/// Playbooks are at workspace root, relative to workspace not the crate
fn playbooks_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("playbooks")
}

fn compile_args(playbook: &PathBuf, output: &PathBuf) -> Args {
    Args {
        command: Command::Compile {
            playbook: playbook.to_string_lossy().to_string(),
            output: output.to_string_lossy().to_string(),
            no_build: true,
        },
        config: None,
        log_level: "off".to_string(),
    }
}

#[test]
fn e2e_smoke_test_valid_playbooks() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let valid_playbooks = collect_bosun_files(playbooks_dir());

    assert!(
        !valid_playbooks.is_empty(),
        "No valid playbooks found in playbooks/"
    );

    let mut failed = Vec::new();

    for playbook_path in &valid_playbooks {
        let output_path = temp_dir
            .path()
            .join(playbook_path.file_stem().unwrap().to_string_lossy().to_string());

        match run(&compile_args(playbook_path, &output_path)) {
            Ok(()) => {
                let source_path = temp_dir.path().join(format!(
                    "{}.rs",
                    playbook_path.file_stem().unwrap().to_string_lossy()
                ));
                let source = fs::read_to_string(&source_path)
                    .unwrap_or_else(|err| panic!("{}: {err}", source_path.display()));
                assert!(source.contains("fn main()"));
                assert!(
                    !output_path.with_extension("build").exists(),
                    "--no-build must not scaffold a build package"
                );
            }
            Err(e) => failed.push((playbook_path.clone(), e)),
        }
    }

    if !failed.is_empty() {
        eprintln!("\nValid playbooks that failed:");
        for (path, err) in &failed {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} valid playbook(s) failed unexpectedly", failed.len());
    }

    println!("✅ All {} valid playbooks passed", valid_playbooks.len());
}

#[test]
fn e2e_smoke_test_error_playbooks() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let error_playbooks = collect_bosun_files(playbooks_dir().join("errors"));

    assert!(
        !error_playbooks.is_empty(),
        "No error playbooks found in playbooks/errors/"
    );

    let mut unexpectedly_succeeded = Vec::new();

    for playbook_path in &error_playbooks {
        let stem = playbook_path.file_stem().unwrap().to_string_lossy().to_string();
        let output_path = temp_dir.path().join(format!("error_{stem}"));

        if run(&compile_args(playbook_path, &output_path)).is_ok() {
            unexpectedly_succeeded.push(playbook_path.clone());
        }

        // Nothing is written when the front end fails
        assert!(!temp_dir.path().join(format!("error_{stem}.rs")).exists());
    }

    if !unexpectedly_succeeded.is_empty() {
        eprintln!("\nError playbooks that unexpectedly succeeded:");
        for path in &unexpectedly_succeeded {
            eprintln!("  - {}", path.display());
        }
        panic!(
            "{} error playbook(s) succeeded unexpectedly",
            unexpectedly_succeeded.len()
        );
    }

    println!(
        "✅ All {} error playbooks failed as expected",
        error_playbooks.len()
    );
}

#[test]
fn e2e_check_does_not_write_output() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let playbook = playbooks_dir().join("provision.bosun");

    let args = Args {
        command: Command::Check {
            playbook: playbook.to_string_lossy().to_string(),
        },
        config: None,
        log_level: "off".to_string(),
    };

    run(&args).expect("provision.bosun should validate");
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn e2e_missing_config_file_fails() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let playbook = playbooks_dir().join("hello.bosun");

    let mut args = compile_args(&playbook, &temp_dir.path().join("hello"));
    args.config = Some(temp_dir.path().join("missing.toml").to_string_lossy().to_string());

    assert!(run(&args).is_err());
}
