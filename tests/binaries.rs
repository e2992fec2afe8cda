use std::process::{Command, Output};

const INHERITED_VARS: &[&str] = &[
    "GOOGLE_APPLICATION_CREDENTIALS",
    "FIREBASE_PROJECT_ID",
    "FIREBASE_AUTH_EMULATOR_HOST",
    "FIRESTORE_EMULATOR_HOST",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
    "ADMIN_DISPLAY_NAME",
    "USERS_COLLECTION",
    "REQUEST_TIMEOUT_SECS",
    "REUSE_EXISTING_IDENTITY",
    "RUST_LOG",
];

fn provisioner(vars: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_decompas-admin-bootstrap"));
    for var in INHERITED_VARS {
        command.env_remove(var);
    }
    command.envs(vars.iter().copied());
    command.output().expect("failed to run provisioner")
}

#[test]
fn generate_secret_prints_one_hex_secret() {
    let output = Command::new(env!("CARGO_BIN_EXE_generate_secret"))
        .output()
        .expect("failed to run generate_secret");

    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let secrets: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.strip_prefix("INIT_ADMIN_SECRET="))
        .collect();

    assert_eq!(secrets.len(), 1, "expected one INIT_ADMIN_SECRET line in:\n{}", stdout);
    let secret = secrets[0];
    assert_eq!(secret.len(), 64);
    assert!(secret.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
}

#[test]
fn provisioner_exits_nonzero_when_backends_are_unreachable() {
    let output = provisioner(&[
        ("FIREBASE_AUTH_EMULATOR_HOST", "127.0.0.1:1"),
        ("FIRESTORE_EMULATOR_HOST", "127.0.0.1:1"),
        ("FIREBASE_PROJECT_ID", "demo-decompas"),
        ("REQUEST_TIMEOUT_SECS", "5"),
    ]);

    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Admin user is ready"));
    assert_eq!(
        stdout.matches("Admin provisioning aborted").count(),
        1,
        "failure should be reported once:\n{}",
        stdout
    );
    assert!(stdout.contains("identity creation failed for admin@decompas.com"));
}

#[test]
fn provisioner_exits_nonzero_on_invalid_configuration() {
    let output = provisioner(&[("REQUEST_TIMEOUT_SECS", "ten")]);
    assert_eq!(output.status.code(), Some(1));
}
