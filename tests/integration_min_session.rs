// Drives the compiled binary through a PTY so the real event loop and
// crossterm input handling run end to end.
//
// Requires a TTY, so it is Unix-only and ignored by default.
// Run with: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn minimal_session_completes_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    // keep history, config and logs out of the real home directory
    let home = tempfile::tempdir()?;
    let bin = assert_cmd::cargo::cargo_bin("keypace");
    let cmd = format!(
        "env HOME={} XDG_CONFIG_HOME={}/config {} -p hi",
        home.path().display(),
        home.path().display(),
        bin.display()
    );

    let mut p = spawn(cmd)?;

    // let the app enter the alternate screen
    std::thread::sleep(Duration::from_millis(200));

    // the trailing space commits the only word and finishes the session
    p.send("hi ")?;
    std::thread::sleep(Duration::from_millis(200));

    // ESC quits from the results screen
    p.send("\x1b")?;

    p.expect(Eof)?;

    let db = home.path().join(".local/state/keypace/history.db");
    assert!(db.exists(), "history database should be created");
    Ok(())
}
