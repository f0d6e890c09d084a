#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::OnceLock;

use battleship_ledger::KeyManager;

/// Scratch directory unique to this test binary.
pub fn scratch_dir() -> PathBuf {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!(
            "battleship-ledger-{}-{}",
            std::process::id(),
            env!("CARGO_CRATE_NAME")
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    })
    .clone()
}

/// Identity files for three players, generated once per test binary.
pub fn identity(n: usize) -> PathBuf {
    static IDS: OnceLock<Vec<PathBuf>> = OnceLock::new();
    IDS.get_or_init(|| {
        (0..3)
            .map(|i| {
                let path = scratch_dir().join(format!("player{}.id", i + 1));
                KeyManager::load_or_generate(&path).unwrap();
                path
            })
            .collect()
    })[n - 1]
        .clone()
}

pub fn keys(n: usize) -> KeyManager {
    KeyManager::load_or_generate(&identity(n)).unwrap()
}

/// Fresh file path inside the scratch directory.
pub fn scratch_file(name: &str) -> PathBuf {
    let path = scratch_dir().join(name);
    let _ = std::fs::remove_file(&path);
    path
}
