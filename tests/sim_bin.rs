use std::process::Command;

#[test]
fn sim_binary_smoke() {
    let output = Command::new(env!("CARGO_BIN_EXE_sim"))
        .args(["1", "2"])
        .output()
        .expect("failed to run sim binary");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("non utf8 output");
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).expect("invalid json");
    assert!(v["winner"].is_string());
    let shots = v["player1"]["shots"].as_u64().unwrap() + v["player2"]["shots"].as_u64().unwrap();
    assert!(shots >= 17);
    assert_eq!(v["records"].as_u64().unwrap(), 7 + 2 * shots);
}
