use std::process::Command;

use rail_sim::simulation::load_network_from_file;

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_rail_sim"))
        .args(args)
        .env("RUST_LOG", "warn,rail_sim=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that the demo layout runs headless and reports its statistics
#[test]
fn test_headless_simulation_runs() {
    let output = run(&["--ticks", "100", "--seed", "7"]);

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    assert!(stderr.contains("Trains: 2"), "Missing train count");
    assert!(
        stderr.contains("Passengers delivered:"),
        "Missing 'Passengers delivered' statistic"
    );
}

/// Test that an exported layout can be loaded back and simulated
#[test]
fn test_export_and_reload() {
    let path = std::env::temp_dir().join(format!("rail_sim_export_{}.json", std::process::id()));
    let path_arg = path.to_string_lossy().to_string();

    let output = run(&["--ticks", "10", "--export", &path_arg]);
    assert!(output.status.success(), "Export run failed");

    let network = load_network_from_file(&path).unwrap();
    assert_eq!(network.segment_count(), 7);
    assert_eq!(network.station_count(), 3);

    let output = run(&["--ticks", "10", "--network", &path_arg]);
    let _ = std::fs::remove_file(&path);
    assert!(
        output.status.success(),
        "Reloaded network failed to run. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_missing_network_file_fails() {
    let output = run(&["--network", "/nonexistent/rail_sim_network.json"]);
    assert!(!output.status.success());
}
